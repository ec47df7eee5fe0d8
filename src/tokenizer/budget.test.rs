use super::*;

#[test]
fn test_fit_and_consume() {
    let mut budget = BudgetManager::new(1_000, 100);
    assert_eq!(budget.remaining(), 900);
    assert!(budget.fit(900).is_ok());
    assert!(budget.fit(901).is_err());

    budget.consume(500);
    assert_eq!(budget.used(), 500);
    assert_eq!(budget.remaining(), 400);
    assert!(budget.fit(400).is_ok());

    let err = budget.fit(401).unwrap_err();
    assert_eq!(err.requested, 401);
    assert_eq!(err.remaining, 400);
}

#[test]
fn test_fit_never_mutates() {
    let budget = BudgetManager::new(100, 0);
    let _ = budget.fit(50);
    let _ = budget.fit(500);
    assert_eq!(budget.used(), 0);
    assert_eq!(budget.remaining(), 100);
}

#[test]
fn test_reserve_clamped_to_budget() {
    let budget = BudgetManager::new(100, 500);
    assert_eq!(budget.reserve(), 100);
    assert_eq!(budget.remaining(), 0);
    assert!(budget.exhausted());
}

#[test]
fn test_overconsumption_saturates() {
    let mut budget = BudgetManager::new(100, 0);
    budget.consume(150);
    assert_eq!(budget.remaining(), 0);
    assert!(budget.exhausted());
    assert!(budget.fit(1).is_err());
}

#[test]
fn test_zero_budget() {
    let budget = BudgetManager::new(0, 0);
    assert!(budget.exhausted());
    assert!(budget.fit(0).is_ok());
    assert!(budget.fit(1).is_err());
}
