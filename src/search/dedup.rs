//! Result diversity: cap the number of chunks per file.
//!
//! Without a cap one hot file can fill the whole bundle. Memory candidates
//! have no file and are never capped.

use std::collections::HashMap;

use crate::types::CandidateKind;

use super::fusion::FusedCandidate;

/// Keep at most `max_per_file` code candidates per file, preserving order.
/// `max_per_file == 0` disables the cap.
pub fn limit_chunks_per_file(
    candidates: Vec<FusedCandidate>,
    max_per_file: usize,
) -> Vec<FusedCandidate> {
    if max_per_file == 0 {
        return candidates;
    }
    let mut per_file: HashMap<String, usize> = HashMap::new();
    candidates
        .into_iter()
        .filter(|fused| {
            if fused.candidate.kind != CandidateKind::Code {
                return true;
            }
            let seen = per_file.entry(fused.candidate.path.clone()).or_insert(0);
            *seen += 1;
            *seen <= max_per_file
        })
        .collect()
}

#[cfg(test)]
#[path = "dedup.test.rs"]
mod tests;
