//! Thin CLI over the assembly engine.
//!
//! Exit codes: 0 success, 2 config, 3 i/o, 4 network, 5 timeout,
//! 6 internal. Output is JSON whenever stdout is not a terminal.

use std::io::IsTerminal;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;

use ctxpack::assemble::AssembleRequest;
use ctxpack::assemble::Bundle;
use ctxpack::config::EngineConfig;
use ctxpack::types::MemoryKind;
use ctxpack::types::MemoryScope;
use ctxpack::Engine;
use ctxpack::EngineError;

#[derive(Parser)]
#[command(name = "ctxpack", about = "Code-aware retrieval and context assembly")]
struct Cli {
    /// Config file (defaults to .ctxpack/config.toml discovery).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a context bundle for a query.
    Assemble {
        query: String,
        /// Repository to search.
        #[arg(long)]
        repo: Option<String>,
        /// Token budget for the bundle.
        #[arg(long, default_value_t = 8_000)]
        budget: u32,
        /// Target model for token counting.
        #[arg(long)]
        model: Option<String>,
        /// Overall deadline in milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Session id recorded with the interaction.
        #[arg(long)]
        session: Option<String>,
        /// Render the explanation instead of the bundle JSON.
        #[arg(long)]
        explain: bool,
    },
    /// Re-render the Markdown explanation of a bundle JSON file (- = stdin).
    Explain { bundle: PathBuf },
    /// Store a memory note.
    Remember {
        value: String,
        #[arg(long, default_value = "repo")]
        scope: String,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long, default_value = "fact")]
        kind: String,
        #[arg(long)]
        key: Option<String>,
    },
    /// Run one learning batch and print the proposal.
    Learn {
        /// Adopt the proposal as a new policy version.
        #[arg(long)]
        adopt: bool,
    },
    /// Run the store integrity probe.
    Check,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<(), EngineError> {
    let config = match &cli.config {
        Some(path) => {
            let mut config = EngineConfig::from_file(path)?;
            config.apply_env_overrides(std::env::vars())?;
            config
        }
        None => EngineConfig::load(&std::env::current_dir()?)?,
    };

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| EngineError::store_io("tokio runtime", e))?;
    runtime.block_on(dispatch(cli.command, config))
}

async fn dispatch(command: Command, config: EngineConfig) -> Result<(), EngineError> {
    let engine = Engine::open(config, None)?;

    match command {
        Command::Assemble {
            query,
            repo,
            budget,
            model,
            deadline_ms,
            session,
            explain,
        } => {
            let request = AssembleRequest {
                query,
                repo,
                budget,
                model,
                session_id: session,
                deadline: deadline_ms.map(Duration::from_millis),
                ..Default::default()
            };
            let bundle = engine.assemble(request).await?;
            if explain {
                println!("{}", engine.explain(&bundle));
            } else {
                emit(&bundle, || engine.explain(&bundle));
            }
        }
        Command::Explain { bundle } => {
            let raw = if bundle.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&bundle)?
            };
            let parsed: Bundle =
                serde_json::from_str(&raw).map_err(|e| EngineError::ConfigParse {
                    path: bundle,
                    cause: format!("not a bundle: {e}"),
                })?;
            println!("{}", engine.explain(&parsed));
        }
        Command::Remember {
            value,
            scope,
            repo,
            kind,
            key,
        } => {
            let scope = MemoryScope::parse(&scope).ok_or_else(|| EngineError::Config {
                field: "scope".to_string(),
                cause: format!("unknown scope `{scope}`"),
            })?;
            let kind = MemoryKind::parse(&kind).ok_or_else(|| EngineError::Config {
                field: "kind".to_string(),
                cause: format!("unknown kind `{kind}`"),
            })?;
            let memory = engine.remember(scope, repo, kind, key, value).await?;
            emit(&memory, || format!("remembered {} ({})", memory.id, memory.kind.label()));
        }
        Command::Learn { adopt } => match engine.learn_step(adopt).await? {
            Some(proposal) => {
                emit(&proposal, || {
                    format!(
                        "{} deltas over {} interactions (‖Δ‖₂ = {:.5}){}",
                        proposal.deltas.len(),
                        proposal.interactions,
                        proposal.l2_norm,
                        if adopt { ", adopted" } else { "" }
                    )
                });
            }
            None => {
                if std::io::stdout().is_terminal() {
                    println!("nothing to learn from yet");
                } else {
                    println!("null");
                }
            }
        },
        Command::Check => {
            engine.health_check().await?;
            emit(&serde_json::json!({"status": "ok"}), || "store: ok".to_string());
        }
    }
    Ok(())
}

/// JSON when piped, human rendering on a terminal.
fn emit<T: serde::Serialize>(value: &T, human: impl FnOnce() -> String) {
    if std::io::stdout().is_terminal() {
        println!("{}", human());
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
        );
    }
}
