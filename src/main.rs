//! Corvid agent — daemon entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Open the spool
//!   7. Register built-in modules, scan the external-modules directory
//!   8. Spawn Ctrl-C → shutdown signal watcher
//!   9. Start the job executor
//!  10. Run the connection supervisor until shutdown or fatal error
//!  11. Cancel token + drain outstanding workers

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use corvid_agent::bootstrap::logger;
use corvid_agent::config;
use corvid_agent::connection::ConnectionSupervisor;
use corvid_agent::error::AgentError;
use corvid_agent::modules::ModuleRegistry;
use corvid_agent::runner::{JobExecutor, SpoolStore};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AgentError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let cli_level = logger::verbosity_level(args.verbosity);
    let effective_log_level = cli_level.unwrap_or(config.log_level.as_str());
    logger::init(
        effective_log_level,
        cli_level.is_some(),
        config.log_file.as_deref(),
    )?;

    info!(
        agent = %config.agent_name,
        broker = %config.broker.uri,
        spool_dir = %config.spool_dir.display(),
        modules_dir = %config.modules_dir.display(),
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let spool = Arc::new(SpoolStore::open(&config.spool_dir)?);

    let mut registry = ModuleRegistry::with_builtins();
    registry.load_external_dir(&config.modules_dir).await;
    registry.log_summary();
    let registry = Arc::new(registry);

    // Shared shutdown token — Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let (executor, executor_handle) = JobExecutor::start(shutdown.clone());

    let supervisor = ConnectionSupervisor::new(config, registry, spool, executor);
    let result = supervisor.run(shutdown.clone()).await;

    // Stop the executor and wait for in-flight jobs to finish their spool
    // writes, whatever ended the supervisor.
    shutdown.cancel();
    executor_handle.await.ok();

    result
}

struct CliArgs {
    verbosity: u8,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: corvid-agent [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs {
        verbosity,
        config_path,
    }
}
