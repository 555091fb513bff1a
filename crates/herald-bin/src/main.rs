//! Herald - republishes announcement-channel posts to follower servers.

mod app;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use herald_config::{init_logging, Config, Paths};

/// Herald command-line interface.
#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Republishes announcement-channel posts and announces live streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, logs). Defaults to ~/.herald
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and republish until terminated
    Run,
    /// Validate configuration and credentials, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => match Paths::new() {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(1);
            }
        },
    };

    let config = match Config::load(&paths) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            return ExitCode::from(1);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let log_path = paths.ensure_dirs().ok().map(|_| paths.log_file());
    init_logging(level, log_path);

    let result = match cli.command {
        Some(Commands::CheckConfig) => app::check_config(&config),
        Some(Commands::Run) | None => app::run_herald(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, credential = e.is_credential_error(), "herald exited with error");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
