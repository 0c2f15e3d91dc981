mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use floodwatch_core::{ChannelManager, SyncEngine};

use crate::cli::{Cli, Command, LogFormat};
use crate::error::CliError;

/// Handler identity this binary registers on the event channel.
const CONSUMER_ID: &str = "floodwatch-cli";

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.log_format);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "floodwatch", &mut std::io::stdout());
            Ok(())
        }

        // All other commands require a backend
        cmd => {
            let mut sync = config::build_sync_config(&cli.global)?;
            if let Command::Watch(ref args) = cmd {
                if let Some(refresh) = args.refresh {
                    sync.refresh_interval_secs = refresh;
                }
            }

            let channels = Arc::new(ChannelManager::new(sync.reconnect.clone()));
            let engine = SyncEngine::new(sync, Arc::clone(&channels), CONSUMER_ID)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &engine, &cli.global).await;
            channels.shutdown();
            result
        }
    }
}
