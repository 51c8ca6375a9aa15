use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio::signal;

use docload::cli::commands::{
    handle_config, handle_query, handle_run, handle_stats, handle_status, handle_test,
};
use docload::cli::output::get_formatter;
use docload::cli::{Cli, Commands};
use docload::logging;
use docload::models::{Config, LoggingConfig, OutputFormat};

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = Config::load(cli.config.as_deref());
    let logging_config = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    logging::init(&logging_config, cli.verbose);

    let format = cli.format.unwrap_or_else(|| {
        loaded
            .as_ref()
            .map(|c| c.output.default_format)
            .unwrap_or_default()
    });

    tokio::select! {
        result = run_command(cli, loaded, format) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::debug!("command failed: {e:?}");
                eprint!("{}", get_formatter(format).format_error(&format!("{e:#}")));
                ExitCode::FAILURE
            }
        },
        _ = shutdown_signal() => {
            eprintln!("\nOperation cancelled");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run_command(
    cli: Cli,
    loaded: Result<Config, docload::error::ConfigError>,
    format: OutputFormat,
) -> Result<()> {
    let verbose = cli.verbose;

    // Config commands run even when the config file fails to load.
    match cli.command {
        Commands::Config(cmd) => handle_config(cmd, cli.config.as_deref(), format).await,
        Commands::Run(args) => handle_run(args, &loaded?, format, verbose).await,
        Commands::Stats => handle_stats(&loaded?, format, verbose).await,
        Commands::Test(args) => handle_test(args, &loaded?, format, verbose).await,
        Commands::Query(args) => handle_query(args, &loaded?, format, verbose).await,
        Commands::Status => handle_status(&loaded?, format, verbose).await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
