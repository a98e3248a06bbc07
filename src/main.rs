use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use docrag::cli::commands::{
    handle_collection, handle_config, handle_ingest, handle_query, handle_status,
};
use docrag::cli::output::get_formatter;
use docrag::cli::{Cli, Commands};
use docrag::logging::init_tracing;
use docrag::models::{Config, OutputFormat};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::debug!(error = %e, "command failed");
        eprint!("{}", get_formatter(OutputFormat::Text).format_error(&format!("{e:#}")));
        // exit() skips destructors
        drop(log_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match (&cli.command, cli.config.as_deref()) {
        // `config init` must work before any file exists.
        (Commands::Config(_), path) => load_config(path).unwrap_or_default(),
        (_, path) => load_config(path)?,
    };
    let format = cli.format.unwrap_or(config.search.default_format);
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, &config, cli.config.as_deref(), format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

async fn run_command(
    command: Commands,
    config: &Config,
    config_path: Option<&Path>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    match command {
        Commands::Ingest(args) => {
            handle_ingest(args, config, format, verbose).await?;
        }
        Commands::Query(args) => {
            handle_query(args, config, format, verbose).await?;
        }
        Commands::Collection(cmd) => {
            handle_collection(cmd, config, format, verbose).await?;
        }
        Commands::Status => {
            handle_status(config, format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, config, config_path, format)?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
