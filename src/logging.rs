//! Tracing setup for the command-line binary.
//!
//! Logs go to stderr so command output on stdout stays parseable. When
//! `DOCRAG_LOG_FILE` is set, logs are also appended to that file through a
//! non-blocking writer.

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable naming an append-only log file.
pub const LOG_FILE_ENV: &str = "DOCRAG_LOG_FILE";

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// `verbose` is true. When a log file is configured the returned guard must
/// be kept alive; dropping it flushes buffered lines.
pub fn init_tracing(verbose: bool) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    let file_writer = std::env::var(LOG_FILE_ENV).ok().and_then(|path| open_file_writer(&path));
    if let Some((writer, guard)) = file_writer {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        let _ = registry.with(file_layer).try_init();
        Some(guard)
    } else {
        let _ = registry.try_init();
        None
    }
}

fn open_file_writer(path: &str) -> Option<(NonBlocking, WorkerGuard)> {
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(err) => {
            eprintln!("Failed to open log file {path}: {err}");
            None
        }
    }
}
