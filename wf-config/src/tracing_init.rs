//! Optional `tracing-init` feature: file-appender-based structured logging
//! setup shared by `wf-cli` and `wf-serve`, mirroring the teacher `config`
//! crate's own `tracing-init` feature (same feature name, same optional
//! deps: `tracing-subscriber`, `tracing-appender`).

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;

/// Initializes a global `tracing` subscriber that writes JSON-free, leveled
/// log lines to a daily-rolling file under `<app_name>` log directory, with
/// level controlled by `RUST_LOG` (default `info`).
///
/// Returns the [`WorkerGuard`] that must be kept alive for the duration of
/// the process; dropping it flushes and stops the background writer thread.
pub fn init_file_logging(app_name: &str) -> std::io::Result<WorkerGuard> {
    let log_dir = log_dir(app_name);
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}

fn log_dir(app_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(app_name)
        .join("logs")
}
