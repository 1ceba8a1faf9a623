use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config;

const LOG_FILE_NAME: &str = "installer.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn default_log_root() -> PathBuf {
    std::env::temp_dir().join(format!("{}-installer", config::APP_NAME.to_lowercase()))
}

pub fn logs_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

fn prepare_log_file(root: &Path) -> Result<PathBuf> {
    let dir = logs_dir(root);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let log_path = dir.join(LOG_FILE_NAME);
    let _file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open {}", log_path.display()))?;
    Ok(log_path)
}

/// Sends tracing output to stderr and to `<root>/logs/installer.log`.
/// Stdout stays free for the notification channel. Later calls only return
/// the log path.
pub fn init(root: &Path) -> Result<PathBuf> {
    let log_path = prepare_log_file(root)?;
    if LOG_GUARD.get().is_some() {
        return Ok(log_path);
    }

    let appender = tracing_appender::rolling::never(logs_dir(root), LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer));
    tracing::subscriber::set_global_default(subscriber)
        .context("install global tracing subscriber")?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!("Logging initialized; log file at {}", log_path.display());
    Ok(log_path)
}
