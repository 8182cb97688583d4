//! Logging for prompt-grok.
use anyhow::Context;
use prompt_grok_core::get_data_dir;
use std::io::LineWriter;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::{OffsetTime, UtcTime};

const LOG_FILE: &str = "prompt-grok.log";
const MAX_LOG_BYTES: u64 = 100 * 1024;
const LOG_FILTER: &str = "prompt_grok=debug,prompt_grok_core=debug,rustyline=info";

/// Sets up file logging at `<data_dir>/prompt-grok.log`.
///
/// A log above 100KB is moved to `prompt-grok.log.old` first. Lines are
/// flushed as they are written, without ANSI colours, stamped with local
/// time (UTC when the local offset cannot be determined).
pub fn setup_logging() -> anyhow::Result<()> {
    let data_dir = get_data_dir().context("Failed to get data directory")?;
    let log_path = data_dir.join(LOG_FILE);
    rotate(&log_path, &data_dir.join(format!("{LOG_FILE}.old")))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;
    let writer = Mutex::new(LineWriter::new(log_file));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(LOG_FILTER)
        .with_writer(writer)
        .with_ansi(false);
    let result = match OffsetTime::local_rfc_3339() {
        Ok(timer) => builder.with_timer(timer).try_init(),
        Err(_) => builder.with_timer(UtcTime::rfc_3339()).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))
}

fn rotate(log_path: &Path, backup_path: &Path) -> std::io::Result<()> {
    if log_path.exists() && std::fs::metadata(log_path)?.len() > MAX_LOG_BYTES {
        if backup_path.exists() {
            std::fs::remove_file(backup_path)?;
        }
        std::fs::rename(log_path, backup_path)?;
    }
    Ok(())
}
