use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
/// With a `log_file`, every line also goes to the end of that file.
pub fn init(default_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let installed = match log_file {
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .try_init()
        }
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// One metric line, easy to grep: `scalar step=.. name=.. value=..`.
pub fn scalar(step: u64, name: &str, value: f64) {
    tracing::info!(target: "scalar", step, name, value);
}
