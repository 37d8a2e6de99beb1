use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::formatter::BracketedFormatter;
use crate::error::{PipelineError, PipelineResult};

/// Install the global subscriber: stdout always, plus a timestamped file
/// under `logs/` unless `log_to_file` is false.
///
/// # Returns
/// * The log file path when file logging is enabled
pub fn setup_logging(log_to_file: bool) -> PipelineResult<Option<PathBuf>> {
    let (file_layer, log_path) = if log_to_file {
        let log_dir = PathBuf::from("logs");
        fs::create_dir_all(&log_dir).map_err(|e| PipelineError::io(&log_dir, e))?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("tless_pipeline_{}.log", timestamp));
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)
            .map_err(|e| PipelineError::io(&log_path, e))?;

        let layer = fmt::layer()
            .event_format(BracketedFormatter)
            .with_writer(Mutex::new(file))
            .with_ansi(false);
        (Some(layer), Some(log_path))
    } else {
        (None, None)
    };

    let stdout_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    if let Some(path) = &log_path {
        info!("Log file created at: {:?}", path);
    }
    Ok(log_path)
}
