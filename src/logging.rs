use anyhow::Result;
use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

/// Warnings to stderr, `file_level` and up to `<log_dir>/<name>_<ts>.log`.
/// Returns the log file path.
pub fn init(log_dir: &Path, name: &str, file_level: LevelFilter) -> Result<PathBuf> {
    create_dir_all(log_dir)?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("{name}_{ts}.log"));

    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Warn,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(file_level, config, File::create(&log_path)?),
    ])?;
    Ok(log_path)
}
