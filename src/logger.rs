//! `log` backend for BadgeForge. Records go to one file per launch:
//!
//!   Linux:    `$XDG_DATA_HOME/BadgeForge/badgeforge.log` (or `~/.local/share/...`)
//!   Windows:  `%APPDATA%\BadgeForge\badgeforge.log`
//!   macOS:    `~/Library/Application Support/BadgeForge/badgeforge.log`
//!
//! The previous launch's file is overwritten. Call [`init`] once, then use
//! `log::info!` and friends from any module.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::{Local, Utc};
use log::{LevelFilter, Log, Metadata, Record};

use crate::settings::AppSettings;

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

/// A `log::Log` that appends timestamped, level-tagged lines to one file.
/// I/O errors are swallowed so logging never fails the caller.
pub struct SessionLogger {
    file: Mutex<File>,
    path: PathBuf,
    level: LevelFilter,
}

impl SessionLogger {
    /// Create (or truncate) the log file at `path`.
    pub fn open(path: &Path, level: LevelFilter) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(Self { file: Mutex::new(file), path: path.to_path_buf(), level })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a raw line to the log.
    pub fn write_line(&self, line: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.write_line(&format!(
            "[{}] [{}] {}",
            Local::now().format("%H:%M:%S"),
            record.level(),
            record.args()
        ));
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Where this launch is logging, once [`init`] has succeeded.
pub fn log_path() -> Option<&'static Path> {
    LOGGER.get().map(SessionLogger::path)
}

/// Install the file logger as the global `log` backend at `level` and mirror
/// panics into the file before the previous hook runs.
///
/// If the file cannot be opened, logging stays disabled and the reason is
/// printed to stderr.
pub fn init(level: LevelFilter) {
    let path = log_file_path();
    let logger = match SessionLogger::open(&path, level) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    };

    let logger = LOGGER.get_or_init(|| logger);
    if log::set_logger(logger).is_err() {
        // Another backend is already installed
        return;
    }
    log::set_max_level(level);

    logger.write_line(&format!("=== BadgeForge session started {} ===", Utc::now().to_rfc3339()));
    logger.write_line(&format!("Log file: {}", logger.path().display()));
    logger.write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(logger) = LOGGER.get() {
            logger.write_line(&format!("[{}] [PANIC] {}", Local::now().format("%H:%M:%S"), info));
            logger.flush();
        }
        prev(info);
    }));
}

/// [`init`] at the level saved in the user's settings.
pub fn init_from(settings: &AppSettings) {
    init(settings.log_level);
}

fn log_file_path() -> PathBuf {
    data_dir().join("BadgeForge").join("badgeforge.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}
