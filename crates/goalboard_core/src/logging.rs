//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start one rolling-file `flexi_logger` backend per process.
//! - Capture panics as structured `event=panic_captured` lines.
//!
//! # Invariants
//! - Repeated init with identical settings is a no-op.
//! - A second init with a different level or directory is rejected.
//! - Core modules log ids, counts and durations; never task or goal text.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "goalboard";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 4;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Validated logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Normalized level name (`trace|debug|info|warn|error`).
    pub level: &'static str,
    /// Absolute directory receiving rolling log files.
    pub dir: PathBuf,
}

impl LogSettings {
    /// Validates raw level and directory input.
    pub fn new(level: &str, dir: &str) -> Result<Self, LoggingError> {
        let level = parse_level(level)?;
        let trimmed = dir.trim();
        if trimmed.is_empty() {
            return Err(LoggingError::InvalidDirectory(
                "log directory cannot be empty".to_string(),
            ));
        }
        let path = Path::new(trimmed);
        if !path.is_absolute() {
            return Err(LoggingError::InvalidDirectory(format!(
                "log directory must be absolute, got `{trimmed}`"
            )));
        }
        Ok(Self {
            level,
            dir: path.to_path_buf(),
        })
    }
}

/// Logging bootstrap failures.
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    InvalidDirectory(String),
    CreateDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    Conflict {
        active: LogSettings,
        requested: LogSettings,
    },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(value) => write!(
                f,
                "unsupported log level `{value}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(message) => write!(f, "{message}"),
            Self::CreateDirectory { dir, source } => write!(
                f,
                "failed to create log directory `{}`: {source}",
                dir.display()
            ),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already active ({} at `{}`); refusing to switch to {} at `{}`",
                active.level,
                active.dir.display(),
                requested.level,
                requested.dir.display()
            ),
            Self::Backend(message) => write!(f, "logger backend failed: {message}"),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Starts file logging for this process.
///
/// # Errors
/// - `UnsupportedLevel` / `InvalidDirectory` for bad input.
/// - `Conflict` when logging already runs with other settings.
/// - `CreateDirectory` / `Backend` when the backend cannot start.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let requested = LogSettings::new(level, log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start_backend(requested.clone()))?;
    if active.settings != requested {
        return Err(LoggingError::Conflict {
            active: active.settings.clone(),
            requested,
        });
    }
    Ok(())
}

/// Returns the settings of the running logger, if any.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

/// Level used when configuration does not name one.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Normalizes a user-supplied level name.
pub fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn start_backend(settings: LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDirectory {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();

    info!(
        "event=logging_start module=core status=ok level={} dir={} version={} os={}",
        settings.level,
        settings.dir.display(),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );

    Ok(ActiveLogger {
        settings,
        _handle: handle,
    })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        // Payload may carry task text; cap and flatten it.
        let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            flatten_and_cap(&payload, PANIC_SUMMARY_CHARS)
        );
        previous(info);
    }));
}

fn flatten_and_cap(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut capped: String = flat.chars().take(max_chars).collect();
    if flat.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}
