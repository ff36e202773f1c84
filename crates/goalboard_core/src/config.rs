//! Runtime configuration for hosts (FFI, CLI).
//!
//! # Responsibility
//! - Load `CoreConfig` from an optional JSON file, then apply `GOALBOARD_*`
//!   environment overrides.
//! - Build the configured suggestion service.
//! - Start file logging when a log directory is configured.
//!
//! # Invariants
//! - A validated config always names a usable owner/goal path segment pair.
//! - Secrets are never written to logs or `Display` output.

use crate::logging::{default_log_level, init_logging, parse_level, LoggingError};
use crate::model::goal::DEFAULT_GOAL_ID;
use crate::store::path::ensure_segment;
use crate::suggest::openai_service::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::suggest::{HttpPlanService, OpenAiPlanService, SuggestionService};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const ENV_PREFIX: &str = "GOALBOARD_";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "cannot parse config `{}`: {message}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file. Hosts pick their own fallback when absent: the FFI uses a
    /// file in the temp directory and the CLI requires it.
    pub db_path: Option<PathBuf>,
    pub owner_id: String,
    pub goal_id: String,
    /// Hosted plan endpoint; takes precedence over direct OpenAI access.
    pub suggestion_endpoint: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub suggestion_timeout_secs: u64,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when absent.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            owner_id: String::new(),
            goal_id: DEFAULT_GOAL_ID.to_string(),
            suggestion_endpoint: None,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            suggestion_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Defaults, then `file` if given, then process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Applies overrides read through `lookup`; blank values are ignored.
    ///
    /// `OPENAI_API_KEY` is used when `GOALBOARD_OPENAI_API_KEY` is unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };
        if let Some(value) = get("DB_PATH") {
            self.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get("OWNER_ID") {
            self.owner_id = value;
        }
        if let Some(value) = get("GOAL_ID") {
            self.goal_id = value;
        }
        if let Some(value) = get("SUGGESTION_ENDPOINT") {
            self.suggestion_endpoint = Some(value);
        }
        if let Some(value) = get("OPENAI_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY").filter(|value| !value.trim().is_empty()))
        {
            self.openai_api_key = Some(value);
        }
        if let Some(value) = get("OPENAI_MODEL") {
            self.openai_model = value;
        }
        if let Some(value) = get("OPENAI_BASE_URL") {
            self.openai_base_url = value;
        }
        if let Some(value) = get("SUGGESTION_TIMEOUT_SECS") {
            // Unparsable values become 0 so `validate` reports them.
            self.suggestion_timeout_secs = value.trim().parse().unwrap_or(0);
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(value));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_id("owner_id", &self.owner_id)?;
        ensure_id("goal_id", &self.goal_id)?;
        if self.suggestion_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "suggestion_timeout_secs must be a positive integer".to_string(),
            ));
        }
        if self.openai_model.trim().is_empty() {
            return Err(ConfigError::Invalid("openai_model must not be empty".to_string()));
        }
        parse_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Starts file logging at `log_level` under `log_dir`.
    ///
    /// Returns `Ok(false)` without touching the logger when no directory is
    /// configured.
    pub fn start_logging(&self) -> Result<bool, LoggingError> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        init_logging(&self.log_level, &dir.to_string_lossy())?;
        Ok(true)
    }

    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_secs(self.suggestion_timeout_secs)
    }

    /// Hosted endpoint when configured, direct OpenAI access otherwise.
    pub fn build_suggestion_service(&self) -> Arc<dyn SuggestionService> {
        match &self.suggestion_endpoint {
            Some(endpoint) => Arc::new(HttpPlanService::new(
                endpoint.clone(),
                self.suggestion_timeout(),
            )),
            None => Arc::new(
                OpenAiPlanService::new(self.openai_api_key.clone(), self.suggestion_timeout())
                    .with_base_url(self.openai_base_url.clone())
                    .with_model(self.openai_model.clone()),
            ),
        }
    }
}

fn ensure_id(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be blank")));
    }
    ensure_segment(value).map_err(|_| {
        ConfigError::Invalid(format!(
            "{field} may only contain letters, digits, `_` and `-`: `{value}`"
        ))
    })
}
