// Typed engine settings: logging and dispatcher behaviour

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, ConfigManager, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_core::logging::{LogConfig, LogFormat, LogLevel, LogOutput, Rotation};
use trellis_core::{DispatcherConfig, RequestRouter, Router};

/// Environment prefix read by [`TrellisSettings::load`]
pub const ENV_PREFIX: &str = "TRELLIS";

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];
const FORMATS: &[&str] = &["json", "plain", "text", "pretty", "compact"];
const OUTPUTS: &[&str] = &["stdout", "stderr", "file", "rolling"];
const ROTATIONS: &[&str] = &["minutely", "hourly", "daily", "never"];

/// Everything the engine reads from configuration.
///
/// ```toml
/// [logging]
/// level = "debug"
/// format = "compact"
///
/// [dispatcher]
/// log_requests = true
/// ```
///
/// The flat keys `log_level`, `log_format` and `log_requests` (for example
/// from `TRELLIS_LOG_LEVEL`) override the sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrellisSettings {
    pub logging: LoggingSettings,
    pub dispatcher: DispatcherSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
    /// `stdout`, `stderr`, `file` or `rolling`
    pub output: String,
    /// File path for `file`, directory for `rolling`
    pub path: Option<String>,
    /// File name prefix for `rolling`
    pub file_prefix: String,
    pub rotation: String,
    pub timestamps: bool,
    pub thread_ids: bool,
    pub targets: bool,
    pub file_line: bool,
    pub spans: bool,
    pub colors: bool,
    /// Filter directives; overrides `level`
    pub filter: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        let defaults = LogConfig::default();
        Self {
            level: defaults.level.as_str().to_string(),
            format: defaults.format.as_str().to_string(),
            output: "stdout".to_string(),
            path: None,
            file_prefix: "trellis.log".to_string(),
            rotation: "daily".to_string(),
            timestamps: defaults.timestamps,
            thread_ids: defaults.thread_ids,
            targets: defaults.targets,
            file_line: defaults.file_line,
            spans: defaults.spans,
            colors: defaults.colors,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    pub log_requests: bool,
    pub warn_on_replace: bool,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            log_requests: defaults.log_requests,
            warn_on_replace: defaults.warn_on_replace,
        }
    }
}

impl TrellisSettings {
    /// Optional file, then `TRELLIS_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let manager = ConfigManager::with_prefix(ENV_PREFIX);
        if let Some(path) = path {
            manager.load_file_auto(path)?;
        }
        manager.load_env()?;
        Self::from_manager(&manager)
    }

    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let mut settings = Self {
            logging: section(manager, "logging")?,
            dispatcher: section(manager, "dispatcher")?,
        };

        if manager.has("log_level") {
            settings.logging.level = manager.get_string("log_level")?;
        }
        if manager.has("log_format") {
            settings.logging.format = manager.get_string("log_format")?;
        }
        if manager.has("log_requests") {
            settings.dispatcher.log_requests = manager.get_bool("log_requests")?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Build `router` with the configured dispatcher behaviour.
    pub fn build_router(&self, router: Router) -> trellis_core::Result<RequestRouter> {
        router.build(self.dispatcher.to_dispatcher_config())
    }
}

fn section<T: Default + serde::de::DeserializeOwned>(manager: &ConfigManager, key: &str) -> Result<T> {
    if manager.has(key) {
        manager.get(key)
    } else {
        Ok(T::default())
    }
}

impl Validate for TrellisSettings {
    fn validate(&self) -> Result<()> {
        self.logging.validate()
    }
}

impl Validate for LoggingSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::all([
            ConfigValidator::one_of(&self.level, LEVELS, "logging.level"),
            ConfigValidator::one_of(&self.format, FORMATS, "logging.format"),
            ConfigValidator::one_of(&self.output, OUTPUTS, "logging.output"),
            ConfigValidator::one_of(&self.rotation, ROTATIONS, "logging.rotation"),
        ])?;

        if matches!(self.output_name().as_str(), "file" | "rolling") {
            let path = self.path.as_deref().unwrap_or_default();
            ConfigValidator::not_empty(path, "logging.path").map_err(|_| {
                ConfigError::ValidationError(format!(
                    "logging.path is required for {} output",
                    self.output_name()
                ))
            })?;
        }
        if self.output_name() == "rolling" {
            ConfigValidator::not_empty(&self.file_prefix, "logging.file_prefix")?;
        }
        Ok(())
    }
}

impl LoggingSettings {
    fn output_name(&self) -> String {
        self.output.trim().to_lowercase()
    }

    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = LogLevel::parse(&self.level)
            .ok_or_else(|| ConfigError::invalid("logging.level", &self.level))?;
        let format = LogFormat::parse(&self.format)
            .ok_or_else(|| ConfigError::invalid("logging.format", &self.format))?;

        let path = self.path.clone().unwrap_or_default();
        let output = match self.output_name().as_str() {
            "stdout" => LogOutput::Stdout,
            "stderr" => LogOutput::Stderr,
            "file" => LogOutput::File(path),
            "rolling" => LogOutput::RollingFile {
                directory: path,
                prefix: self.file_prefix.clone(),
                rotation: parse_rotation(&self.rotation)?,
            },
            other => return Err(ConfigError::invalid("logging.output", other)),
        };

        let mut config = LogConfig::new()
            .level(level)
            .format(format)
            .output(output)
            .with_timestamps(self.timestamps)
            .with_thread_ids(self.thread_ids)
            .with_targets(self.targets)
            .with_file_line(self.file_line)
            .with_spans(self.spans)
            .with_colors(self.colors);
        if let Some(filter) = &self.filter {
            config = config.with_env_filter(filter.clone());
        }
        Ok(config)
    }
}

fn parse_rotation(raw: &str) -> Result<Rotation> {
    match raw.trim().to_lowercase().as_str() {
        "minutely" => Ok(Rotation::Minutely),
        "hourly" => Ok(Rotation::Hourly),
        "daily" => Ok(Rotation::Daily),
        "never" => Ok(Rotation::Never),
        other => Err(ConfigError::invalid("logging.rotation", other)),
    }
}

impl DispatcherSettings {
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::new()
            .log_requests(self.log_requests)
            .warn_on_replace(self.warn_on_replace)
    }
}
