// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Separator marking a nested key: `TRELLIS_DISPATCHER__LOG_REQUESTS` is
/// `dispatcher.log_requests`.
pub const NESTING_SEPARATOR: &str = "__";

/// Reads configuration keys from the process environment.
///
/// With a prefix, only `PREFIX_*` variables are read and the prefix is
/// stripped. Keys are lower-cased and `__` becomes a `.` path separator.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.map(|p| p.trim_end_matches('_').to_uppercase()),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Every matching variable as `dotted.key -> raw value`
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    fn collect(&self, vars: impl IntoIterator<Item = (String, String)>) -> HashMap<String, String> {
        vars.into_iter()
            .filter_map(|(name, value)| self.config_key(&name).map(|key| (key, value)))
            .collect()
    }

    /// Configuration key for an environment variable name, if it belongs to
    /// this loader.
    pub fn config_key(&self, var_name: &str) -> Option<String> {
        let unprefixed = match &self.prefix {
            Some(prefix) => var_name.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => var_name,
        };
        if unprefixed.is_empty() {
            return None;
        }
        Some(unprefixed.to_lowercase().replace(NESTING_SEPARATOR, "."))
    }

    /// Environment variable name for a dotted configuration key
    pub fn var_name(&self, key: &str) -> String {
        let name = key.replace('.', NESTING_SEPARATOR).to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, name),
            None => name,
        }
    }

    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.var_name(key)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
