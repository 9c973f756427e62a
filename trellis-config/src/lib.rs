// Configuration for the Trellis request dispatch engine
// Layered settings from files, .env files and environment variables

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{DispatcherSettings, LoggingSettings, TrellisSettings};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Layered configuration store.
///
/// Values live in a single JSON tree and are addressed with dotted keys
/// (`"logging.level"`). Later loads override earlier ones key by key.
/// Clones share the same store.
#[derive(Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<Map<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only `PREFIX_*` environment variables are read by [`load_env`](Self::load_env).
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Load environment variables. `true`/`false` and numbers are stored
    /// typed; everything else as a string.
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let vars = loader.load()?;

        let mut config = self.config.write();
        for (key, raw) in vars {
            set_path(&mut config, &key, infer_scalar(&raw));
        }
        Ok(())
    }

    /// Load a `.env` file into the process environment, then the environment.
    /// Without a path a missing `.env` is not an error.
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::load(path, e))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    /// Load a file whose format is taken from its extension.
    pub fn load_file_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        self.merge_value(data);
        Ok(())
    }

    /// Parse a document held in memory.
    pub fn load_str(&self, content: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).parse(content)?;
        self.merge_value(data);
        Ok(())
    }

    fn merge_value(&self, data: Value) {
        if let Value::Object(map) = data {
            merge_maps(&mut self.config.write(), map);
        }
    }

    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value =
            serde_json::to_value(value).map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        set_path(&mut self.config.write(), key, value);
        Ok(())
    }

    /// Raw value at a dotted key
    pub fn value(&self, key: &str) -> Option<Value> {
        get_path(&self.config.read(), key).cloned()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        serde_json::from_value(value).map_err(|e| ConfigError::invalid(key, e))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.value(key) {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Null) | None => Err(ConfigError::KeyNotFound(key.to_string())),
            Some(other) => Ok(other.to_string()),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.value(key) {
            Some(Value::String(s)) => s.trim().parse().map_err(|e| ConfigError::invalid(key, e)),
            _ => self.get(key),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.value(key) {
            Some(Value::String(s)) => parse_bool(&s)
                .ok_or_else(|| ConfigError::invalid(key, format!("\"{}\" is not a boolean", s))),
            _ => self.get(key),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        match self.value(key) {
            Some(Value::String(s)) => s.trim().parse().map_err(|e| ConfigError::invalid(key, e)),
            _ => self.get(key),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        get_path(&self.config.read(), key).is_some()
    }

    /// Top-level keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Overlay another manager's values onto this one.
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        if Arc::ptr_eq(&self.config, &other.config) {
            return Ok(());
        }
        let other = other.config.read().clone();
        merge_maps(&mut self.config.write(), other);
        Ok(())
    }

    /// Deserialize the section at `key`, or the whole tree when `key` is
    /// empty, and validate it.
    pub fn load_validated<T: DeserializeOwned + Validate>(&self, key: &str) -> Result<T> {
        let value = if key.is_empty() {
            Value::Object(self.config.read().clone())
        } else {
            self.value(key)
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?
        };

        let settings: T = serde_json::from_value(value).map_err(|e| ConfigError::invalid(key, e))?;
        settings.validate()?;
        Ok(settings)
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn infer_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

fn get_path<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn set_path(root: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            root.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_maps(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}
