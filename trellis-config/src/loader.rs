// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    /// `KEY=value` lines, as in a `.env` file
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    /// Format of `path`, by extension; a bare `.env` file counts as Env
    pub fn detect(path: &Path) -> Option<Self> {
        if path.file_name().and_then(|n| n.to_str()) == Some(".env") {
            return Some(FileFormat::Env);
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    fn name(self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Toml => "TOML",
            FileFormat::Env => "env",
        }
    }
}

/// Parses configuration documents into a JSON object.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Loader for the format implied by `path`
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::detect(path)
            .map(Self::new)
            .ok_or_else(|| ConfigError::load(path.display().to_string(), "unsupported file format"))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::load(path.display().to_string(), e))?;
        self.parse(&content)
    }

    /// Parse a document; the top level must be a table/object.
    pub fn parse(&self, content: &str) -> Result<Value> {
        let value = match self.format {
            FileFormat::Json => serde_json::from_str(content).map_err(|e| self.parse_error(e))?,
            FileFormat::Toml => {
                let table: toml::Table = toml::from_str(content).map_err(|e| self.parse_error(e))?;
                serde_json::to_value(table).map_err(|e| self.parse_error(e))?
            }
            FileFormat::Env => parse_env(content),
        };

        if value.is_object() {
            Ok(value)
        } else {
            Err(self.parse_error("top level must be a table"))
        }
    }

    fn parse_error(&self, message: impl ToString) -> ConfigError {
        ConfigError::ParseError {
            format: self.format.name(),
            message: message.to_string(),
        }
    }
}

/// `KEY=value` lines; blank lines, `#` comments and an `export ` prefix are
/// ignored, surrounding quotes are stripped. Keys are lower-cased.
fn parse_env(content: &str) -> Value {
    let mut map = Map::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            map.insert(key.trim().to_lowercase(), Value::String(value.to_string()));
        }
    }

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let value = loader
            .parse(r#"{"dispatcher": {"log_requests": true}}"#)
            .unwrap();
        assert_eq!(value["dispatcher"]["log_requests"], json!(true));
    }

    #[test]
    fn test_json_must_be_object() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let err = loader.parse("[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { format: "JSON", .. }));
    }

    #[test]
    fn test_parse_toml_sections() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let value = loader
            .parse(
                r#"
                [logging]
                level = "debug"
                format = "pretty"

                [dispatcher]
                warn_on_replace = false
                "#,
            )
            .unwrap();
        assert_eq!(value["logging"]["level"], json!("debug"));
        assert_eq!(value["dispatcher"]["warn_on_replace"], json!(false));
    }

    #[test]
    fn test_invalid_toml() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        assert!(loader.parse("level = ").is_err());
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let value = loader
            .parse(
                r#"
                LOG_LEVEL=debug
                # comment
                export LOG_FORMAT="compact"
                NAME='single quoted'
                "#,
            )
            .unwrap();
        assert_eq!(
            value,
            json!({ "log_level": "debug", "log_format": "compact", "name": "single quoted" })
        );
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("JSON"), Some(FileFormat::Json));
        assert_eq!(FileFormat::detect(Path::new("conf/trellis.toml")), Some(FileFormat::Toml));
        assert_eq!(FileFormat::detect(Path::new(".env")), Some(FileFormat::Env));
        assert_eq!(FileFormat::detect(Path::new("trellis.yaml")), None);
        assert!(ConfigLoader::auto("trellis.ini").is_err());
    }
}
