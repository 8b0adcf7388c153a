//! Configuration file support
//!
//! Any serde type can be loaded from or saved to a `.toml` or `.ron` file;
//! the extension picks the format. A file can also be layered over an
//! existing value, so it only has to name the settings it changes.

pub use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Parse `contents` in this format
    pub fn parse<T: for<'de> Deserialize<'de>>(self, contents: &str) -> Result<T, ConfigError> {
        match self {
            Self::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Self::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Parse `contents` as a partial document layered over `base`
    ///
    /// Keys present in `contents` replace those of `base`, nested tables merge
    /// key by key, and RON `None` or `()` entries leave `base` untouched.
    pub fn parse_over<T>(self, contents: &str, base: &T) -> Result<T, ConfigError>
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let mut merged = toml::Table::try_from(base).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let overlay = match self {
            Self::Toml => toml::from_str::<toml::Table>(contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
            Self::Ron => {
                let value: ron::Value = ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
                match ron_to_toml(value)? {
                    Some(toml::Value::Table(table)) => table,
                    _ => return Err(ConfigError::Parse("RON document is not a struct".to_string())),
                }
            }
        };
        merge_tables(&mut merged, overlay);
        merged.try_into().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Render `value` in this format
    pub fn render<T: Serialize>(self, value: &T) -> Result<String, ConfigError> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string())),
            Self::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }
}

/// Overwrite `base` with `overlay`, recursing into tables present in both
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, nested);
                    continue;
                }
                base.insert(key, toml::Value::Table(nested));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Convert a RON value to TOML; `None` and unit have no TOML form and yield `None`
fn ron_to_toml(value: ron::Value) -> Result<Option<toml::Value>, ConfigError> {
    let converted = match value {
        ron::Value::Bool(b) => toml::Value::Boolean(b),
        ron::Value::Char(c) => toml::Value::String(c.to_string()),
        ron::Value::String(s) => toml::Value::String(s),
        ron::Value::Number(ron::Number::Integer(i)) => toml::Value::Integer(i),
        ron::Value::Number(ron::Number::Float(f)) => toml::Value::Float(f.get()),
        ron::Value::Option(None) | ron::Value::Unit => return Ok(None),
        ron::Value::Option(Some(inner)) => return ron_to_toml(*inner),
        ron::Value::Seq(items) => {
            let mut array = Vec::with_capacity(items.len());
            for item in items {
                if let Some(item) = ron_to_toml(item)? {
                    array.push(item);
                }
            }
            toml::Value::Array(array)
        }
        ron::Value::Map(map) => {
            let mut table = toml::Table::new();
            for (key, value) in map {
                let key = match key {
                    ron::Value::String(key) => key,
                    other => return Err(ConfigError::Parse(format!("Unsupported RON map key {other:?}"))),
                };
                if let Some(value) = ron_to_toml(value)? {
                    table.insert(key, value);
                }
            }
            toml::Value::Table(table)
        }
    };
    Ok(Some(converted))
}

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let config = format.parse(&contents)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load a file that only overrides some of `base`'s settings
    fn load_over_file<P: AsRef<Path>>(path: P, base: &Self) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let config = format.parse_over(&contents, base)?;
        log::info!("Loaded configuration overrides from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = ConfigFormat::from_path(path)?.render(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but make no sense together
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("b.RON")).unwrap(), ConfigFormat::Ron);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("b.json")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(ConfigFormat::from_path(Path::new("no_extension")).is_err());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        name: String,
        size: (u32, u32),
        scale: Option<f32>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Outer {
        inner: Inner,
        flag: bool,
    }

    fn base() -> Outer {
        Outer {
            inner: Inner {
                name: "base".to_string(),
                size: (800, 600),
                scale: Some(0.5),
            },
            flag: true,
        }
    }

    #[test]
    fn test_toml_overrides_only_named_keys() {
        let merged: Outer = ConfigFormat::Toml.parse_over("[inner]\nsize = [1024, 768]\n", &base()).unwrap();
        assert_eq!(merged.inner.size, (1024, 768));
        assert_eq!(merged.inner.name, "base");
        assert_eq!(merged.inner.scale, Some(0.5));
        assert!(merged.flag);
    }

    #[test]
    fn test_ron_overrides_only_named_keys() {
        let merged: Outer = ConfigFormat::Ron
            .parse_over("(inner: (name: \"ron\", scale: None), flag: false)", &base())
            .unwrap();
        assert_eq!(merged.inner.name, "ron");
        assert_eq!(merged.inner.size, (800, 600));
        assert_eq!(merged.inner.scale, Some(0.5));
        assert!(!merged.flag);
    }

    #[test]
    fn test_overlay_type_mismatch_is_parse_error() {
        let result: Result<Outer, _> = ConfigFormat::Toml.parse_over("flag = \"yes\"\n", &base());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result: Result<Vec<u32>, _> = ConfigFormat::Ron.parse("[1, 2,");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
