//! Configuration loader

use crate::config::Conf;
use crate::install::write_atomic;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

/// Errors reading or writing the configuration document
#[derive(Debug, Error)]
pub enum ConfLoadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

/// On-disk format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfFormat {
    Json,
    Toml,
}

impl ConfFormat {
    /// TOML for `.toml` files, JSON for everything else
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => ConfFormat::Toml,
            _ => ConfFormat::Json,
        }
    }
}

/// Reads and writes the configuration document
pub struct ConfLoader;

impl ConfLoader {
    /// Load the document from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Conf, ConfLoadError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfLoadError::Read {
            path: shown.clone(),
            source,
        })?;

        tracing::debug!("📄 Loading {}", shown);
        match ConfFormat::from_path(path) {
            ConfFormat::Json => Self::parse_json(&content, shown),
            ConfFormat::Toml => Self::parse_toml(&content, shown),
        }
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<Conf, ConfLoadError> {
        Self::parse_json(content, "<json>".to_string())
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<Conf, ConfLoadError> {
        Self::parse_toml(content, "<toml>".to_string())
    }

    fn parse_json(content: &str, path: String) -> Result<Conf, ConfLoadError> {
        serde_json::from_str(content).map_err(|source| ConfLoadError::Json { path, source })
    }

    fn parse_toml(content: &str, path: String) -> Result<Conf, ConfLoadError> {
        toml::from_str(content).map_err(|source| ConfLoadError::Toml { path, source })
    }

    /// JSON indented with four spaces, trailing newline included
    pub fn to_json(conf: &Conf) -> Result<String, ConfLoadError> {
        Self::write_json(&Self::to_value(conf)?)
    }

    fn to_value(conf: &Conf) -> Result<Value, ConfLoadError> {
        serde_json::to_value(conf).map_err(|e| ConfLoadError::Serialize(e.to_string()))
    }

    fn write_json(value: &Value) -> Result<String, ConfLoadError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| ConfLoadError::Serialize(e.to_string()))?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(|e| ConfLoadError::Serialize(e.to_string()))
    }

    /// 💾 Save the document atomically, in the format its extension names.
    ///
    /// When a JSON document already exists at `path`, its key order is kept
    /// and keys it did not have are appended.
    pub fn save<P: AsRef<Path>>(conf: &Conf, path: P) -> Result<(), ConfLoadError> {
        let path = path.as_ref();
        let text = match ConfFormat::from_path(path) {
            ConfFormat::Json => {
                let value = Self::to_value(conf)?;
                let previous = std::fs::read_to_string(path)
                    .ok()
                    .and_then(|text| serde_json::from_str::<Value>(&text).ok());
                match previous {
                    Some(previous) => Self::write_json(&follow_key_order(value, &previous))?,
                    None => Self::write_json(&value)?,
                }
            }
            ConfFormat::Toml => toml::to_string_pretty(conf)
                .map_err(|e| ConfLoadError::Serialize(e.to_string()))?,
        };

        write_atomic(path, text.as_bytes()).map_err(|source| ConfLoadError::Write {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("💾 Saved configuration to {}", path.display());
        Ok(())
    }
}

/// Order object keys like `previous`, recursing into objects and arrays
/// that line up; keys `previous` lacks come last
fn follow_key_order(value: Value, previous: &Value) -> Value {
    match (value, previous) {
        (Value::Object(fresh), Value::Object(old)) => {
            let mut ordered = Map::new();
            for (key, old_value) in old {
                if let Some(v) = fresh.get(key) {
                    ordered.insert(key.clone(), follow_key_order(v.clone(), old_value));
                }
            }
            for (key, v) in fresh {
                if !ordered.contains_key(&key) {
                    ordered.insert(key, v);
                }
            }
            Value::Object(ordered)
        }
        (Value::Array(items), Value::Array(old)) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| match old.get(i) {
                    Some(old_item) => follow_key_order(v, old_item),
                    None => v,
                })
                .collect(),
        ),
        (value, _) => value,
    }
}
