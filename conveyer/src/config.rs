//! Pipeline configuration.
//!
//! Configuration is plain data: a channel buffer size and the marker strings
//! the built-in stages react to. It can be built in code or loaded from a
//! JSON or TOML document.

use crate::errors::{ConveyerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Marker strings used by the built-in stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Prefix the decorator prepends to messages.
    #[serde(default = "default_decorator_prefix")]
    pub decorator_prefix: String,
    /// Substring that makes the decorator fail.
    #[serde(default = "default_poison_marker")]
    pub poison_marker: String,
    /// Substring that makes the multiplexer drop a message.
    #[serde(default = "default_skip_marker")]
    pub skip_marker: String,
}

fn default_decorator_prefix() -> String {
    "decorated: ".to_string()
}

fn default_poison_marker() -> String {
    "no decorator".to_string()
}

fn default_skip_marker() -> String {
    "no multiplexer".to_string()
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            decorator_prefix: default_decorator_prefix(),
            poison_marker: default_poison_marker(),
            skip_marker: default_skip_marker(),
        }
    }
}

/// Configuration for a pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of every channel the pipeline creates.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Markers for the built-in stages.
    #[serde(default)]
    pub markers: MarkerConfig,
}

fn default_buffer_size() -> usize {
    10
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            markers: MarkerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the channel buffer size.
    #[must_use]
    pub const fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the decorator prefix.
    #[must_use]
    pub fn with_decorator_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.markers.decorator_prefix = prefix.into();
        self
    }

    /// Sets the poison marker.
    #[must_use]
    pub fn with_poison_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.poison_marker = marker.into();
        self
    }

    /// Sets the skip marker.
    #[must_use]
    pub fn with_skip_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.skip_marker = marker.into();
        self
    }

    /// Parses a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| ConveyerError::Config(e.to_string()))
    }

    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ConveyerError::Config(e.to_string()))
    }

    /// Loads a configuration file, choosing the format by extension.
    ///
    /// `.json` is parsed as JSON; `.toml` or no extension as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") | None => Self::from_toml_str(&contents),
            Some(other) => Err(ConveyerError::Config(format!(
                "unsupported config extension '.{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.markers.decorator_prefix, "decorated: ");
        assert_eq!(config.markers.poison_marker, "no decorator");
        assert_eq!(config.markers.skip_marker, "no multiplexer");
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = PipelineConfig::from_json_str(r#"{"buffer_size": 4}"#).unwrap();
        assert_eq!(config.buffer_size, 4);
        assert_eq!(config.markers, MarkerConfig::default());
    }

    #[test]
    fn test_toml_markers() {
        let config = PipelineConfig::from_toml_str(
            r#"
            buffer_size = 2

            [markers]
            poison_marker = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.buffer_size, 2);
        assert_eq!(config.markers.poison_marker, "reject");
        assert_eq!(config.markers.skip_marker, "no multiplexer");
    }

    #[test]
    fn test_invalid_document() {
        let err = PipelineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConveyerError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "buffer_size = 7").unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.buffer_size, 7);
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = PipelineConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(".yaml"));
    }

    #[test]
    fn test_builder_setters() {
        let config = PipelineConfig::new()
            .with_buffer_size(1)
            .with_decorator_prefix(">> ")
            .with_poison_marker("bad")
            .with_skip_marker("skip");

        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.markers.decorator_prefix, ">> ");
        assert_eq!(config.markers.poison_marker, "bad");
        assert_eq!(config.markers.skip_marker, "skip");
    }
}
