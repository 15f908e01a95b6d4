//! Runtime configuration for the semantic text core.
//!
//! [`SemanticTextConfig`] controls document-build limits and whether a
//! field's schema may be established from data rather than from an explicit
//! mapping declaration. It is cheap to clone and serializes cleanly from
//! JSON, TOML, or YAML, so deployments can ship it alongside the rest of
//! their index configuration.
//!
//! # Quick start
//!
//! ```rust
//! use semtext::SemanticTextConfig;
//!
//! let config = SemanticTextConfig::default();
//! config.validate().expect("default config is valid");
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by [`SemanticTextConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_chunks must be greater than zero when set")]
    ZeroMaxChunks,
    #[error("max_dimensions must be greater than zero")]
    ZeroMaxDimensions,
}

/// Runtime configuration for parsing and document building.
///
/// # Serialization
///
/// ```json
/// {
///   "version": 1,
///   "max_chunks": 1024,
///   "max_dimensions": 4096,
///   "settings_from_data": true
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticTextConfig {
    /// Version of this configuration layout. Bump on breaking changes.
    #[serde(default = "SemanticTextConfig::default_version")]
    pub version: u32,

    /// Maximum number of chunks accepted per field per document.
    ///
    /// Inference services chunk long inputs; this bounds the number of
    /// child records a single document may fan out into. `None` disables
    /// the limit.
    ///
    /// Default: `None`
    #[serde(default)]
    pub max_chunks: Option<usize>,

    /// Upper bound for declared dense vector dimensions.
    ///
    /// Default: `4096`
    #[serde(default = "SemanticTextConfig::default_max_dimensions")]
    pub max_dimensions: u32,

    /// Whether a field whose settings were never declared may have its
    /// schema auto-established by the first document carrying inference
    /// results. When `false`, such documents are rejected and the schema
    /// must come from an explicit mapping declaration.
    ///
    /// Default: `true`
    #[serde(default = "SemanticTextConfig::default_settings_from_data")]
    pub settings_from_data: bool,
}

impl SemanticTextConfig {
    pub(crate) fn default_version() -> u32 {
        1
    }

    pub(crate) fn default_max_dimensions() -> u32 {
        4096
    }

    pub(crate) fn default_settings_from_data() -> bool {
        true
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = Some(max_chunks);
        self
    }

    pub fn with_max_dimensions(mut self, max_dimensions: u32) -> Self {
        self.max_dimensions = max_dimensions;
        self
    }

    pub fn with_settings_from_data(mut self, allowed: bool) -> Self {
        self.settings_from_data = allowed;
        self
    }

    /// Validates limit fields. Call once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunks == Some(0) {
            return Err(ConfigError::ZeroMaxChunks);
        }
        if self.max_dimensions == 0 {
            return Err(ConfigError::ZeroMaxDimensions);
        }
        Ok(())
    }
}

impl Default for SemanticTextConfig {
    fn default() -> Self {
        SemanticTextConfig {
            version: Self::default_version(),
            max_chunks: None,
            max_dimensions: Self::default_max_dimensions(),
            settings_from_data: Self::default_settings_from_data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SemanticTextConfig::default();
        config.validate().expect("default config");
        assert_eq!(config.version, 1);
        assert!(config.max_chunks.is_none());
        assert!(config.settings_from_data);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = SemanticTextConfig::default().with_max_chunks(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxChunks));

        let config = SemanticTextConfig::default().with_max_dimensions(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxDimensions));
    }

    #[test]
    fn deserializes_with_defaults_for_missing_keys() {
        let config: SemanticTextConfig =
            serde_json::from_str("{}").expect("empty object deserializes");
        assert_eq!(config.version, 1);
        assert_eq!(config.max_dimensions, 4096);
        assert!(config.settings_from_data);
    }

    #[test]
    fn builder_style_overrides() {
        let config = SemanticTextConfig::default()
            .with_max_chunks(16)
            .with_settings_from_data(false);
        assert_eq!(config.max_chunks, Some(16));
        assert!(!config.settings_from_data);
    }
}
