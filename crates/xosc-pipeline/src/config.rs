//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! schema_path = "xsd/OpenSCENARIO.xsd"
//! validator = "xmllint"
//! seed = 42
//!
//! [injection]
//! pedestrian_rate = 0.2
//! cloud_rate = 0.2
//! sun_rate = 0.2
//! fog_rate = 1.0
//!
//! [llm]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-5"
//! api_key_env = "OPENAI_API_KEY"
//! max_attempts = 6
//! base_delay_ms = 1000
//! ```

use crate::error::ConfigLoadError;
use crate::generate::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use xosc_transform::{InjectionConfig, SchemaValidator, VocabularyValidator, XmllintValidator};

/// Which schema validator backs the gate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    /// External `xmllint` with full XSD semantics
    #[default]
    Xmllint,
    /// Element vocabulary check, no external tool
    Vocabulary,
}

impl std::str::FromStr for ValidatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xmllint" => Ok(Self::Xmllint),
            "vocabulary" => Ok(Self::Vocabulary),
            other => Err(format!("unknown validator '{other}'")),
        }
    }
}

/// Text-generation service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl LlmConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-5".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_attempts: 6,
            base_delay_ms: 1000,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema_path: PathBuf,
    pub validator: ValidatorKind,
    /// Run seed for injection
    pub seed: u64,
    pub injection: InjectionConfig,
    pub llm: LlmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from("xsd/OpenSCENARIO.xsd"),
            validator: ValidatorKind::default(),
            seed: 42,
            injection: InjectionConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigLoadError`] if the file cannot be read, parsed, or has
    /// invalid rates.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    /// Returns [`ConfigLoadError`] on syntax errors or invalid rates.
    pub fn from_toml(text: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(text)?;
        config.injection.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    #[must_use]
    pub fn with_validator(mut self, kind: ValidatorKind) -> Self {
        self.validator = kind;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Instantiate the configured validator
    #[must_use]
    pub fn build_validator(&self) -> Arc<dyn SchemaValidator> {
        match self.validator {
            ValidatorKind::Xmllint => Arc::new(XmllintValidator::new(&self.schema_path)),
            ValidatorKind::Vocabulary => Arc::new(VocabularyValidator::load(&self.schema_path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.seed, 42);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            validator = "vocabulary"
            seed = 7

            [injection]
            pedestrian_rate = 0.5

            [llm]
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.validator, ValidatorKind::Vocabulary);
        assert_eq!(config.seed, 7);
        assert_eq!(config.injection.pedestrian_rate, 0.5);
        assert_eq!(config.injection.fog_rate, 1.0);
        assert_eq!(config.llm.max_attempts, 2);
        assert_eq!(config.llm.model, "gpt-5");
    }

    #[test]
    fn invalid_rates_are_rejected() {
        let err = PipelineConfig::from_toml("[injection]\ncloud_rate = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
    }

    #[test]
    fn unknown_validator_is_a_syntax_error() {
        let err = PipelineConfig::from_toml("validator = \"lxml\"").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Toml(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xosc.toml");
        std::fs::write(&path, "schema_path = \"schema.xsd\"\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.schema_path, PathBuf::from("schema.xsd"));
        assert!(matches!(
            PipelineConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigLoadError::Io { .. })
        ));
    }

    #[test]
    fn retry_policy_from_llm_settings() {
        let policy = LlmConfig::default().retry_policy();
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }
}
