use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ClassifierError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    /// Per-provider settings, keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

/// Stage ordering and gating for the classification cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    #[serde(default = "default_llm_provider")]
    pub default_provider: String,
    #[serde(default = "default_statistical_provider")]
    pub statistical_provider: String,
    #[serde(default = "default_neural_provider")]
    pub neural_provider: String,
    /// Minimum confidence for the statistical stage to be accepted
    #[serde(default = "default_statistical_threshold")]
    pub statistical_threshold: f32,
    /// Minimum confidence for the neural stage to be accepted
    #[serde(default = "default_neural_threshold")]
    pub neural_threshold: f32,
    /// Per-request timeout for hosted provider calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bounded retry count for transient transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            default_provider: default_llm_provider(),
            statistical_provider: default_statistical_provider(),
            neural_provider: default_neural_provider(),
            statistical_threshold: default_statistical_threshold(),
            neural_threshold: default_neural_threshold(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Content sent to a provider is truncated to this many characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Shorter preview length used in logs and explanations
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            max_content_chars: default_max_content_chars(),
            preview_chars: default_preview_chars(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Settings entry for one registered provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible chat completion endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    /// Directory holding local model weights, config and tokenizer
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Maps local-model label ids to human-readable category names
    #[serde(default)]
    pub label_map: HashMap<String, String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted chat-completion service; prompted with schema instructions
    Chat,
    /// Local bag-of-words statistical model
    Statistical,
    /// Local neural model with tokenizer and feed-forward head
    Neural,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_statistical_provider() -> String {
    "statistical".to_string()
}

fn default_neural_provider() -> String {
    "neural".to_string()
}

fn default_statistical_threshold() -> f32 {
    0.75
}

fn default_neural_threshold() -> f32 {
    0.70
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_max_content_chars() -> usize {
    1000
}

fn default_preview_chars() -> usize {
    100
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ClassifierError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        tokio::fs::write(path, content).await.map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Example configuration with one provider of each kind, used by the
    /// init-config command
    pub fn example() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderSettings {
                kind: ProviderKind::Chat,
                api_key: Some("sk-your-api-key".to_string()),
                base_url: Some("https://api.openai.com".to_string()),
                model_name: Some("gpt-4o-mini".to_string()),
                model_path: None,
                label_map: HashMap::new(),
                temperature: None,
                max_tokens: None,
            },
        );
        providers.insert(
            "statistical".to_string(),
            ProviderSettings {
                kind: ProviderKind::Statistical,
                api_key: None,
                base_url: None,
                model_name: Some("bag-of-words".to_string()),
                model_path: Some(PathBuf::from("models/statistical")),
                label_map: HashMap::from([
                    ("0".to_string(), "spam".to_string()),
                    ("1".to_string(), "important".to_string()),
                ]),
                temperature: None,
                max_tokens: None,
            },
        );
        providers.insert(
            "neural".to_string(),
            ProviderSettings {
                kind: ProviderKind::Neural,
                api_key: None,
                base_url: None,
                model_name: Some("feed-forward".to_string()),
                model_path: Some(PathBuf::from("models/neural")),
                label_map: HashMap::from([
                    ("0".to_string(), "spam".to_string()),
                    ("1".to_string(), "important".to_string()),
                ]),
                temperature: None,
                max_tokens: None,
            },
        );

        Self {
            cascade: CascadeConfig::default(),
            classification: ClassificationConfig::default(),
            providers,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, threshold) in [
            ("statistical_threshold", self.cascade.statistical_threshold),
            ("neural_threshold", self.cascade.neural_threshold),
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ClassifierError::ConfigError(format!(
                    "cascade.{} must be between 0.0 and 1.0, got {}",
                    name, threshold
                )));
            }
        }

        if self.cascade.request_timeout_secs == 0 {
            return Err(ClassifierError::ConfigError(
                "cascade.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.classification.max_content_chars == 0 {
            return Err(ClassifierError::ConfigError(
                "classification.max_content_chars must be at least 1".to_string(),
            ));
        }
        if self.classification.preview_chars > self.classification.max_content_chars {
            return Err(ClassifierError::ConfigError(
                "classification.preview_chars cannot exceed max_content_chars".to_string(),
            ));
        }

        for (name, settings) in &self.providers {
            match settings.kind {
                ProviderKind::Chat => {
                    if settings.base_url.is_none() {
                        return Err(ClassifierError::ConfigError(format!(
                            "providers.{}: chat providers require base_url",
                            name
                        )));
                    }
                }
                ProviderKind::Statistical | ProviderKind::Neural => {
                    if settings.model_path.is_none() {
                        return Err(ClassifierError::ConfigError(format!(
                            "providers.{}: local providers require model_path",
                            name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
