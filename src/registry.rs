//! Provider registry: resolves a provider name plus stored settings (and
//! caller overrides) to a live provider instance. The same classification
//! flow runs against a hosted LLM or a local model with no branching in the
//! orchestrator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use crate::config::{Config, ProviderKind, ProviderSettings};
use crate::error::{ClassifierError, Result};
use crate::neural::NeuralProvider;
use crate::provider::{ChatProvider, ChatProviderConfig, CompletionProvider};
use crate::statistical::StatisticalProvider;

/// Caller-supplied configuration overrides; set fields win over stored
/// defaults
#[derive(Debug, Clone, Default)]
pub struct ProviderOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model_name: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub struct ProviderRegistry {
    config: Config,
    /// Local models are expensive to load, so instances are reused
    local_cache: Mutex<HashMap<String, Arc<dyn CompletionProvider>>>,
}

impl ProviderRegistry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            local_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a provider name to a live instance.
    ///
    /// Fails with a configuration error if the name has no settings entry
    /// or the resolved settings are incomplete.
    pub fn create(
        &self,
        provider_name: &str,
        overrides: Option<ProviderOverrides>,
    ) -> Result<Arc<dyn CompletionProvider>> {
        let name = provider_name.to_lowercase();
        let settings = self.config.providers.get(&name).ok_or_else(|| {
            ClassifierError::ConfigError(format!(
                "No configuration found for provider: {}",
                provider_name
            ))
        })?;

        let overrides = overrides.unwrap_or_default();
        info!("Creating {:?} provider: {}", settings.kind, name);

        match settings.kind {
            ProviderKind::Chat => self.create_chat(&name, settings, overrides),
            ProviderKind::Statistical | ProviderKind::Neural => {
                // Overrides carry chat-oriented fields; local providers are
                // fully described by their stored settings
                self.create_local(&name, settings, overrides.model_name)
            }
        }
    }

    fn create_chat(
        &self,
        name: &str,
        settings: &ProviderSettings,
        overrides: ProviderOverrides,
    ) -> Result<Arc<dyn CompletionProvider>> {
        let api_key = overrides
            .api_key
            .or_else(|| settings.api_key.clone())
            .ok_or_else(|| {
                ClassifierError::ConfigError(format!("providers.{}: missing api_key", name))
            })?;
        let base_url = overrides
            .base_url
            .or_else(|| settings.base_url.clone())
            .ok_or_else(|| {
                ClassifierError::ConfigError(format!("providers.{}: missing base_url", name))
            })?;
        let model_name = overrides
            .model_name
            .or_else(|| settings.model_name.clone())
            .ok_or_else(|| {
                ClassifierError::ConfigError(format!("providers.{}: missing model_name", name))
            })?;

        let provider = ChatProvider::new(ChatProviderConfig {
            name: name.to_string(),
            api_key,
            base_url,
            model_name,
            temperature: overrides
                .temperature
                .or(settings.temperature)
                .unwrap_or(self.config.classification.temperature),
            max_tokens: overrides
                .max_tokens
                .or(settings.max_tokens)
                .unwrap_or(self.config.classification.max_tokens),
            request_timeout: Duration::from_secs(self.config.cascade.request_timeout_secs),
            max_retries: self.config.cascade.max_retries,
        })?;

        Ok(Arc::new(provider))
    }

    fn create_local(
        &self,
        name: &str,
        settings: &ProviderSettings,
        model_name_override: Option<String>,
    ) -> Result<Arc<dyn CompletionProvider>> {
        if model_name_override.is_none() {
            let mut cache = self
                .local_cache
                .lock()
                .map_err(|_| ClassifierError::ConfigError("Provider cache poisoned".to_string()))?;
            if let Some(provider) = cache.get(name) {
                return Ok(Arc::clone(provider));
            }
            let provider = self.load_local(name, settings, None)?;
            cache.insert(name.to_string(), Arc::clone(&provider));
            return Ok(provider);
        }

        self.load_local(name, settings, model_name_override)
    }

    fn load_local(
        &self,
        name: &str,
        settings: &ProviderSettings,
        model_name_override: Option<String>,
    ) -> Result<Arc<dyn CompletionProvider>> {
        let model_dir = settings.model_path.as_ref().ok_or_else(|| {
            ClassifierError::ConfigError(format!("providers.{}: missing model_path", name))
        })?;
        let model_name = model_name_override
            .or_else(|| settings.model_name.clone())
            .unwrap_or_else(|| match settings.kind {
                ProviderKind::Statistical => "bag-of-words".to_string(),
                _ => "feed-forward".to_string(),
            });

        let provider: Arc<dyn CompletionProvider> = match settings.kind {
            ProviderKind::Statistical => Arc::new(StatisticalProvider::load(
                name.to_string(),
                model_name,
                model_dir,
                settings.label_map.clone(),
            )?),
            ProviderKind::Neural => Arc::new(NeuralProvider::load(
                name.to_string(),
                model_name,
                model_dir,
                settings.label_map.clone(),
            )?),
            ProviderKind::Chat => unreachable!("chat providers are not local"),
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use std::io::Write;

    fn chat_settings() -> ProviderSettings {
        ProviderSettings {
            kind: ProviderKind::Chat,
            api_key: Some("sk-default".to_string()),
            base_url: Some("https://api.example.com".to_string()),
            model_name: Some("default-model".to_string()),
            model_path: None,
            label_map: Map::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    fn registry_with(name: &str, settings: ProviderSettings) -> ProviderRegistry {
        let mut config = Config::default();
        config.providers.insert(name.to_string(), settings);
        ProviderRegistry::new(config)
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new(Config::default());
        let err = registry.create("nonexistent", None).unwrap_err();
        assert!(matches!(err, ClassifierError::ConfigError(_)));
    }

    #[test]
    fn test_chat_provider_resolution() {
        let registry = registry_with("deepseek", chat_settings());
        let provider = registry.create("deepseek", None).unwrap();
        assert_eq!(provider.name(), "deepseek");
        assert_eq!(provider.model_name(), "default-model");
        assert_eq!(provider.kind(), ProviderKind::Chat);
    }

    #[test]
    fn test_provider_name_case_insensitive() {
        let registry = registry_with("deepseek", chat_settings());
        assert!(registry.create("DeepSeek", None).is_ok());
    }

    #[test]
    fn test_caller_overrides_win() {
        let registry = registry_with("deepseek", chat_settings());
        let provider = registry
            .create(
                "deepseek",
                Some(ProviderOverrides {
                    model_name: Some("deepseek-chat".to_string()),
                    ..Default::default()
                }),
            )
            .unwrap();
        assert_eq!(provider.model_name(), "deepseek-chat");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut settings = chat_settings();
        settings.api_key = None;
        let registry = registry_with("openai", settings);
        assert!(registry.create("openai", None).is_err());

        // But an override can supply it
        let mut settings = chat_settings();
        settings.api_key = None;
        let registry = registry_with("openai", settings);
        let provider = registry.create(
            "openai",
            Some(ProviderOverrides {
                api_key: Some("sk-override".to_string()),
                ..Default::default()
            }),
        );
        assert!(provider.is_ok());
    }

    #[test]
    fn test_statistical_provider_loaded_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let model = crate::statistical::test_model();
        let mut file = std::fs::File::create(dir.path().join("model.json")).unwrap();
        file.write_all(serde_json::to_string(&model).unwrap().as_bytes())
            .unwrap();

        let settings = ProviderSettings {
            kind: ProviderKind::Statistical,
            api_key: None,
            base_url: None,
            model_name: None,
            model_path: Some(dir.path().to_path_buf()),
            label_map: Map::new(),
            temperature: None,
            max_tokens: None,
        };
        let registry = registry_with("statistical", settings);

        let first = registry.create("statistical", None).unwrap();
        let second = registry.create("statistical", None).unwrap();
        assert_eq!(first.kind(), ProviderKind::Statistical);
        // Same cached instance
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_local_provider_missing_model_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ProviderSettings {
            kind: ProviderKind::Statistical,
            api_key: None,
            base_url: None,
            model_name: None,
            model_path: Some(dir.path().to_path_buf()),
            label_map: Map::new(),
            temperature: None,
            max_tokens: None,
        };
        let registry = registry_with("statistical", settings);
        assert!(registry.create("statistical", None).is_err());
    }
}
