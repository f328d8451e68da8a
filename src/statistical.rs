//! Lightweight statistical classification tier.
//!
//! A log-linear bag-of-words model (naive Bayes style) loaded from a JSON
//! file. Cheap enough to run on every request before any neural or hosted
//! model is consulted. The provider wraps inference in the shared response
//! schema; inference failures degrade to a well-formed "unknown" reply so
//! callers always get parseable text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

use crate::config::ProviderKind;
use crate::error::{ClassifierError, Result};
use crate::parser;
use crate::provider::CompletionProvider;

/// Input is trimmed and capped before inference
const MAX_INPUT_CHARS: usize = 100;

/// Serialized model: per-label log priors and per-token log likelihoods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalModel {
    pub labels: Vec<String>,
    pub log_priors: Vec<f64>,
    /// token -> one log likelihood per label
    pub token_log_likelihoods: HashMap<String, Vec<f64>>,
    /// log likelihood applied to out-of-vocabulary tokens
    pub default_log_likelihood: f64,
}

impl StatisticalModel {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::ConfigError(format!(
                "Failed to read statistical model {:?}: {}",
                path, e
            ))
        })?;
        let model: Self = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::ConfigError(format!(
                "Failed to parse statistical model {:?}: {}",
                path, e
            ))
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.labels.is_empty() {
            return Err(ClassifierError::ConfigError(
                "Statistical model has no labels".to_string(),
            ));
        }
        if self.log_priors.len() != self.labels.len() {
            return Err(ClassifierError::ConfigError(
                "Statistical model log_priors length does not match labels".to_string(),
            ));
        }
        for (token, likelihoods) in &self.token_log_likelihoods {
            if likelihoods.len() != self.labels.len() {
                return Err(ClassifierError::ConfigError(format!(
                    "Statistical model token '{}' has wrong likelihood count",
                    token
                )));
            }
        }
        Ok(())
    }

    /// Score the input and return the best label with a softmax confidence
    pub fn predict(&self, text: &str) -> Result<(String, f32)> {
        let normalized = normalize(text);
        let tokens = tokenize(&normalized);
        if tokens.is_empty() {
            return Err(ClassifierError::InferenceError(
                "No tokens after normalization".to_string(),
            ));
        }

        let mut scores = self.log_priors.clone();
        for token in &tokens {
            match self.token_log_likelihoods.get(token.as_str()) {
                Some(likelihoods) => {
                    for (score, ll) in scores.iter_mut().zip(likelihoods) {
                        *score += ll;
                    }
                }
                None => {
                    for score in scores.iter_mut() {
                        *score += self.default_log_likelihood;
                    }
                }
            }
        }

        let (best_idx, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| ClassifierError::InferenceError("Empty score vector".to_string()))?;

        let confidence = softmax_confidence(&scores, best_idx);
        Ok((self.labels[best_idx].clone(), confidence as f32))
    }
}

/// Strip newlines and cap length, mirroring what the model was trained on
fn normalize(text: &str) -> String {
    text.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(MAX_INPUT_CHARS)
        .collect::<String>()
        .to_lowercase()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn softmax_confidence(scores: &[f64], index: usize) -> f64 {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = scores.iter().map(|s| (s - max).exp()).sum();
    (scores[index] - max).exp() / sum
}

/// Provider wrapping the statistical model behind the shared contract
pub struct StatisticalProvider {
    model: StatisticalModel,
    label_map: HashMap<String, String>,
    name: String,
    model_name: String,
}

impl StatisticalProvider {
    pub fn new(
        name: String,
        model_name: String,
        model: StatisticalModel,
        label_map: HashMap<String, String>,
    ) -> Self {
        Self {
            model,
            label_map,
            name,
            model_name,
        }
    }

    pub fn load(
        name: String,
        model_name: String,
        model_dir: &Path,
        label_map: HashMap<String, String>,
    ) -> Result<Self> {
        let model = StatisticalModel::load(&model_dir.join("model.json"))?;
        Ok(Self::new(name, model_name, model, label_map))
    }

    /// Map a raw model label to a human-readable category name
    fn category_name(&self, label: &str) -> String {
        self.label_map
            .get(label)
            .cloned()
            .unwrap_or_else(|| "none".to_string())
    }
}

#[async_trait]
impl CompletionProvider for StatisticalProvider {
    async fn generate_completion(
        &self,
        _system_message: &str,
        user_message: &str,
    ) -> Result<String> {
        match self.model.predict(user_message) {
            Ok((label, confidence)) => {
                let category = self.category_name(&label);
                debug!(
                    "Statistical prediction: {} ({}) with confidence {:.2}%",
                    label,
                    category,
                    confidence * 100.0
                );
                Ok(parser::synthesize(
                    &category,
                    confidence,
                    &format!(
                        "Statistical model predicted {} with {:.2}% confidence",
                        category,
                        confidence * 100.0
                    ),
                ))
            }
            Err(e) => {
                error!("Error in statistical prediction: {}", e);
                Ok(parser::synthesize(
                    "unknown",
                    0.0,
                    "Error in statistical prediction",
                ))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Statistical
    }
}

/// Two-label fixture shared with registry tests
#[cfg(test)]
pub(crate) fn test_model() -> StatisticalModel {
    let mut token_log_likelihoods = HashMap::new();
    // "invoice" strongly indicates finance, "sale" indicates marketing
    token_log_likelihoods.insert("invoice".to_string(), vec![-0.5, -4.0]);
    token_log_likelihoods.insert("payment".to_string(), vec![-0.8, -3.5]);
    token_log_likelihoods.insert("sale".to_string(), vec![-4.0, -0.5]);
    token_log_likelihoods.insert("discount".to_string(), vec![-3.5, -0.8]);

    StatisticalModel {
        labels: vec!["0".to_string(), "1".to_string()],
        log_priors: vec![-0.69, -0.69],
        token_log_likelihoods,
        default_log_likelihood: -2.0,
    }
}
