//! Neural classification tier backed by Candle.
//!
//! Loads a tokenizer and a feed-forward classification head from a model
//! directory, runs inference on CPU without gradient tracking, and maps the
//! argmax label id to a category name. Like the statistical tier, inference
//! failures become a well-formed "unknown" response.

use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{embedding, linear, Embedding, Linear, VarBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, error, info};

use crate::config::ProviderKind;
use crate::error::{ClassifierError, Result};
use crate::parser;
use crate::provider::CompletionProvider;

/// Architecture description stored next to the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralModelConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub hidden_dim: usize,
    pub num_labels: usize,
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
    #[serde(default)]
    pub pad_token_id: u32,
}

fn default_max_seq_len() -> usize {
    128
}

impl NeuralModelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to read model config {:?}: {}", path, e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to parse model config {:?}: {}", path, e))
        })
    }
}

/// Embedding + two-layer feed-forward classification head
pub struct ClassifierNet {
    embeddings: Embedding,
    fc1: Linear,
    fc2: Linear,
}

impl ClassifierNet {
    pub fn new(config: &NeuralModelConfig, vb: VarBuilder) -> Result<Self> {
        let embeddings = embedding(config.vocab_size, config.embedding_dim, vb.pp("embeddings"))
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to build embeddings: {}", e)))?;
        let fc1 = linear(config.embedding_dim, config.hidden_dim, vb.pp("fc1"))
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to build fc1: {}", e)))?;
        let fc2 = linear(config.hidden_dim, config.num_labels, vb.pp("fc2"))
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to build fc2: {}", e)))?;
        Ok(Self {
            embeddings,
            fc1,
            fc2,
        })
    }

    /// Forward pass over one padded token sequence, returning class
    /// probabilities after softmax
    pub fn forward(&self, token_ids: &[u32], device: &Device) -> Result<Vec<f32>> {
        let run = || -> candle_core::Result<Vec<f32>> {
            let input = Tensor::new(token_ids, device)?.unsqueeze(0)?;
            let embedded = self.embeddings.forward(&input)?;
            // Mean-pool over the sequence dimension
            let pooled = embedded.mean(1)?;
            let hidden = self.fc1.forward(&pooled)?.relu()?;
            let logits = self.fc2.forward(&hidden)?;
            let probs = candle_nn::ops::softmax_last_dim(&logits)?;
            probs.squeeze(0)?.to_vec1::<f32>()
        };
        run().map_err(|e| ClassifierError::InferenceError(e.to_string()))
    }
}

/// Provider wrapping the neural classifier behind the shared contract
pub struct NeuralProvider {
    tokenizer: Tokenizer,
    net: ClassifierNet,
    config: NeuralModelConfig,
    label_map: HashMap<String, String>,
    name: String,
    model_name: String,
    device: Device,
}

impl NeuralProvider {
    /// Load tokenizer, architecture config and weights from a model
    /// directory containing `tokenizer.json`, `model.json` and
    /// `model.safetensors`
    pub fn load(
        name: String,
        model_name: String,
        model_dir: &Path,
        label_map: HashMap<String, String>,
    ) -> Result<Self> {
        info!("Loading neural model from {:?}", model_dir);

        let config = NeuralModelConfig::load(&model_dir.join("model.json"))?;

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json")).map_err(|e| {
            ClassifierError::ConfigError(format!("Failed to load tokenizer: {}", e))
        })?;

        let device = Device::Cpu;
        let weights_path = model_dir.join("model.safetensors");
        let tensors = candle_core::safetensors::load(&weights_path, &device).map_err(|e| {
            ClassifierError::ConfigError(format!(
                "Failed to load weights {:?}: {}",
                weights_path, e
            ))
        })?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let net = ClassifierNet::new(&config, vb)?;

        info!("Neural model loaded successfully");
        Ok(Self {
            tokenizer,
            net,
            config,
            label_map,
            name,
            model_name,
            device,
        })
    }

    /// Tokenize, pad/truncate to the fixed sequence length, run the
    /// forward pass and return the argmax label id with its probability
    fn predict(&self, text: &str) -> Result<(usize, f32)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::InferenceError(format!("Tokenization failed: {}", e)))?;

        let token_ids = pad_or_truncate(
            encoding.get_ids(),
            self.config.max_seq_len,
            self.config.pad_token_id,
        );

        let probs = self.net.forward(&token_ids, &self.device)?;
        argmax(&probs)
            .ok_or_else(|| ClassifierError::InferenceError("Empty probability vector".to_string()))
    }

    fn category_name(&self, label_id: usize) -> String {
        self.label_map
            .get(&label_id.to_string())
            .cloned()
            .unwrap_or_else(|| "none".to_string())
    }
}

/// Fixed-length input: truncate long sequences, pad short ones
pub fn pad_or_truncate(ids: &[u32], max_len: usize, pad_id: u32) -> Vec<u32> {
    let mut out: Vec<u32> = ids.iter().take(max_len).copied().collect();
    out.resize(max_len, pad_id);
    out
}

fn argmax(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, p)| (i, *p))
}

#[async_trait]
impl CompletionProvider for NeuralProvider {
    async fn generate_completion(
        &self,
        _system_message: &str,
        user_message: &str,
    ) -> Result<String> {
        match self.predict(user_message) {
            Ok((label_id, confidence)) => {
                let category = self.category_name(label_id);
                debug!(
                    "Neural prediction: {} label: {} with confidence {:.2}%",
                    label_id,
                    category,
                    confidence * 100.0
                );
                Ok(parser::synthesize(
                    &category,
                    confidence,
                    &format!(
                        "Neural model predicted {} with {:.2}% confidence",
                        category,
                        confidence * 100.0
                    ),
                ))
            }
            Err(e) => {
                error!("Error in neural prediction: {}", e);
                Ok(parser::synthesize(
                    "unknown",
                    0.0,
                    "Error in neural prediction",
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
        ProviderKind::Neural
    }
}
