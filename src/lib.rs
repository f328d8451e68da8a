//! Cascading Content Classification
//!
//! Classifies arbitrary content (emails, extracted documents, free text)
//! into user-defined category groups by cascading through increasingly
//! expensive classification methods, stopping at the first confident
//! answer.
//!
//! # Overview
//!
//! The pipeline walks four ordered stages:
//! - **Rule engine**: prioritized declarative rules over structured email
//!   fields; any match short-circuits with confidence 1.0
//! - **Statistical model**: lightweight local model, gated by a
//!   configurable confidence threshold
//! - **Neural model**: tokenizer + feed-forward classification head, gated
//!   by its own threshold
//! - **LLM**: hosted chat-completion call, accepted unconditionally as the
//!   final fallback
//!
//! All backends sit behind one [`provider::CompletionProvider`] contract,
//! so the classification service is identical regardless of which stage is
//! running. Local models synthesize the same textual response schema the
//! LLM is instructed to emit, keeping the output parser provider-agnostic.
//!
//! # Example Usage
//!
//! ```no_run
//! use cascade_classifier::{
//!     cascade::CascadeClassifier, config::Config, registry::ProviderRegistry,
//!     service::ClassificationService,
//!     store::{JsonGroupStore, JsonRuleStore},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     config.validate()?;
//!
//!     let registry = Arc::new(ProviderRegistry::new(config.clone()));
//!     let groups = Arc::new(JsonGroupStore::new("groups.json"));
//!     let rules = Arc::new(JsonRuleStore::new("rules.json"));
//!
//!     let service = ClassificationService::new(groups, config.classification.clone());
//!     let cascade = CascadeClassifier::new(registry, service, rules, config.cascade.clone());
//!
//!     let outcome = cascade.run_cascade(&Default::default()).await;
//!     println!("{} ({})", outcome.classification, outcome.confidence);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`cascade`] - Four-stage cascade orchestrator
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures
//! - [`neural`] - Neural model provider (tokenizers + candle)
//! - [`parser`] - Structured response parsing and synthesis
//! - [`provider`] - Provider contract and the hosted chat provider
//! - [`registry`] - Provider name to instance resolution
//! - [`rules`] - Email rule matching engine
//! - [`service`] - Per-group classification service
//! - [`statistical`] - Statistical model provider
//! - [`store`] - Category group and rule persistence boundary

pub mod cascade;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod neural;
pub mod parser;
pub mod provider;
pub mod registry;
pub mod rules;
pub mod service;
pub mod statistical;
pub mod store;

// Error types
pub use error::{ClassifierError, Result};

// Core data model
pub use models::{
    content_hash, AttachmentInfo, CascadeLevel, CascadeOutcome, Category, CategoryGroup,
    ClassificationResult, ContentType, EmailFields, EmailRule, JobStatus, ProcessingJob,
};

// Config types
pub use config::{
    CascadeConfig, ClassificationConfig, Config, ProviderKind, ProviderSettings,
};

// Provider contract and implementations
pub use provider::{ChatProvider, ChatProviderConfig, CompletionProvider};
pub use registry::{ProviderOverrides, ProviderRegistry};

// Pipeline types
pub use cascade::{CascadeClassifier, ProviderSource};
pub use rules::{RuleEngine, RuleMatch};
pub use service::ClassificationService;
pub use store::{GroupStore, JsonGroupStore, JsonRuleStore, RuleStore};

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
