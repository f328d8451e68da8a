//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cascade::CascadeClassifier;
use crate::config::Config;
use crate::error::{ClassifierError, Result};
use crate::models::{ContentType, EmailFields};
use crate::registry::ProviderRegistry;
use crate::service::ClassificationService;
use crate::store::{JsonGroupStore, JsonRuleStore};

#[derive(Parser, Debug)]
#[command(name = "cascade-classifier")]
#[command(version = "0.3.1")]
#[command(about = "Cascading content classification pipeline", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to the category groups file
    #[arg(long, default_value = "groups.json")]
    pub groups: PathBuf,

    /// Path to the classification rules file
    #[arg(long, default_value = "rules.json")]
    pub rules: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify plain content against every active category group
    Classify {
        /// Text to classify
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// File whose contents to classify
        #[arg(long)]
        file: Option<PathBuf>,

        /// Content type recorded on the results
        #[arg(long, default_value = "text")]
        content_type: String,

        /// Provider name, overriding the configured default
        #[arg(long)]
        provider: Option<String>,
    },

    /// Run the full cascade over structured email fields
    Cascade {
        /// Email subject
        #[arg(long, default_value = "")]
        subject: String,

        /// Email body
        #[arg(long, default_value = "")]
        body: String,

        /// Sender address
        #[arg(long)]
        sender: Option<String>,

        /// JSON file with full email fields, overriding the flags above
        #[arg(long)]
        email_file: Option<PathBuf>,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Wire the full pipeline from CLI paths and a loaded config
pub fn build_classifier(cli: &Cli, config: &Config) -> CascadeClassifier {
    let registry = Arc::new(ProviderRegistry::new(config.clone()));
    let groups = Arc::new(JsonGroupStore::new(&cli.groups));
    let rules = Arc::new(JsonRuleStore::new(&cli.rules));

    let service = ClassificationService::new(groups, config.classification.clone());
    CascadeClassifier::new(registry, service, rules, config.cascade.clone())
}

/// Classification service alone, for the flat classify command
pub fn build_service(cli: &Cli, config: &Config) -> ClassificationService {
    let groups = Arc::new(JsonGroupStore::new(&cli.groups));
    ClassificationService::new(groups, config.classification.clone())
}

pub fn parse_content_type(raw: &str) -> Result<ContentType> {
    match raw.to_lowercase().as_str() {
        "text" => Ok(ContentType::Text),
        "email" => Ok(ContentType::Email),
        "pdf" => Ok(ContentType::Pdf),
        "doc" => Ok(ContentType::Doc),
        "html" => Ok(ContentType::Html),
        other => Err(ClassifierError::ConfigError(format!(
            "Unknown content type: {} (expected text, email, pdf, doc, or html)",
            other
        ))),
    }
}

/// Load email fields from a JSON file
pub async fn load_email_fields(path: &PathBuf) -> Result<EmailFields> {
    let raw = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&raw).map_err(ClassifierError::from)
}
