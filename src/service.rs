//! Classification service: one classification pass per active category
//! group, against an explicitly supplied provider.
//!
//! The provider choice is an argument to every call rather than mutable
//! service state, so concurrent requests can walk different providers over
//! one shared service without interfering.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{ClassificationConfig, ProviderKind};
use crate::models::{content_hash, CategoryGroup, ClassificationResult, ContentType};
use crate::parser;
use crate::provider::CompletionProvider;
use crate::store::GroupStore;

pub struct ClassificationService {
    groups: Arc<dyn GroupStore>,
    config: ClassificationConfig,
}

impl ClassificationService {
    pub fn new(groups: Arc<dyn GroupStore>, config: ClassificationConfig) -> Self {
        Self { groups, config }
    }

    /// Classify content against every active category group.
    ///
    /// Returns one result per group. A failure in one group produces an
    /// "error" result for that group without aborting the others; a failure
    /// enumerating the groups produces a single synthetic "unclassified"
    /// result. Zero active groups returns an empty list.
    pub async fn classify_content(
        &self,
        provider: &dyn CompletionProvider,
        content: &str,
        content_type: ContentType,
    ) -> Vec<ClassificationResult> {
        info!(
            "Starting content classification for type: {}",
            content_type.as_str()
        );
        debug!(
            "Content preview: {}",
            truncate_chars(content, self.config.preview_chars)
        );
        let hash = content_hash(content);

        let active_groups = match self.groups.load_active_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                error!("Error enumerating category groups: {}", e);
                return vec![ClassificationResult {
                    content_type,
                    content_hash: hash,
                    classification: "unclassified".to_string(),
                    confidence: 0.0,
                    explanation: format!("Error during classification process: {}", e),
                    provider: provider.name().to_string(),
                    model: provider.model_name().to_string(),
                    category_group_id: None,
                    category_group_name: Some("Error".to_string()),
                    user: None,
                    created_at: Utc::now(),
                }];
            }
        };

        info!("Found {} active category groups", active_groups.len());
        let mut results = Vec::with_capacity(active_groups.len());

        for group in &active_groups {
            info!("Processing classification for group {}: {}", group.id, group.name);
            match self.classify_for_group(provider, content, content_type, group).await {
                Ok(result) => {
                    info!(
                        "Classification result for group {}: category={}, confidence={}",
                        group.name, result.classification, result.confidence
                    );
                    results.push(result);
                }
                Err(e) => {
                    error!("Error classifying content for group {}: {}", group.name, e);
                    results.push(ClassificationResult {
                        content_type,
                        content_hash: hash.clone(),
                        classification: "error".to_string(),
                        confidence: 0.0,
                        explanation: format!("Error during classification: {}", e),
                        provider: provider.name().to_string(),
                        model: provider.model_name().to_string(),
                        category_group_id: Some(group.id),
                        category_group_name: Some(group.name.clone()),
                        user: None,
                        created_at: Utc::now(),
                    });
                }
            }
        }

        results
    }

    async fn classify_for_group(
        &self,
        provider: &dyn CompletionProvider,
        content: &str,
        content_type: ContentType,
        group: &CategoryGroup,
    ) -> crate::error::Result<ClassificationResult> {
        let truncated = truncate_chars(content, self.config.max_content_chars);

        let (system_message, user_message) = match provider.kind() {
            ProviderKind::Chat => (
                build_system_prompt(group),
                format!(
                    "Content Type: {}\nContent: {}\n\n\
                     Classify this content and provide:\n\
                     1. The most appropriate classification category from the available categories\n\
                     2. A confidence score between 0 and 1\n\
                     3. A brief explanation for your classification",
                    content_type.as_str(),
                    truncated
                ),
            ),
            // Local models take content directly, no prompt engineering
            _ => (String::new(), truncated),
        };

        let raw = provider
            .generate_completion(&system_message, &user_message)
            .await?;
        let parsed = parser::parse(&raw)?;

        Ok(ClassificationResult {
            content_type,
            content_hash: content_hash(content),
            classification: parsed.classification,
            confidence: parsed.confidence,
            explanation: parsed.explanation,
            provider: provider.name().to_string(),
            model: provider.model_name().to_string(),
            category_group_id: Some(group.id),
            category_group_name: Some(group.name.clone()),
            user: None,
            created_at: Utc::now(),
        })
    }
}

/// System message enumerating the group's labels plus format instructions
fn build_system_prompt(group: &CategoryGroup) -> String {
    let categories = group
        .label_names()
        .iter()
        .map(|name| format!("- {}", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a content classification system. Your task is to classify \
         the given content into appropriate categories.\n\
         Available classification categories:\n{}\n\n\
         Provide your response in the following format:\n{}",
        categories,
        parser::format_instructions()
    )
}

/// Char-boundary-safe truncation
fn truncate_chars(content: &str, max_chars: usize) -> String {
    content.chars().take(max_chars).collect()
}
