//! Four-stage classification cascade: rules, statistical model, neural
//! model, then a hosted LLM as the unconditional final fallback.
//!
//! Each stage is terminal on success. The two model stages are gated by
//! configurable confidence thresholds; at-threshold results are accepted.
//! Stage failures before the LLM fall through to the next stage, so a
//! broken local model degrades cost rather than availability.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::CascadeConfig;
use crate::error::{ClassifierError, Result};
use crate::models::{
    CascadeLevel, CascadeOutcome, ClassificationResult, ContentType, EmailFields,
};
use crate::provider::CompletionProvider;
use crate::registry::ProviderRegistry;
use crate::rules::RuleEngine;
use crate::service::ClassificationService;
use crate::store::RuleStore;

/// Resolves provider names to live instances.
///
/// The registry is the production implementation; tests substitute
/// counting stubs to assert which stages actually ran.
pub trait ProviderSource: Send + Sync {
    fn provider(&self, name: &str) -> Result<Arc<dyn CompletionProvider>>;
}

impl ProviderSource for ProviderRegistry {
    fn provider(&self, name: &str) -> Result<Arc<dyn CompletionProvider>> {
        self.create(name, None)
    }
}

/// Result of one accepted cascade stage, before timing is stamped
struct StageHit {
    classification: String,
    confidence: f32,
    level: CascadeLevel,
    explanation: String,
}

pub struct CascadeClassifier {
    providers: Arc<dyn ProviderSource>,
    service: ClassificationService,
    rules: Arc<dyn RuleStore>,
    engine: RuleEngine,
    config: CascadeConfig,
}

impl CascadeClassifier {
    pub fn new(
        providers: Arc<dyn ProviderSource>,
        service: ClassificationService,
        rules: Arc<dyn RuleStore>,
        config: CascadeConfig,
    ) -> Self {
        Self {
            providers,
            service,
            rules,
            engine: RuleEngine::new(),
            config,
        }
    }

    /// Classify plain content against every active group using the
    /// configured default provider. The flat entry point for text and
    /// extracted-document flows that have no structured fields to offer
    /// the rule stage.
    pub async fn classify(
        &self,
        content: &str,
        content_type: ContentType,
    ) -> Result<Vec<ClassificationResult>> {
        let provider = self.providers.provider(&self.config.default_provider)?;
        Ok(self
            .service
            .classify_content(provider.as_ref(), content, content_type)
            .await)
    }

    /// Run the full cascade over structured email fields.
    ///
    /// Never fails: any error surfaces as a `level = error` outcome with
    /// confidence 0.0 so callers always receive a structurally valid
    /// result.
    pub async fn run_cascade(&self, fields: &EmailFields) -> CascadeOutcome {
        let start = Instant::now();
        match self.walk_stages(fields).await {
            Ok(hit) => {
                info!(
                    "Cascade complete: {} ({}) at level {}",
                    hit.classification,
                    hit.confidence,
                    hit.level.as_str()
                );
                CascadeOutcome {
                    classification: hit.classification,
                    confidence: hit.confidence,
                    level: hit.level,
                    explanation: hit.explanation,
                    processing_time: start.elapsed().as_secs_f64(),
                }
            }
            Err(e) => {
                error!("Cascade failed: {}", e);
                CascadeOutcome {
                    classification: "error".to_string(),
                    confidence: 0.0,
                    level: CascadeLevel::Error,
                    explanation: format!("Cascade error: {}", e),
                    processing_time: start.elapsed().as_secs_f64(),
                }
            }
        }
    }

    async fn walk_stages(&self, fields: &EmailFields) -> Result<StageHit> {
        if let Some(hit) = self.rule_stage(fields).await {
            return Ok(hit);
        }

        let content = fields.as_text();

        if let Some(hit) = self
            .model_stage(
                &self.config.statistical_provider,
                &content,
                self.config.statistical_threshold,
                CascadeLevel::Statistical,
            )
            .await
        {
            return Ok(hit);
        }

        if let Some(hit) = self
            .model_stage(
                &self.config.neural_provider,
                &content,
                self.config.neural_threshold,
                CascadeLevel::Neural,
            )
            .await
        {
            return Ok(hit);
        }

        self.llm_stage(&content).await
    }

    /// First matching rule wins with fixed confidence 1.0, no gate
    async fn rule_stage(&self, fields: &EmailFields) -> Option<StageHit> {
        let rules = match self.rules.load_active_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Rule stage skipped, failed to load rules: {}", e);
                return None;
            }
        };

        let matched = self.engine.evaluate(&rules, fields)?;
        info!("Rule stage match: {}", matched.rule_name);
        Some(StageHit {
            classification: matched.classification.clone(),
            confidence: 1.0,
            level: CascadeLevel::Rule,
            explanation: format!(
                "Matched rule '{}': {}",
                matched.rule_name,
                matched.explanation()
            ),
        })
    }

    /// One gated local-model stage. Any failure here falls through
    /// rather than ending the cascade.
    async fn model_stage(
        &self,
        provider_name: &str,
        content: &str,
        threshold: f32,
        level: CascadeLevel,
    ) -> Option<StageHit> {
        let provider = match self.providers.provider(provider_name) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(
                    "{} stage skipped, provider unavailable: {}",
                    level.as_str(),
                    e
                );
                return None;
            }
        };

        let results = self
            .service
            .classify_content(provider.as_ref(), content, ContentType::Email)
            .await;
        let first = results.into_iter().next()?;

        if first.classification == "error" {
            warn!("{} stage failed: {}", level.as_str(), first.explanation);
            return None;
        }
        if first.confidence < threshold {
            info!(
                "{} stage below threshold: {} < {}",
                level.as_str(),
                first.confidence,
                threshold
            );
            return None;
        }

        Some(StageHit {
            classification: first.classification,
            confidence: first.confidence,
            level,
            explanation: first.explanation,
        })
    }

    /// Final fallback: accepted regardless of confidence. Transport
    /// failures here have no further stage to absorb them and surface
    /// as the cascade's error.
    async fn llm_stage(&self, content: &str) -> Result<StageHit> {
        let provider = self.providers.provider(&self.config.default_provider)?;
        let results = self
            .service
            .classify_content(provider.as_ref(), content, ContentType::Email)
            .await;

        let first = match results.into_iter().next() {
            Some(result) => result,
            None => {
                return Ok(StageHit {
                    classification: "unclassified".to_string(),
                    confidence: 0.0,
                    level: CascadeLevel::Llm,
                    explanation: "No active category groups".to_string(),
                })
            }
        };

        if first.classification == "error" {
            return Err(ClassifierError::TransportError(first.explanation));
        }

        Ok(StageHit {
            classification: first.classification,
            confidence: first.confidence,
            level: CascadeLevel::Llm,
            explanation: first.explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassificationConfig, ProviderKind};
    use crate::models::{Category, CategoryGroup, EmailRule};
    use crate::parser;
    use crate::store::{InMemoryGroupStore, InMemoryRuleStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned provider that counts invocations
    struct CountingProvider {
        response: Result<String>,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn ok(classification: &str, confidence: f32) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(parser::synthesize(classification, confidence, "canned")),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: Err(ClassifierError::TransportError(
                    "connection refused".to_string(),
                )),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for CountingProvider {
        async fn generate_completion(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(ClassifierError::TransportError(
                    "connection refused".to_string(),
                )),
            }
        }

        fn name(&self) -> &str {
            "counting"
        }

        fn model_name(&self) -> &str {
            "counting-model"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Chat
        }
    }

    struct StubSource {
        providers: HashMap<String, Arc<CountingProvider>>,
    }

    impl ProviderSource for StubSource {
        fn provider(&self, name: &str) -> Result<Arc<dyn CompletionProvider>> {
            self.providers
                .get(name)
                .cloned()
                .map(|p| p as Arc<dyn CompletionProvider>)
                .ok_or_else(|| {
                    ClassifierError::ConfigError(format!(
                        "No configuration found for provider: {}",
                        name
                    ))
                })
        }
    }

    struct Fixture {
        cascade: CascadeClassifier,
        statistical: Arc<CountingProvider>,
        neural: Arc<CountingProvider>,
        llm: Arc<CountingProvider>,
    }

    fn fixture(
        rules: Vec<EmailRule>,
        statistical: Arc<CountingProvider>,
        neural: Arc<CountingProvider>,
        llm: Arc<CountingProvider>,
    ) -> Fixture {
        let mut providers = HashMap::new();
        providers.insert("statistical".to_string(), statistical.clone());
        providers.insert("neural".to_string(), neural.clone());
        providers.insert("openai".to_string(), llm.clone());

        let group = CategoryGroup {
            id: 1,
            name: "topics".to_string(),
            description: String::new(),
            is_active: true,
            categories: vec![Category {
                name: "finance".to_string(),
                description: String::new(),
            }],
        };
        let service = ClassificationService::new(
            Arc::new(InMemoryGroupStore::new(vec![group])),
            ClassificationConfig::default(),
        );

        let cascade = CascadeClassifier::new(
            Arc::new(StubSource { providers }),
            service,
            Arc::new(InMemoryRuleStore::new(rules)),
            CascadeConfig::default(),
        );

        Fixture {
            cascade,
            statistical,
            neural,
            llm,
        }
    }

    fn invoice_rule() -> EmailRule {
        EmailRule {
            name: "invoices".to_string(),
            description: String::new(),
            sender_domains: vec![],
            subject_keywords: vec!["invoice".to_string()],
            body_keywords: vec![],
            min_attachments: None,
            max_attachments: None,
            min_attachment_size: None,
            max_attachment_size: None,
            classification: "finance".to_string(),
            priority: 10,
            is_active: true,
        }
    }

    fn invoice_fields() -> EmailFields {
        EmailFields {
            subject: "Invoice #4521".to_string(),
            body: "Please pay within 30 days".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rule_match_short_circuits_all_models() {
        let f = fixture(
            vec![invoice_rule()],
            CountingProvider::ok("finance", 0.9),
            CountingProvider::ok("finance", 0.9),
            CountingProvider::ok("finance", 0.9),
        );

        let outcome = f.cascade.run_cascade(&invoice_fields()).await;
        assert_eq!(outcome.classification, "finance");
        assert_eq!(outcome.confidence, 1.0);
        assert_eq!(outcome.level, CascadeLevel::Rule);
        assert_eq!(f.statistical.call_count(), 0);
        assert_eq!(f.neural.call_count(), 0);
        assert_eq!(f.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_statistical_below_threshold_falls_to_neural() {
        let f = fixture(
            vec![],
            CountingProvider::ok("finance", 0.62),
            CountingProvider::ok("finance", 0.81),
            CountingProvider::ok("finance", 0.99),
        );

        let outcome = f.cascade.run_cascade(&invoice_fields()).await;
        assert_eq!(outcome.level, CascadeLevel::Neural);
        assert_eq!(outcome.confidence, 0.81);
        assert_eq!(f.statistical.call_count(), 1);
        assert_eq!(f.neural.call_count(), 1);
        assert_eq!(f.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_statistical_at_threshold_is_accepted() {
        let f = fixture(
            vec![],
            CountingProvider::ok("finance", 0.75),
            CountingProvider::ok("finance", 0.99),
            CountingProvider::ok("finance", 0.99),
        );

        let outcome = f.cascade.run_cascade(&invoice_fields()).await;
        assert_eq!(outcome.level, CascadeLevel::Statistical);
        assert_eq!(outcome.confidence, 0.75);
        assert_eq!(f.neural.call_count(), 0);
        assert_eq!(f.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_llm_accepted_at_zero_confidence() {
        let f = fixture(
            vec![],
            CountingProvider::ok("unknown", 0.0),
            CountingProvider::ok("unknown", 0.0),
            CountingProvider::ok("other", 0.0),
        );

        let outcome = f.cascade.run_cascade(&invoice_fields()).await;
        assert_eq!(outcome.level, CascadeLevel::Llm);
        assert_eq!(outcome.classification, "other");
        assert_eq!(outcome.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_llm_transport_failure_yields_error_outcome() {
        let f = fixture(
            vec![],
            CountingProvider::ok("unknown", 0.0),
            CountingProvider::ok("unknown", 0.0),
            CountingProvider::failing(),
        );

        let outcome = f.cascade.run_cascade(&invoice_fields()).await;
        assert_eq!(outcome.level, CascadeLevel::Error);
        assert_eq!(outcome.classification, "error");
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.explanation.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_missing_stage_provider_falls_through() {
        let neural = CountingProvider::ok("finance", 0.9);
        let llm = CountingProvider::ok("finance", 0.9);
        let mut providers = HashMap::new();
        providers.insert("neural".to_string(), neural.clone());
        providers.insert("openai".to_string(), llm.clone());

        let group = CategoryGroup {
            id: 1,
            name: "topics".to_string(),
            description: String::new(),
            is_active: true,
            categories: vec![],
        };
        let service = ClassificationService::new(
            Arc::new(InMemoryGroupStore::new(vec![group])),
            ClassificationConfig::default(),
        );
        let cascade = CascadeClassifier::new(
            Arc::new(StubSource { providers }),
            service,
            Arc::new(InMemoryRuleStore::new(vec![])),
            CascadeConfig::default(),
        );

        let outcome = cascade.run_cascade(&invoice_fields()).await;
        assert_eq!(outcome.level, CascadeLevel::Neural);
        assert_eq!(neural.call_count(), 1);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_classify_uses_default_provider() {
        let f = fixture(
            vec![],
            CountingProvider::ok("finance", 0.9),
            CountingProvider::ok("finance", 0.9),
            CountingProvider::ok("finance", 0.9),
        );

        let results = f
            .cascade
            .classify("quarterly invoice attached", ContentType::Text)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].classification, "finance");
        assert_eq!(f.llm.call_count(), 1);
        assert_eq!(f.statistical.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timing_is_stamped() {
        let f = fixture(
            vec![invoice_rule()],
            CountingProvider::ok("finance", 0.9),
            CountingProvider::ok("finance", 0.9),
            CountingProvider::ok("finance", 0.9),
        );

        let outcome = f.cascade.run_cascade(&invoice_fields()).await;
        assert!(outcome.processing_time >= 0.0);
    }
}
