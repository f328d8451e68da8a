//! End-to-end cascade tests over the public API, with file-backed stores
//! and stub providers standing in for the hosted LLM.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use cascade_classifier::{
    cascade::{CascadeClassifier, ProviderSource},
    config::{CascadeConfig, ClassificationConfig, ProviderKind},
    models::{CascadeLevel, ContentType, EmailFields},
    parser,
    provider::CompletionProvider,
    service::ClassificationService,
    store::{JsonGroupStore, JsonRuleStore},
    ClassifierError, Result,
};

struct CannedProvider {
    response: Result<String>,
    calls: AtomicUsize,
    kind: ProviderKind,
}

impl CannedProvider {
    fn ok(kind: ProviderKind, classification: &str, confidence: f32) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(parser::synthesize(classification, confidence, "canned")),
            calls: AtomicUsize::new(0),
            kind,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    async fn generate_completion(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(s) => Ok(s.clone()),
            Err(_) => Err(ClassifierError::TransportError("canned failure".to_string())),
        }
    }

    fn name(&self) -> &str {
        "canned"
    }

    fn model_name(&self) -> &str {
        "canned-model"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

struct MapSource {
    providers: HashMap<String, Arc<CannedProvider>>,
}

impl ProviderSource for MapSource {
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

struct Env {
    _dir: TempDir,
    cascade: CascadeClassifier,
    statistical: Arc<CannedProvider>,
    neural: Arc<CannedProvider>,
    llm: Arc<CannedProvider>,
}

/// Write groups/rules JSON to disk and wire the pipeline over them
fn build_env(
    rules_json: &str,
    statistical: Arc<CannedProvider>,
    neural: Arc<CannedProvider>,
    llm: Arc<CannedProvider>,
) -> Env {
    let dir = TempDir::new().unwrap();

    let groups_path = dir.path().join("groups.json");
    std::fs::write(
        &groups_path,
        r#"[
            {
                "id": 1,
                "name": "topics",
                "is_active": true,
                "categories": [
                    {"name": "finance"},
                    {"name": "marketing"},
                    {"name": "other"}
                ]
            }
        ]"#,
    )
    .unwrap();

    let rules_path = dir.path().join("rules.json");
    std::fs::write(&rules_path, rules_json).unwrap();

    let mut providers = HashMap::new();
    providers.insert("statistical".to_string(), statistical.clone());
    providers.insert("neural".to_string(), neural.clone());
    providers.insert("openai".to_string(), llm.clone());

    let service = ClassificationService::new(
        Arc::new(JsonGroupStore::new(&groups_path)),
        ClassificationConfig::default(),
    );
    let cascade = CascadeClassifier::new(
        Arc::new(MapSource { providers }),
        service,
        Arc::new(JsonRuleStore::new(&rules_path)),
        CascadeConfig::default(),
    );

    Env {
        _dir: dir,
        cascade,
        statistical,
        neural,
        llm,
    }
}

const INVOICE_RULE: &str = r#"[
    {
        "name": "invoices",
        "subject_keywords": ["invoice"],
        "classification": "finance",
        "priority": 10,
        "is_active": true
    }
]"#;

#[tokio::test]
async fn invoice_email_is_classified_by_rule_without_models() {
    let env = build_env(
        INVOICE_RULE,
        CannedProvider::ok(ProviderKind::Statistical, "marketing", 0.9),
        CannedProvider::ok(ProviderKind::Neural, "marketing", 0.9),
        CannedProvider::ok(ProviderKind::Chat, "marketing", 0.9),
    );

    let fields = EmailFields {
        subject: "Invoice #4521".to_string(),
        body: "Please pay within 30 days".to_string(),
        ..Default::default()
    };
    let outcome = env.cascade.run_cascade(&fields).await;

    assert_eq!(outcome.classification, "finance");
    assert_eq!(outcome.confidence, 1.0);
    assert_eq!(outcome.level, CascadeLevel::Rule);
    assert_eq!(env.statistical.calls(), 0);
    assert_eq!(env.neural.calls(), 0);
    assert_eq!(env.llm.calls(), 0);
}

#[tokio::test]
async fn statistical_miss_neural_hit_lands_at_neural_level() {
    let env = build_env(
        "[]",
        CannedProvider::ok(ProviderKind::Statistical, "finance", 0.62),
        CannedProvider::ok(ProviderKind::Neural, "finance", 0.81),
        CannedProvider::ok(ProviderKind::Chat, "finance", 0.99),
    );

    let fields = EmailFields {
        subject: "Q3 numbers".to_string(),
        body: "See the attached summary".to_string(),
        ..Default::default()
    };
    let outcome = env.cascade.run_cascade(&fields).await;

    assert_eq!(outcome.level, CascadeLevel::Neural);
    assert_eq!(outcome.classification, "finance");
    assert_eq!(outcome.confidence, 0.81);
    assert_eq!(env.statistical.calls(), 1);
    assert_eq!(env.neural.calls(), 1);
    assert_eq!(env.llm.calls(), 0);
    assert!(outcome.processing_time >= 0.0);
}

#[tokio::test]
async fn inactive_rule_falls_through_to_models() {
    let inactive = r#"[
        {
            "name": "invoices",
            "subject_keywords": ["invoice"],
            "classification": "finance",
            "priority": 10,
            "is_active": false
        }
    ]"#;
    let env = build_env(
        inactive,
        CannedProvider::ok(ProviderKind::Statistical, "finance", 0.9),
        CannedProvider::ok(ProviderKind::Neural, "finance", 0.9),
        CannedProvider::ok(ProviderKind::Chat, "finance", 0.9),
    );

    let fields = EmailFields {
        subject: "Invoice #4521".to_string(),
        ..Default::default()
    };
    let outcome = env.cascade.run_cascade(&fields).await;

    assert_eq!(outcome.level, CascadeLevel::Statistical);
    assert_eq!(env.statistical.calls(), 1);
}

#[tokio::test]
async fn llm_fallback_accepts_any_confidence() {
    let env = build_env(
        "[]",
        CannedProvider::ok(ProviderKind::Statistical, "unknown", 0.0),
        CannedProvider::ok(ProviderKind::Neural, "unknown", 0.0),
        CannedProvider::ok(ProviderKind::Chat, "other", 0.05),
    );

    let outcome = env.cascade.run_cascade(&EmailFields::default()).await;

    assert_eq!(outcome.level, CascadeLevel::Llm);
    assert_eq!(outcome.classification, "other");
    assert_eq!(outcome.confidence, 0.05);
    assert_eq!(env.llm.calls(), 1);
}

#[tokio::test]
async fn classify_returns_one_result_per_group_with_provenance() {
    let env = build_env(
        "[]",
        CannedProvider::ok(ProviderKind::Statistical, "finance", 0.9),
        CannedProvider::ok(ProviderKind::Neural, "finance", 0.9),
        CannedProvider::ok(ProviderKind::Chat, "finance", 0.92),
    );

    let results = env
        .cascade
        .classify("please settle the outstanding invoice", ContentType::Text)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].classification, "finance");
    assert_eq!(results[0].provider, "canned");
    assert_eq!(results[0].model, "canned-model");
    assert_eq!(results[0].category_group_name.as_deref(), Some("topics"));
    assert_eq!(env.llm.calls(), 1);
}

#[tokio::test]
async fn missing_rules_file_degrades_to_model_stages() {
    let dir = TempDir::new().unwrap();
    let groups_path = dir.path().join("groups.json");
    std::fs::write(
        &groups_path,
        r#"[{"id": 1, "name": "topics", "is_active": true, "categories": [{"name": "finance"}]}]"#,
    )
    .unwrap();

    let statistical = CannedProvider::ok(ProviderKind::Statistical, "finance", 0.9);
    let mut providers = HashMap::new();
    providers.insert("statistical".to_string(), statistical.clone());

    let service = ClassificationService::new(
        Arc::new(JsonGroupStore::new(&groups_path)),
        ClassificationConfig::default(),
    );
    let cascade = CascadeClassifier::new(
        Arc::new(MapSource { providers }),
        service,
        Arc::new(JsonRuleStore::new(dir.path().join("missing-rules.json"))),
        CascadeConfig::default(),
    );

    let outcome = cascade.run_cascade(&EmailFields::default()).await;
    assert_eq!(outcome.level, CascadeLevel::Statistical);
    assert_eq!(statistical.calls(), 1);
}
