use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ClassifierError, Result};

/// A named, independently activatable classification taxonomy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl CategoryGroup {
    /// Label names of this group's member categories
    pub fn label_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// Label names must be unique within a group
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.name.as_str()) {
                return Err(ClassifierError::StoreError(format!(
                    "Duplicate category '{}' in group '{}'",
                    category.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// A single classification label belonging to exactly one group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Type of content entering the pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Email,
    Pdf,
    Doc,
    Html,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Email => "email",
            ContentType::Pdf => "pdf",
            ContentType::Doc => "doc",
            ContentType::Html => "html",
        }
    }
}

/// Prioritized declarative predicate for the email rule engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Sender domains that match, lowercase
    #[serde(default)]
    pub sender_domains: Vec<String>,
    #[serde(default)]
    pub subject_keywords: Vec<String>,
    #[serde(default)]
    pub body_keywords: Vec<String>,
    /// Attachment count bounds; None means unbounded
    #[serde(default)]
    pub min_attachments: Option<u32>,
    #[serde(default)]
    pub max_attachments: Option<u32>,
    /// Total attachment size bounds in bytes; None means unbounded
    #[serde(default)]
    pub min_attachment_size: Option<u64>,
    #[serde(default)]
    pub max_attachment_size: Option<u64>,
    /// Target label returned when the rule matches
    pub classification: String,
    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Structured fields extracted from an email, evaluated by the rule engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailFields {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
}

impl EmailFields {
    /// Domain portion of the sender address, lowercase
    pub fn sender_domain(&self) -> Option<String> {
        self.sender
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim_end_matches('>').trim().to_lowercase())
    }

    pub fn attachment_count(&self) -> u32 {
        self.attachments.len() as u32
    }

    pub fn total_attachment_size(&self) -> u64 {
        self.attachments.iter().map(|a| a.size).sum()
    }

    /// Flattened text representation fed to model providers
    pub fn as_text(&self) -> String {
        format!("Subject: {}\n\nBody: {}", self.subject, self.body)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
}

/// Immutable outcome of one classification pass against one category group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub content_type: ContentType,
    /// Content-addressed reference; the content itself is not stored
    pub content_hash: String,
    pub classification: String,
    pub confidence: f32,
    pub explanation: String,
    pub provider: String,
    pub model: String,
    /// Group may be deleted after the result was recorded
    pub category_group_id: Option<i64>,
    pub category_group_name: Option<String>,
    pub user: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 digest of content, hex encoded
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cascade stage that produced an outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CascadeLevel {
    Rule,
    Statistical,
    Neural,
    Llm,
    Error,
}

impl CascadeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeLevel::Rule => "rule",
            CascadeLevel::Statistical => "statistical",
            CascadeLevel::Neural => "neural",
            CascadeLevel::Llm => "llm",
            CascadeLevel::Error => "error",
        }
    }
}

/// Final result of a cascade run, with provenance and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub classification: String,
    pub confidence: f32,
    pub level: CascadeLevel,
    pub explanation: String,
    /// Elapsed wall time of the whole cascade, seconds
    pub processing_time: f64,
}

/// Lifecycle status of an asynchronous processing job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Tracks one asynchronous unit of work through its state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub job_type: String,
    pub input_data: serde_json::Value,
    pub output_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn new(job_type: impl Into<String>, input_data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            job_type: job_type.into(),
            input_data,
            output_data: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// pending -> processing
    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Pending, JobStatus::Processing)
    }

    /// processing -> completed, recording the output payload
    pub fn complete(&mut self, output_data: serde_json::Value) -> Result<()> {
        self.transition(JobStatus::Processing, JobStatus::Completed)?;
        self.output_data = Some(output_data);
        Ok(())
    }

    /// processing -> failed, recording the error message
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Processing, JobStatus::Failed)?;
        self.error_message = Some(error_message.into());
        Ok(())
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != from {
            return Err(ClassifierError::JobError(format!(
                "Cannot transition job {} from {:?} to {:?}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
