//! Stores for category groups and classification rules.
//!
//! The core reads taxonomies and rules through these traits and treats
//! result persistence as the caller's concern. The JSON-file stores cover
//! the CLI and small deployments; tests and embedders use the in-memory
//! variants.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{ClassifierError, Result};
use crate::models::{CategoryGroup, EmailRule};

/// Source of active classification taxonomies
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Load all active groups with their label sets
    async fn load_active_groups(&self) -> Result<Vec<CategoryGroup>>;
}

/// Source of active classification rules
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn load_active_rules(&self) -> Result<Vec<EmailRule>>;
}

/// Groups stored as a JSON array on disk
pub struct JsonGroupStore {
    path: PathBuf,
}

impl JsonGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GroupStore for JsonGroupStore {
    async fn load_active_groups(&self) -> Result<Vec<CategoryGroup>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ClassifierError::StoreError(format!("Failed to read groups {:?}: {}", self.path, e))
        })?;
        let groups: Vec<CategoryGroup> = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::StoreError(format!("Failed to parse groups {:?}: {}", self.path, e))
        })?;

        let active: Vec<CategoryGroup> = groups.into_iter().filter(|g| g.is_active).collect();
        for group in &active {
            group.validate()?;
        }
        Ok(active)
    }
}

/// Rules stored as a JSON array on disk
pub struct JsonRuleStore {
    path: PathBuf,
}

impl JsonRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RuleStore for JsonRuleStore {
    async fn load_active_rules(&self) -> Result<Vec<EmailRule>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ClassifierError::StoreError(format!("Failed to read rules {:?}: {}", self.path, e))
        })?;
        let rules: Vec<EmailRule> = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::StoreError(format!("Failed to parse rules {:?}: {}", self.path, e))
        })?;
        Ok(rules.into_iter().filter(|r| r.is_active).collect())
    }
}

/// In-memory group store for tests and embedding
#[derive(Default)]
pub struct InMemoryGroupStore {
    groups: Vec<CategoryGroup>,
}

impl InMemoryGroupStore {
    pub fn new(groups: Vec<CategoryGroup>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn load_active_groups(&self) -> Result<Vec<CategoryGroup>> {
        Ok(self
            .groups
            .iter()
            .filter(|g| g.is_active)
            .cloned()
            .collect())
    }
}

/// In-memory rule store for tests and embedding
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: Vec<EmailRule>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<EmailRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn load_active_rules(&self) -> Result<Vec<EmailRule>> {
        Ok(self.rules.iter().filter(|r| r.is_active).cloned().collect())
    }
}
