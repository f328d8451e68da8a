//! Declarative rule matching over extracted email fields.
//!
//! Rules are evaluated in priority order (higher first) and conditions
//! within a rule are disjunctive: any single matching condition marks the
//! rule matched. A rule with nothing configured never matches.

use tracing::{debug, info};

use crate::models::{EmailFields, EmailRule};

/// Outcome of a successful rule evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub classification: String,
    pub rule_name: String,
    /// Every condition that matched, in evaluation order
    pub matched_conditions: Vec<String>,
}

impl RuleMatch {
    pub fn explanation(&self) -> String {
        self.matched_conditions.join(", ")
    }
}

pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate active rules against the fields, first match wins
    pub fn evaluate(&self, rules: &[EmailRule], fields: &EmailFields) -> Option<RuleMatch> {
        let mut active: Vec<&EmailRule> = rules.iter().filter(|r| r.is_active).collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority));
        info!("Evaluating {} active rules", active.len());

        for rule in active {
            let matched = evaluate_rule(rule, fields);
            if matched.is_empty() {
                debug!("Rule {} did not match any conditions", rule.name);
                continue;
            }
            info!("Rule {} matched: {:?}", rule.name, matched);
            return Some(RuleMatch {
                classification: rule.classification.clone(),
                rule_name: rule.name.clone(),
                matched_conditions: matched,
            });
        }

        info!("No rules matched");
        None
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the reasons for every condition of one rule that matched.
/// Conditions are independent; an unset condition contributes nothing.
fn evaluate_rule(rule: &EmailRule, fields: &EmailFields) -> Vec<String> {
    let mut matched = Vec::new();

    if !rule.sender_domains.is_empty() {
        if let Some(domain) = fields.sender_domain() {
            if rule
                .sender_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&domain))
            {
                matched.push(format!("Sender domain {} matched", domain));
            }
        }
    }

    if !rule.subject_keywords.is_empty() {
        let subject = fields.subject.to_lowercase();
        let hits: Vec<&str> = rule
            .subject_keywords
            .iter()
            .filter(|kw| subject.contains(&kw.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !hits.is_empty() {
            matched.push(format!("Subject contains keywords: {:?}", hits));
        }
    }

    if !rule.body_keywords.is_empty() {
        let body = fields.body.to_lowercase();
        let hits: Vec<&str> = rule
            .body_keywords
            .iter()
            .filter(|kw| body.contains(&kw.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !hits.is_empty() {
            matched.push(format!("Body contains keywords: {:?}", hits));
        }
    }

    let count = fields.attachment_count();
    if let Some(min) = rule.min_attachments {
        if count >= min {
            matched.push(format!("Attachment count ({}) >= {}", count, min));
        }
    }
    if let Some(max) = rule.max_attachments {
        if count <= max {
            matched.push(format!("Attachment count ({}) <= {}", count, max));
        }
    }

    let total_size = fields.total_attachment_size();
    if let Some(min) = rule.min_attachment_size {
        if total_size >= min {
            matched.push(format!("Total attachment size ({}) >= {}", total_size, min));
        }
    }
    if let Some(max) = rule.max_attachment_size {
        if total_size <= max {
            matched.push(format!("Total attachment size ({}) <= {}", total_size, max));
        }
    }

    matched
}
