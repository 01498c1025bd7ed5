// src/model/finding.rs

use serde::{Deserialize, Serialize};

/// How much a finding threatens the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// One rule-derived migration-risk observation. Findings are pure
/// derivations of a snapshot and are never persisted on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Deterministic id, e.g. `LARGE_OBJECT_Invoice__c`.
    pub id: String,
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub description: String,
    /// Api names of the affected objects, when object-scoped.
    pub objects: Vec<String>,
    pub impact: String,
    pub remediation: Vec<String>,
}
