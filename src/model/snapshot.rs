// src/model/snapshot.rs
// The inventory snapshot: everything one scan learned about the org.
// Immutable once assembled by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::collection::ItemCollection;
use super::finding::Finding;
use super::health::HealthComputation;

/// Identity of the scanned org.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgProfile {
    pub id: String,
    pub name: String,
    pub org_type: Option<String>,
    pub is_sandbox: Option<bool>,
    pub instance_name: Option<String>,
    pub api_version: String,
}

/// One metadata object and the schema facts the detectors care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    pub api_name: String,
    pub label: String,
    pub custom: bool,
    /// Approximate record count. `None` means unknown, not zero.
    pub record_count: Option<u64>,
    pub fields: Vec<FieldDescriptor>,
    pub record_types: Vec<String>,
    pub picklist_fields: Vec<String>,
    pub lookup_relationships: Vec<RelationshipDescriptor>,
    pub master_detail_relationships: Vec<RelationshipDescriptor>,
    pub autonumber_fields: Vec<String>,
}

impl ObjectDescriptor {
    /// Descriptor for an object whose per-object describe failed or was
    /// skipped; everything beyond the listing-level facts is empty.
    pub fn shallow(api_name: String, label: String, custom: bool) -> Self {
        Self {
            api_name,
            label,
            custom,
            record_count: None,
            fields: Vec::new(),
            record_types: Vec::new(),
            picklist_fields: Vec::new(),
            lookup_relationships: Vec::new(),
            master_detail_relationships: Vec::new(),
            autonumber_fields: Vec::new(),
        }
    }

    pub fn has_records(&self) -> bool {
        self.record_count.is_some_and(|n| n > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub api_name: String,
    pub label: String,
    pub field_type: String,
    pub required: bool,
    pub has_default: bool,
    /// Parent objects for reference fields.
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDescriptor {
    pub field: String,
    pub references: String,
}

// ── Automation

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub api_name: String,
    pub label: Option<String>,
    pub process_type: Option<String>,
    pub active: bool,
    /// Target object for record-triggered flows, when the query surface
    /// exposed it.
    pub trigger_object: Option<String>,
}

impl FlowSummary {
    pub fn is_record_triggered(&self) -> bool {
        self.trigger_object.is_some()
            || self
                .process_type
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case("RecordTriggeredFlow"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSummary {
    pub name: String,
    pub object: Option<String>,
    pub active: bool,
    pub length_without_comments: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRuleSummary {
    pub name: String,
    pub object: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRuleSummary {
    pub name: String,
    pub object: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalProcessSummary {
    pub name: String,
    pub object: Option<String>,
    pub active: bool,
}

/// Automation inventory. Every sub-collection is dual-shape: the upstream
/// Tooling surface frequently refuses detail queries for validation and
/// workflow rules while still answering `COUNT()` aggregates, in which
/// case only the count pair is exposed. The legacy describe-scan fallback
/// for validation-rule detail is intentionally absent; zero detail rows
/// with populated counts is the intended shape there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationIndex {
    pub flows: ItemCollection<FlowSummary>,
    pub triggers: ItemCollection<TriggerSummary>,
    pub validation_rules: ItemCollection<ValidationRuleSummary>,
    pub workflow_rules: ItemCollection<WorkflowRuleSummary>,
    pub approval_processes: ItemCollection<ApprovalProcessSummary>,
}

impl AutomationIndex {
    pub fn unavailable(note: &str) -> Self {
        Self {
            flows: ItemCollection::unavailable(note),
            triggers: ItemCollection::unavailable(note),
            validation_rules: ItemCollection::unavailable(note),
            workflow_rules: ItemCollection::unavailable(note),
            approval_processes: ItemCollection::unavailable(note),
        }
    }

    /// Active automation components with known counts, summed across all
    /// sub-collections. Count-only collections contribute their aggregate.
    pub fn active_component_count(&self) -> u32 {
        self.flows.active_count(|f| f.active).unwrap_or(0)
            + self.triggers.active_count(|t| t.active).unwrap_or(0)
            + self.validation_rules.active_count(|v| v.active).unwrap_or(0)
            + self.workflow_rules.active_count(|w| w.active).unwrap_or(0)
            + self.approval_processes.active_count(|a| a.active).unwrap_or(0)
    }
}

// ── Code

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApexClassSummary {
    pub name: String,
    pub status: Option<String>,
    pub api_version: Option<f64>,
    pub length_without_comments: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCoverage {
    pub name: String,
    pub covered_lines: u32,
    pub uncovered_lines: u32,
}

impl UnitCoverage {
    pub fn percent(&self) -> Option<f64> {
        let total = self.covered_lines + self.uncovered_lines;
        if total == 0 {
            return None;
        }
        Some(self.covered_lines as f64 / total as f64 * 100.0)
    }
}

/// Test-coverage picture. `org_wide_percent == None` with a note means
/// no coverage data exists (tests never ran), which is not the same as
/// zero coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub org_wide_percent: Option<f64>,
    pub units: Vec<UnitCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CoverageSummary {
    pub fn absent(note: impl Into<String>) -> Self {
        Self {
            org_wide_percent: None,
            units: Vec::new(),
            note: Some(note.into()),
        }
    }

    /// Units whose line coverage falls inside [lo, hi).
    pub fn units_in_band(&self, lo: f64, hi: f64) -> u32 {
        self.units
            .iter()
            .filter_map(|u| u.percent())
            .filter(|p| *p >= lo && *p < hi)
            .count() as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeIndex {
    pub apex_classes: ItemCollection<ApexClassSummary>,
    pub coverage: CoverageSummary,
}

impl CodeIndex {
    pub fn unavailable(note: &str) -> Self {
        Self {
            apex_classes: ItemCollection::unavailable(note),
            coverage: CoverageSummary::absent(note.to_string()),
        }
    }
}

// ── Reporting

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub name: String,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplateSummary {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingIndex {
    pub reports: ItemCollection<ReportSummary>,
    pub dashboards: ItemCollection<DashboardSummary>,
    pub email_templates: ItemCollection<EmailTemplateSummary>,
}

impl ReportingIndex {
    pub fn unavailable(note: &str) -> Self {
        Self {
            reports: ItemCollection::unavailable(note),
            dashboards: ItemCollection::unavailable(note),
            email_templates: ItemCollection::unavailable(note),
        }
    }
}

// ── Ownership / packages / security / integrations

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipIndex {
    pub active_users: Option<u32>,
    pub roles: Option<u32>,
    pub queues: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OwnershipIndex {
    pub fn unavailable(note: &str) -> Self {
        Self {
            active_users: None,
            roles: None,
            queues: None,
            note: Some(note.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,
    pub namespace: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub name: String,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSetSummary {
    pub name: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityIndex {
    pub profiles: ItemCollection<ProfileSummary>,
    pub permission_sets: ItemCollection<PermissionSetSummary>,
    /// Sharing rules are not queryable over this API surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SecurityIndex {
    pub fn unavailable(note: &str) -> Self {
        Self {
            profiles: ItemCollection::unavailable(note),
            permission_sets: ItemCollection::unavailable(note),
            note: Some(note.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAppSummary {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedCredentialSummary {
    pub name: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDataSourceSummary {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSiteSummary {
    pub name: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationIndex {
    pub connected_apps: ItemCollection<ConnectedAppSummary>,
    pub named_credentials: ItemCollection<NamedCredentialSummary>,
    pub external_data_sources: ItemCollection<ExternalDataSourceSummary>,
    pub remote_sites: ItemCollection<RemoteSiteSummary>,
}

impl IntegrationIndex {
    pub fn unavailable(note: &str) -> Self {
        Self {
            connected_apps: ItemCollection::unavailable(note),
            named_credentials: ItemCollection::unavailable(note),
            external_data_sources: ItemCollection::unavailable(note),
            remote_sites: ItemCollection::unavailable(note),
        }
    }
}

// ── Summary + snapshot

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeverityTally {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// Headline counters for quick display without re-walking the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub objects: u32,
    pub records_approx: u64,
    pub flows: Option<u32>,
    pub triggers: Option<u32>,
    pub validation_rules: Option<u32>,
    pub findings_by_severity: SeverityTally,
}

/// The complete, immutable result of one scan pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub scan_id: String,
    pub scanned_at: DateTime<Utc>,
    pub org: OrgProfile,
    pub objects: Vec<ObjectDescriptor>,
    pub automation: AutomationIndex,
    pub code: CodeIndex,
    pub reporting: ReportingIndex,
    pub ownership: OwnershipIndex,
    pub packages: ItemCollection<PackageInfo>,
    pub security: SecurityIndex,
    pub integrations: IntegrationIndex,
    /// Notes for categories that fell back to defaults.
    pub degraded: Vec<String>,
    pub summary: ScanSummary,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthComputation>,
}

impl InventorySnapshot {
    /// Stable hash of the headline summary, used by the external scan-diff
    /// comparator to tell two snapshots apart without walking them.
    pub fn structural_hash(&self) -> String {
        let canonical =
            serde_json::to_string(&self.summary).unwrap_or_else(|_| String::from("{}"));
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_descriptor_has_no_schema_detail() {
        let obj = ObjectDescriptor::shallow("Invoice__c".into(), "Invoice".into(), true);
        assert!(obj.fields.is_empty());
        assert_eq!(obj.record_count, None);
        assert!(!obj.has_records());
    }

    #[test]
    fn unit_coverage_percent() {
        let unit = UnitCoverage {
            name: "InvoiceService".into(),
            covered_lines: 42,
            uncovered_lines: 58,
        };
        assert_eq!(unit.percent(), Some(42.0));

        let empty = UnitCoverage {
            name: "Empty".into(),
            covered_lines: 0,
            uncovered_lines: 0,
        };
        assert_eq!(empty.percent(), None);
    }

    #[test]
    fn active_components_mix_detail_and_counts() {
        let automation = AutomationIndex {
            flows: ItemCollection::detailed(vec![FlowSummary {
                api_name: "Route_Leads".into(),
                label: None,
                process_type: Some("AutoLaunchedFlow".into()),
                active: true,
                trigger_object: None,
            }]),
            triggers: ItemCollection::empty(),
            validation_rules: ItemCollection::count_only(Some(40), Some(22)),
            workflow_rules: ItemCollection::unavailable("not retrievable"),
            approval_processes: ItemCollection::empty(),
        };
        // 1 active flow + 22 active rules; unavailable contributes nothing.
        assert_eq!(automation.active_component_count(), 23);
    }
}
