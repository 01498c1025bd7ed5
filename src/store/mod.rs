//! Scan-result storage seam.
//!
//! The core never assumes process lifetime: consumers inject whatever
//! `ScanStore` implementation suits them. The in-memory implementation
//! here backs tests and single-shot CLI runs; durable implementations
//! live outside this crate.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::InventorySnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub snapshot: InventorySnapshot,
}

/// Listing row: enough to render a scan history without loading full
/// snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanListEntry {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub org_name: String,
    pub objects: u32,
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn save(&self, record: ScanRecord) -> anyhow::Result<()>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<ScanRecord>>;
    /// Newest first.
    async fn list(&self) -> anyhow::Result<Vec<ScanListEntry>>;
}

#[derive(Default)]
pub struct InMemoryScanStore {
    records: RwLock<HashMap<String, ScanRecord>>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for InMemoryScanStore {
    async fn save(&self, record: ScanRecord) -> anyhow::Result<()> {
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<ScanRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<ScanListEntry>> {
        let records = self.records.read().await;
        let mut entries: Vec<ScanListEntry> = records
            .values()
            .map(|r| ScanListEntry {
                id: r.id.clone(),
                started_at: r.started_at,
                org_name: r.snapshot.org.name.clone(),
                objects: r.snapshot.summary.objects,
            })
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AutomationIndex, CodeIndex, CoverageSummary, IntegrationIndex, ItemCollection,
        OrgProfile, OwnershipIndex, ReportingIndex, ScanSummary, SecurityIndex, SeverityTally,
    };

    fn record(id: &str, org_name: &str, started_at: DateTime<Utc>) -> ScanRecord {
        ScanRecord {
            id: id.to_string(),
            started_at,
            snapshot: InventorySnapshot {
                scan_id: id.to_string(),
                scanned_at: started_at,
                org: OrgProfile {
                    id: "00D000000000001".into(),
                    name: org_name.to_string(),
                    org_type: None,
                    is_sandbox: None,
                    instance_name: None,
                    api_version: "59.0".into(),
                },
                objects: Vec::new(),
                automation: AutomationIndex {
                    flows: ItemCollection::empty(),
                    triggers: ItemCollection::empty(),
                    validation_rules: ItemCollection::empty(),
                    workflow_rules: ItemCollection::empty(),
                    approval_processes: ItemCollection::empty(),
                },
                code: CodeIndex {
                    apex_classes: ItemCollection::empty(),
                    coverage: CoverageSummary {
                        org_wide_percent: None,
                        units: Vec::new(),
                        note: None,
                    },
                },
                reporting: ReportingIndex {
                    reports: ItemCollection::empty(),
                    dashboards: ItemCollection::empty(),
                    email_templates: ItemCollection::empty(),
                },
                ownership: OwnershipIndex {
                    active_users: None,
                    roles: None,
                    queues: None,
                    note: None,
                },
                packages: ItemCollection::empty(),
                security: SecurityIndex {
                    profiles: ItemCollection::empty(),
                    permission_sets: ItemCollection::empty(),
                    note: None,
                },
                integrations: IntegrationIndex {
                    connected_apps: ItemCollection::empty(),
                    named_credentials: ItemCollection::empty(),
                    external_data_sources: ItemCollection::empty(),
                    remote_sites: ItemCollection::empty(),
                },
                degraded: Vec::new(),
                summary: ScanSummary {
                    objects: 0,
                    records_approx: 0,
                    flows: None,
                    triggers: None,
                    validation_rules: None,
                    findings_by_severity: SeverityTally::default(),
                },
                findings: Vec::new(),
                health: None,
            },
        }
    }

    #[tokio::test]
    async fn round_trip_and_listing_order() {
        let store = InMemoryScanStore::new();
        let older = Utc::now() - chrono::Duration::hours(1);
        let newer = Utc::now();

        store.save(record("scan-1", "Acme", older)).await.unwrap();
        store.save(record("scan-2", "Acme", newer)).await.unwrap();

        let fetched = store.get("scan-1").await.unwrap().expect("saved record");
        assert_eq!(fetched.snapshot.org.name, "Acme");
        assert!(store.get("scan-missing").await.unwrap().is_none());

        let listing = store.list().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, "scan-2");
        assert_eq!(listing[1].id, "scan-1");
    }
}
