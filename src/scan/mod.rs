//! Scan orchestration.
//!
//! One scan is a single-shot, point-in-time pass: the org profile is
//! fetched first and alone, every category fetcher then fans out
//! concurrently over the shared client, and the settled outcomes fold
//! into one immutable snapshot. Authentication failure anywhere aborts
//! the whole scan; any other failure degrades its own category and
//! nothing else.

pub mod cascade;

mod automation;
mod code;
mod integrations;
mod ownership;
mod packages;
mod reporting;
mod schema;
mod security;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ScanError, TransportError};
use crate::findings;
use crate::health;
use crate::model::{
    AutomationIndex, CodeIndex, IntegrationIndex, InventorySnapshot, ItemCollection, OrgProfile,
    OwnershipIndex, ReportingIndex, ScanSummary, SecurityIndex, SeverityTally,
};
use crate::transport::{Credentials, OrgClient};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrganizationRow {
    id: String,
    name: String,
    #[serde(default)]
    organization_type: Option<String>,
    #[serde(default)]
    is_sandbox: Option<bool>,
    #[serde(default)]
    instance_name: Option<String>,
}

async fn fetch_org_profile(client: &OrgClient) -> Result<OrgProfile, TransportError> {
    let rows = client
        .query_all::<OrganizationRow>(
            "SELECT Id, Name, OrganizationType, IsSandbox, InstanceName FROM Organization",
            false,
        )
        .await?;
    let row = rows.into_iter().next().ok_or_else(|| TransportError::Api {
        status: 0,
        message: "organization profile query returned no rows".into(),
    })?;
    Ok(OrgProfile {
        id: row.id,
        name: row.name,
        org_type: row.organization_type,
        is_sandbox: row.is_sandbox,
        instance_name: row.instance_name,
        api_version: client.api_version().to_string(),
    })
}

fn is_auth_err<T>(result: &Result<T, TransportError>) -> bool {
    matches!(result, Err(e) if e.is_auth())
}

/// Replace a failed category with its documented default, recording why.
fn settle<T>(
    result: Result<T, TransportError>,
    category: &str,
    degraded: &mut Vec<String>,
    fallback: impl FnOnce(&str) -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            let note = format!("{category} unavailable: {e}");
            warn!("{}", note);
            degraded.push(note.clone());
            fallback(&note)
        }
    }
}

/// Run one full scan against the org behind `credentials`.
///
/// Returns a complete snapshot, possibly with degraded categories, or
/// exactly one of the two fatal errors. The trace id on either error
/// correlates with this scan's log lines.
pub async fn run_scan(credentials: &Credentials) -> Result<InventorySnapshot, ScanError> {
    let trace_id = Uuid::new_v4().to_string();
    let started = Utc::now();

    let client = OrgClient::new(credentials).map_err(|e| {
        error!("scan {}: client construction failed: {}", trace_id, e);
        ScanError::ScanFailed {
            trace_id: trace_id.clone(),
            message: e.to_string(),
        }
    })?;

    info!("scan {} starting", trace_id);

    // Profile first, alone: an expired token must abort before the
    // fan-out launches anything.
    let org = match fetch_org_profile(&client).await {
        Ok(profile) => profile,
        Err(e) if e.is_auth() => {
            warn!("scan {}: credentials rejected at profile fetch", trace_id);
            return Err(ScanError::AuthenticationExpired { trace_id });
        }
        Err(e) => {
            error!("scan {}: profile fetch failed: {}", trace_id, e);
            return Err(ScanError::ScanFailed {
                trace_id,
                message: format!("org profile: {e}"),
            });
        }
    };

    let (
        schema_r,
        automation_r,
        code_r,
        reporting_r,
        ownership_r,
        packages_r,
        security_r,
        integrations_r,
    ) = tokio::join!(
        schema::fetch_schema(&client),
        automation::fetch_automation(&client),
        code::fetch_code(&client),
        reporting::fetch_reporting(&client),
        ownership::fetch_ownership(&client),
        packages::fetch_packages(&client),
        security::fetch_security(&client),
        integrations::fetch_integrations(&client),
    );

    // Auth is checked across every outcome before any other
    // classification: partial data under a dead token is misleading,
    // not merely incomplete, so all partial results are discarded.
    if is_auth_err(&schema_r)
        || is_auth_err(&automation_r)
        || is_auth_err(&code_r)
        || is_auth_err(&reporting_r)
        || is_auth_err(&ownership_r)
        || is_auth_err(&packages_r)
        || is_auth_err(&security_r)
        || is_auth_err(&integrations_r)
    {
        warn!("scan {}: credentials expired mid-scan, discarding partial results", trace_id);
        return Err(ScanError::AuthenticationExpired { trace_id });
    }

    let mut degraded = Vec::new();
    let objects = settle(schema_r, "objects", &mut degraded, |_| Vec::new());
    let automation = settle(automation_r, "automation", &mut degraded, |n| {
        AutomationIndex::unavailable(n)
    });
    let code = settle(code_r, "code", &mut degraded, |n| CodeIndex::unavailable(n));
    let reporting = settle(reporting_r, "reporting", &mut degraded, |n| {
        ReportingIndex::unavailable(n)
    });
    let ownership = settle(ownership_r, "ownership", &mut degraded, |n| {
        OwnershipIndex::unavailable(n)
    });
    let packages = settle(packages_r, "packages", &mut degraded, |n| {
        ItemCollection::unavailable(n)
    });
    let security = settle(security_r, "security", &mut degraded, |n| {
        SecurityIndex::unavailable(n)
    });
    let integrations = settle(integrations_r, "integrations", &mut degraded, |n| {
        IntegrationIndex::unavailable(n)
    });

    let records_approx: u64 = objects.iter().filter_map(|o| o.record_count).sum();
    let summary = ScanSummary {
        objects: objects.len() as u32,
        records_approx,
        flows: automation.flows.total(),
        triggers: automation.triggers.total(),
        validation_rules: automation.validation_rules.total(),
        findings_by_severity: SeverityTally::default(),
    };

    let mut snapshot = InventorySnapshot {
        scan_id: trace_id.clone(),
        scanned_at: started,
        org,
        objects,
        automation,
        code,
        reporting,
        ownership,
        packages,
        security,
        integrations,
        degraded,
        summary,
        findings: Vec::new(),
        health: None,
    };

    let findings = findings::detect(&snapshot);
    snapshot.summary.findings_by_severity = findings::tally(&findings);
    snapshot.findings = findings;

    // Health is strictly best-effort: its failure only omits the
    // section, never the scan.
    snapshot.health = match health::compute_health(&snapshot, Some(&client)).await {
        Ok(health) => Some(health),
        Err(e) => {
            warn!(
                "scan {}: health computation failed, omitting health section: {}",
                trace_id, e
            );
            None
        }
    };

    info!(
        "scan {} complete: {} objects, ~{} records, {} findings",
        trace_id,
        snapshot.summary.objects,
        snapshot.summary.records_approx,
        snapshot.findings.len()
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_detected_in_outcomes() {
        let auth: Result<(), TransportError> = Err(TransportError::AuthExpired {
            status: 401,
            message: "expired".into(),
        });
        let api: Result<(), TransportError> = Err(TransportError::Api {
            status: 503,
            message: "down".into(),
        });
        let ok: Result<(), TransportError> = Ok(());

        assert!(is_auth_err(&auth));
        assert!(!is_auth_err(&api));
        assert!(!is_auth_err(&ok));
    }

    #[test]
    fn settle_records_the_degradation() {
        let mut degraded = Vec::new();
        let value = settle(
            Err::<Vec<u32>, _>(TransportError::Api {
                status: 500,
                message: "boom".into(),
            }),
            "reporting",
            &mut degraded,
            |_| Vec::new(),
        );
        assert!(value.is_empty());
        assert_eq!(degraded.len(), 1);
        assert!(degraded[0].contains("reporting"));

        let kept = settle(Ok::<_, TransportError>(vec![1u32]), "objects", &mut degraded, |_| {
            Vec::new()
        });
        assert_eq!(kept, vec![1]);
        assert_eq!(degraded.len(), 1);
    }
}
