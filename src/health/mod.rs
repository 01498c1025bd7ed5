//! Health engine: weighted KPI scoring over the inventory snapshot.
//!
//! Five fixed categories, each a list of KPI evaluators classifying one
//! metric against its own threshold table. KPIs whose input is missing
//! classify as NA and drop out of both sides of the category score; a
//! category with nothing but NA scores `None` and is excluded from the
//! weight-renormalized overall average. The limits category may issue
//! one extra upstream call under its own deadline; that call failing
//! degrades exactly those KPIs to NA and nothing else.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::config::CONFIG;
use crate::model::{
    HealthCategory, HealthComputation, InventorySnapshot, Kpi, KpiStatus, Methodology,
};
use crate::transport::OrgClient;

const WEIGHTS: &[(&str, &str, u32)] = &[
    ("governance", "Governance", 20),
    ("automation", "Automation", 25),
    ("data", "Data", 20),
    ("security", "Security", 20),
    ("limits", "Platform Limits", 15),
];

pub async fn compute_health(
    snapshot: &InventorySnapshot,
    client: Option<&OrgClient>,
) -> Result<HealthComputation> {
    let limit_usage = fetch_limit_usage(client).await;

    let categories: Vec<HealthCategory> = WEIGHTS
        .iter()
        .map(|(key, label, weight)| {
            let kpis = match *key {
                "governance" => governance_kpis(snapshot),
                "automation" => automation_kpis(snapshot),
                "data" => data_kpis(snapshot),
                "security" => security_kpis(snapshot),
                "limits" => limits_kpis(&limit_usage),
                _ => unreachable!("unknown health category"),
            };
            HealthCategory {
                key: key.to_string(),
                label: label.to_string(),
                weight: *weight,
                score: score_category(&kpis),
                kpis,
            }
        })
        .collect();

    let overall_score = overall(&categories);

    Ok(HealthComputation {
        overall_score,
        categories,
        methodology: methodology(),
    })
}

// ── Scoring

fn score_category(kpis: &[Kpi]) -> Option<u8> {
    let scored: Vec<&Kpi> = kpis
        .iter()
        .filter(|k| k.status != KpiStatus::NotApplicable)
        .collect();
    if scored.is_empty() {
        return None;
    }
    let points: u32 = scored.iter().map(|k| k.status.points()).sum();
    let max = scored.len() as u32 * KpiStatus::Healthy.points();
    Some((points as f64 / max as f64 * 100.0).round() as u8)
}

fn overall(categories: &[HealthCategory]) -> Option<u8> {
    let scored: Vec<&HealthCategory> =
        categories.iter().filter(|c| c.score.is_some()).collect();
    let total_weight: u32 = scored.iter().map(|c| c.weight).sum();
    if total_weight == 0 {
        return None;
    }
    let weighted: f64 = scored
        .iter()
        .map(|c| f64::from(c.score.unwrap_or(0)) * f64::from(c.weight))
        .sum();
    Some((weighted / f64::from(total_weight)).round() as u8)
}

fn methodology() -> Methodology {
    let weights = WEIGHTS
        .iter()
        .map(|(key, _, weight)| (key.to_string(), *weight))
        .collect::<BTreeMap<_, _>>();
    let status_points = BTreeMap::from([
        ("HEALTHY".to_string(), 2),
        ("MONITOR".to_string(), 1),
        ("RISK".to_string(), 0),
    ]);
    Methodology {
        weights,
        status_points,
        notes: vec![
            "NA KPIs are excluded from both the numerator and denominator of their category."
                .to_string(),
            "The overall score renormalizes category weights over scored categories only."
                .to_string(),
        ],
    }
}

// ── Threshold classifiers

fn fewer_is_better(value: Option<u32>, healthy_max: u32, monitor_max: u32) -> KpiStatus {
    match value {
        None => KpiStatus::NotApplicable,
        Some(v) if v <= healthy_max => KpiStatus::Healthy,
        Some(v) if v <= monitor_max => KpiStatus::Monitor,
        Some(_) => KpiStatus::Risk,
    }
}

fn percent_high_is_good(value: Option<f64>, healthy_at: f64, monitor_at: f64) -> KpiStatus {
    match value {
        None => KpiStatus::NotApplicable,
        Some(v) if v >= healthy_at => KpiStatus::Healthy,
        Some(v) if v >= monitor_at => KpiStatus::Monitor,
        Some(_) => KpiStatus::Risk,
    }
}

fn percent_low_is_good(value: Option<f64>, healthy_below: f64, monitor_below: f64) -> KpiStatus {
    match value {
        None => KpiStatus::NotApplicable,
        Some(v) if v < healthy_below => KpiStatus::Healthy,
        Some(v) if v < monitor_below => KpiStatus::Monitor,
        Some(_) => KpiStatus::Risk,
    }
}

fn kpi(key: &str, label: &str, value: String, status: KpiStatus, detail: Option<String>) -> Kpi {
    Kpi {
        key: key.to_string(),
        label: label.to_string(),
        value,
        status,
        detail,
    }
}

fn display_count(value: Option<u32>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

// ── Category evaluators

fn governance_kpis(snapshot: &InventorySnapshot) -> Vec<Kpi> {
    let coverage = &snapshot.code.coverage;

    let coverage_value = coverage
        .org_wide_percent
        .map_or_else(|| "no data".to_string(), |p| format!("{p:.0}%"));
    let coverage_status = percent_high_is_good(coverage.org_wide_percent, 75.0, 50.0);

    // Without any coverage data the unit breakdown says nothing either.
    let weak_units = if coverage.org_wide_percent.is_none() && coverage.units.is_empty() {
        None
    } else {
        Some(coverage.units_in_band(0.0, 50.0))
    };

    let packages = snapshot.packages.total();

    vec![
        kpi(
            "orgCoverage",
            "Org-wide test coverage",
            coverage_value,
            coverage_status,
            coverage.note.clone(),
        ),
        kpi(
            "weakCoverageUnits",
            "Classes under 50% coverage",
            display_count(weak_units),
            fewer_is_better(weak_units, 0, 3),
            None,
        ),
        kpi(
            "installedPackages",
            "Installed packages",
            display_count(packages),
            fewer_is_better(packages, 10, 20),
            snapshot.packages.note().map(str::to_string),
        ),
    ]
}

fn automation_kpis(snapshot: &InventorySnapshot) -> Vec<Kpi> {
    let automation = &snapshot.automation;

    // Per-object trigger pressure needs per-trigger detail; the
    // count-only shape cannot attribute triggers to objects.
    let max_triggers_per_object: Option<u32> = automation.triggers.items().map(|items| {
        let mut per_object: BTreeMap<&str, u32> = BTreeMap::new();
        for t in items.iter().filter(|t| t.active) {
            if let Some(object) = t.object.as_deref() {
                *per_object.entry(object).or_default() += 1;
            }
        }
        per_object.values().copied().max().unwrap_or(0)
    });

    let active_flows = automation.flows.active_count(|f| f.active);
    let active_rules = automation.validation_rules.active_count(|v| v.active);

    let inactive_share = inactive_share_percent(snapshot);

    vec![
        kpi(
            "triggersPerObject",
            "Most active triggers on one object",
            display_count(max_triggers_per_object),
            fewer_is_better(max_triggers_per_object, 1, 2),
            None,
        ),
        kpi(
            "activeFlows",
            "Active flows",
            display_count(active_flows),
            fewer_is_better(active_flows, 49, 149),
            None,
        ),
        kpi(
            "activeValidationRules",
            "Active validation rules",
            display_count(active_rules),
            fewer_is_better(active_rules, 99, 299),
            automation.validation_rules.note().map(str::to_string),
        ),
        kpi(
            "inactiveAutomationShare",
            "Inactive automation share",
            inactive_share.map_or_else(|| "unknown".to_string(), |p| format!("{p:.0}%")),
            percent_low_is_good(inactive_share, 20.0, 40.0),
            None,
        ),
    ]
}

/// Share of automation components that exist but are switched off, over
/// the collections whose totals and actives are both known.
fn inactive_share_percent(snapshot: &InventorySnapshot) -> Option<f64> {
    let automation = &snapshot.automation;
    let pairs = [
        (
            automation.flows.total(),
            automation.flows.active_count(|f| f.active),
        ),
        (
            automation.triggers.total(),
            automation.triggers.active_count(|t| t.active),
        ),
        (
            automation.validation_rules.total(),
            automation.validation_rules.active_count(|v| v.active),
        ),
        (
            automation.workflow_rules.total(),
            automation.workflow_rules.active_count(|w| w.active),
        ),
    ];

    let mut total = 0u32;
    let mut active = 0u32;
    let mut any_known = false;
    for (t, a) in pairs {
        if let (Some(t), Some(a)) = (t, a) {
            total += t;
            active += a;
            any_known = true;
        }
    }
    if !any_known || total == 0 {
        return None;
    }
    Some(f64::from(total.saturating_sub(active)) / f64::from(total) * 100.0)
}

fn data_kpis(snapshot: &InventorySnapshot) -> Vec<Kpi> {
    let any_counts = snapshot.objects.iter().any(|o| o.record_count.is_some());

    let large_objects = any_counts.then(|| {
        snapshot
            .objects
            .iter()
            .filter(|o| o.record_count.is_some_and(|n| n > 100_000))
            .count() as u32
    });

    let records_approx: Option<u64> = any_counts.then(|| {
        snapshot
            .objects
            .iter()
            .filter_map(|o| o.record_count)
            .sum()
    });
    let records_status = match records_approx {
        None => KpiStatus::NotApplicable,
        Some(n) if n < 1_000_000 => KpiStatus::Healthy,
        Some(n) if n < 5_000_000 => KpiStatus::Monitor,
        Some(_) => KpiStatus::Risk,
    };

    let autonumber_objects = Some(
        snapshot
            .objects
            .iter()
            .filter(|o| !o.autonumber_fields.is_empty())
            .count() as u32,
    );

    vec![
        kpi(
            "largeObjects",
            "Objects above 100k records",
            display_count(large_objects),
            fewer_is_better(large_objects, 0, 2),
            None,
        ),
        kpi(
            "recordsApprox",
            "Approximate total records",
            records_approx.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            records_status,
            None,
        ),
        kpi(
            "autonumberObjects",
            "Objects with auto-number fields",
            display_count(autonumber_objects),
            fewer_is_better(autonumber_objects, 0, 3),
            None,
        ),
    ]
}

fn security_kpis(snapshot: &InventorySnapshot) -> Vec<Kpi> {
    let profiles = snapshot.security.profiles.total();
    let permission_sets = snapshot.security.permission_sets.total();
    let connected_apps = snapshot.integrations.connected_apps.total();

    vec![
        kpi(
            "profiles",
            "Profiles",
            display_count(profiles),
            fewer_is_better(profiles, 20, 50),
            None,
        ),
        kpi(
            "permissionSets",
            "Standalone permission sets",
            display_count(permission_sets),
            fewer_is_better(permission_sets, 25, 75),
            None,
        ),
        kpi(
            "connectedApps",
            "Connected apps",
            display_count(connected_apps),
            fewer_is_better(connected_apps, 5, 15),
            None,
        ),
    ]
}

// ── Limits

struct LimitUsage {
    api_requests_pct: Option<f64>,
    data_storage_pct: Option<f64>,
    file_storage_pct: Option<f64>,
    detail: Option<String>,
}

impl LimitUsage {
    fn unavailable(detail: &str) -> Self {
        Self {
            api_requests_pct: None,
            data_storage_pct: None,
            file_storage_pct: None,
            detail: Some(detail.to_string()),
        }
    }
}

async fn fetch_limit_usage(client: Option<&OrgClient>) -> LimitUsage {
    let Some(client) = client else {
        return LimitUsage::unavailable("limit usage not requested");
    };

    let deadline = Duration::from_millis(CONFIG.limits_timeout_ms);
    let limits = match tokio::time::timeout(deadline, client.limits()).await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            debug!("limit usage unavailable: {}", e);
            return LimitUsage::unavailable("limit usage could not be retrieved");
        }
        Err(_) => {
            debug!("limit usage call timed out after {:?}", deadline);
            return LimitUsage::unavailable("limit usage call timed out");
        }
    };

    LimitUsage {
        api_requests_pct: usage_percent(&limits["DailyApiRequests"]),
        data_storage_pct: usage_percent(&limits["DataStorageMB"]),
        file_storage_pct: usage_percent(&limits["FileStorageMB"]),
        detail: None,
    }
}

fn usage_percent(limit: &Value) -> Option<f64> {
    let max = limit["Max"].as_f64()?;
    let remaining = limit["Remaining"].as_f64()?;
    if max <= 0.0 {
        return None;
    }
    Some((max - remaining) / max * 100.0)
}

fn limits_kpis(usage: &LimitUsage) -> Vec<Kpi> {
    let display = |v: Option<f64>| v.map_or_else(|| "unknown".to_string(), |p| format!("{p:.0}%"));

    vec![
        kpi(
            "dailyApiRequests",
            "Daily API request usage",
            display(usage.api_requests_pct),
            percent_low_is_good(usage.api_requests_pct, 50.0, 80.0),
            usage.detail.clone(),
        ),
        kpi(
            "dataStorage",
            "Data storage usage",
            display(usage.data_storage_pct),
            percent_low_is_good(usage.data_storage_pct, 70.0, 90.0),
            usage.detail.clone(),
        ),
        kpi(
            "fileStorage",
            "File storage usage",
            display(usage.file_storage_pct),
            percent_low_is_good(usage.file_storage_pct, 70.0, 90.0),
            usage.detail.clone(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AutomationIndex, CodeIndex, CoverageSummary, IntegrationIndex, InventorySnapshot,
        ItemCollection, ObjectDescriptor, OrgProfile, OwnershipIndex, ReportingIndex,
        ScanSummary, SecurityIndex, SeverityTally, TriggerSummary,
    };
    use chrono::Utc;

    fn snapshot() -> InventorySnapshot {
        InventorySnapshot {
            scan_id: "scan-health".into(),
            scanned_at: Utc::now(),
            org: OrgProfile {
                id: "00D000000000001".into(),
                name: "Test Org".into(),
                org_type: None,
                is_sandbox: Some(true),
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
        }
    }

    fn kpi_with(status: KpiStatus) -> Kpi {
        kpi("k", "K", "v".into(), status, None)
    }

    #[test]
    fn na_shrinks_the_denominator() {
        // One HEALTHY plus one NA scores a clean 100, not 50.
        let kpis = vec![kpi_with(KpiStatus::Healthy), kpi_with(KpiStatus::NotApplicable)];
        assert_eq!(score_category(&kpis), Some(100));

        let kpis = vec![
            kpi_with(KpiStatus::Healthy),
            kpi_with(KpiStatus::Monitor),
            kpi_with(KpiStatus::NotApplicable),
        ];
        assert_eq!(score_category(&kpis), Some(75));
    }

    #[test]
    fn all_na_category_has_no_score() {
        let kpis = vec![
            kpi_with(KpiStatus::NotApplicable),
            kpi_with(KpiStatus::NotApplicable),
        ];
        assert_eq!(score_category(&kpis), None);
        assert_eq!(score_category(&[]), None);
    }

    #[test]
    fn risk_scores_zero() {
        let kpis = vec![kpi_with(KpiStatus::Risk), kpi_with(KpiStatus::Risk)];
        assert_eq!(score_category(&kpis), Some(0));
    }

    #[test]
    fn overall_renormalizes_over_scored_categories() {
        let category = |key: &str, weight: u32, score: Option<u8>| HealthCategory {
            key: key.into(),
            label: key.into(),
            weight,
            score,
            kpis: Vec::new(),
        };

        let categories = vec![
            category("governance", 20, Some(100)),
            category("automation", 25, None),
            category("data", 20, Some(50)),
        ];
        // (100*20 + 50*20) / 40 = 75; the unscored category's weight is
        // not part of the denominator.
        assert_eq!(overall(&categories), Some(75));

        let all_null = vec![category("governance", 20, None)];
        assert_eq!(overall(&all_null), None);
    }

    #[tokio::test]
    async fn limits_degrade_to_na_without_a_client() {
        let computation = compute_health(&snapshot(), None).await.unwrap();
        let limits = computation
            .categories
            .iter()
            .find(|c| c.key == "limits")
            .unwrap();
        assert_eq!(limits.score, None);
        assert!(limits
            .kpis
            .iter()
            .all(|k| k.status == KpiStatus::NotApplicable));
    }

    #[tokio::test]
    async fn count_only_rules_classify_like_a_detailed_list() {
        let mut with_counts = snapshot();
        with_counts.automation.validation_rules = ItemCollection::count_only(Some(40), Some(22));

        let mut with_detail = snapshot();
        with_detail.automation.validation_rules = ItemCollection::detailed(
            (0..40)
                .map(|i| crate::model::ValidationRuleSummary {
                    name: format!("Rule{}", i),
                    object: None,
                    active: i < 22,
                })
                .collect(),
        );

        let counts = compute_health(&with_counts, None).await.unwrap();
        let detail = compute_health(&with_detail, None).await.unwrap();

        let rule_kpi = |c: &HealthComputation| {
            c.categories
                .iter()
                .find(|cat| cat.key == "automation")
                .unwrap()
                .kpis
                .iter()
                .find(|k| k.key == "activeValidationRules")
                .map(|k| (k.value.clone(), k.status))
                .unwrap()
        };
        assert_eq!(rule_kpi(&counts), rule_kpi(&detail));
    }

    #[tokio::test]
    async fn trigger_pressure_is_na_for_count_only_triggers() {
        let mut s = snapshot();
        s.automation.triggers = ItemCollection::count_only(Some(12), Some(9));
        let computation = compute_health(&s, None).await.unwrap();
        let automation = computation
            .categories
            .iter()
            .find(|c| c.key == "automation")
            .unwrap();
        let trigger_kpi = automation
            .kpis
            .iter()
            .find(|k| k.key == "triggersPerObject")
            .unwrap();
        assert_eq!(trigger_kpi.status, KpiStatus::NotApplicable);
    }

    #[tokio::test]
    async fn trigger_threshold_table() {
        let trigger = |object: &str| TriggerSummary {
            name: format!("{}Trigger", object),
            object: Some(object.into()),
            active: true,
            length_without_comments: None,
        };

        let mut s = snapshot();
        s.automation.triggers = ItemCollection::detailed(vec![
            trigger("Account"),
            trigger("Account"),
            trigger("Invoice__c"),
        ]);
        let computation = compute_health(&s, None).await.unwrap();
        let status = computation
            .categories
            .iter()
            .find(|c| c.key == "automation")
            .unwrap()
            .kpis
            .iter()
            .find(|k| k.key == "triggersPerObject")
            .unwrap()
            .status;
        // Two active triggers on Account is the MONITOR band.
        assert_eq!(status, KpiStatus::Monitor);
    }

    #[test]
    fn usage_percent_reads_the_limit_shape() {
        let limit = serde_json::json!({"Max": 100000, "Remaining": 40000});
        assert_eq!(usage_percent(&limit), Some(60.0));
        assert_eq!(usage_percent(&serde_json::json!({"Max": 0, "Remaining": 0})), None);
        assert_eq!(usage_percent(&serde_json::json!({})), None);
    }

    #[test]
    fn weights_sum_to_one_hundred() {
        let total: u32 = WEIGHTS.iter().map(|(_, _, w)| *w).sum();
        assert_eq!(total, 100);
    }

    #[tokio::test]
    async fn data_kpis_distinguish_unknown_counts_from_zero() {
        let mut s = snapshot();
        s.objects.push(ObjectDescriptor::shallow(
            "Invoice__c".into(),
            "Invoice".into(),
            true,
        ));
        // No record counts anywhere: volume KPIs must be NA, not HEALTHY.
        let computation = compute_health(&s, None).await.unwrap();
        let data = computation
            .categories
            .iter()
            .find(|c| c.key == "data")
            .unwrap();
        let records = data.kpis.iter().find(|k| k.key == "recordsApprox").unwrap();
        assert_eq!(records.status, KpiStatus::NotApplicable);
        let large = data.kpis.iter().find(|k| k.key == "largeObjects").unwrap();
        assert_eq!(large.status, KpiStatus::NotApplicable);
    }
}
