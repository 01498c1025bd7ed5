//! Findings engine: a fixed battery of independent detectors over the
//! assembled inventory. Pure and deterministic: the same snapshot always
//! yields the same finding set, ids included. Detectors whose input is
//! absent (no coverage data, count-only collections without detail) skip
//! silently instead of erroring.

use std::collections::HashMap;

use crate::model::{Finding, InventorySnapshot, ObjectDescriptor, Severity, SeverityTally};

/// Record volume above which an object's data migration needs its own
/// plan.
const LARGE_OBJECT_THRESHOLD: u64 = 100_000;
/// Active triggers on one object at which trigger logic is considered
/// entangled.
const MULTI_TRIGGER_THRESHOLD: u32 = 3;
/// Combined active automation components on one object at which the
/// object's behavior is no longer reviewable piecemeal.
const COMPLEX_AUTOMATION_THRESHOLD: u32 = 5;
/// Org-wide active automation components per object.
const DENSITY_THRESHOLD: f64 = 2.0;

const CATEGORY_DATA_MODEL: &str = "dataModel";
const CATEGORY_AUTOMATION: &str = "automation";
const CATEGORY_CODE: &str = "code";

/// Active automation components grouped by target object, built once so
/// the per-object detectors stay O(objects).
struct AutomationByObject {
    triggers: HashMap<String, u32>,
    validation_rules: HashMap<String, u32>,
    record_flows: HashMap<String, u32>,
    workflow_rules: HashMap<String, u32>,
}

impl AutomationByObject {
    fn build(snapshot: &InventorySnapshot) -> Self {
        let mut triggers: HashMap<String, u32> = HashMap::new();
        if let Some(items) = snapshot.automation.triggers.items() {
            for t in items.iter().filter(|t| t.active) {
                if let Some(object) = &t.object {
                    *triggers.entry(object.clone()).or_default() += 1;
                }
            }
        }

        let mut validation_rules: HashMap<String, u32> = HashMap::new();
        if let Some(items) = snapshot.automation.validation_rules.items() {
            for v in items.iter().filter(|v| v.active) {
                if let Some(object) = &v.object {
                    *validation_rules.entry(object.clone()).or_default() += 1;
                }
            }
        }

        let mut record_flows: HashMap<String, u32> = HashMap::new();
        if let Some(items) = snapshot.automation.flows.items() {
            for f in items.iter().filter(|f| f.active && f.is_record_triggered()) {
                if let Some(object) = &f.trigger_object {
                    *record_flows.entry(object.clone()).or_default() += 1;
                }
            }
        }

        let mut workflow_rules: HashMap<String, u32> = HashMap::new();
        if let Some(items) = snapshot.automation.workflow_rules.items() {
            for w in items.iter().filter(|w| w.active) {
                if let Some(object) = &w.object {
                    *workflow_rules.entry(object.clone()).or_default() += 1;
                }
            }
        }

        Self {
            triggers,
            validation_rules,
            record_flows,
            workflow_rules,
        }
    }

    fn count(map: &HashMap<String, u32>, object: &str) -> u32 {
        map.get(object).copied().unwrap_or(0)
    }
}

pub fn detect(snapshot: &InventorySnapshot) -> Vec<Finding> {
    let by_object = AutomationByObject::build(snapshot);
    let mut findings = Vec::new();

    for obj in &snapshot.objects {
        detect_autonumber(obj, &mut findings);
        detect_large_object(obj, &mut findings);
        detect_required_without_default(obj, &mut findings);
        detect_master_detail(obj, &mut findings);
        detect_triggers(obj, &by_object, &mut findings);
        detect_validation_rules(obj, &by_object, &mut findings);
        detect_record_flows(obj, &by_object, &mut findings);
        detect_complex_automation(obj, &by_object, &mut findings);
    }

    detect_automation_density(snapshot, &mut findings);
    detect_coverage(snapshot, &mut findings);

    findings
}

pub fn tally(findings: &[Finding]) -> SeverityTally {
    let mut tally = SeverityTally::default();
    for finding in findings {
        match finding.severity {
            Severity::High => tally.high += 1,
            Severity::Medium => tally.medium += 1,
            Severity::Low => tally.low += 1,
        }
    }
    tally
}

fn finding(
    id: String,
    severity: Severity,
    category: &str,
    title: String,
    description: String,
    objects: Vec<String>,
    impact: &str,
    remediation: &[&str],
) -> Finding {
    Finding {
        id,
        severity,
        category: category.to_string(),
        title,
        description,
        objects,
        impact: impact.to_string(),
        remediation: remediation.iter().map(|s| s.to_string()).collect(),
    }
}

fn detect_autonumber(obj: &ObjectDescriptor, findings: &mut Vec<Finding>) {
    if obj.autonumber_fields.is_empty() {
        return;
    }
    findings.push(finding(
        format!("AUTONUMBER_{}", obj.api_name),
        Severity::Medium,
        CATEGORY_DATA_MODEL,
        format!("Auto-number fields on {}", obj.api_name),
        format!(
            "{} has {} auto-number field(s): {}. Loading records on the target \
             platform restarts the sequence unless it is carried over explicitly.",
            obj.api_name,
            obj.autonumber_fields.len(),
            obj.autonumber_fields.join(", ")
        ),
        vec![obj.api_name.clone()],
        "Existing auto-number values will not be preserved by a plain data load.",
        &[
            "Export current auto-number values before migration",
            "Seed the target sequence or convert the field to text during the load",
        ],
    ));
}

fn detect_large_object(obj: &ObjectDescriptor, findings: &mut Vec<Finding>) {
    let Some(count) = obj.record_count else {
        return;
    };
    if count <= LARGE_OBJECT_THRESHOLD {
        return;
    }
    findings.push(finding(
        format!("LARGE_OBJECT_{}", obj.api_name),
        Severity::Medium,
        CATEGORY_DATA_MODEL,
        format!("Large data volume on {}", obj.api_name),
        format!(
            "{} holds approximately {} records, above the {} threshold for \
             single-pass data loads.",
            obj.api_name, count, LARGE_OBJECT_THRESHOLD
        ),
        vec![obj.api_name.clone()],
        "Bulk loads of this size need batching, and indexes/sharing recalculation will dominate load time.",
        &[
            "Plan a batched bulk-API load for this object",
            "Defer sharing rule recalculation until after the load",
        ],
    ));
}

fn detect_required_without_default(obj: &ObjectDescriptor, findings: &mut Vec<Finding>) {
    if !obj.has_records() {
        return;
    }
    let affected: Vec<&str> = obj
        .fields
        .iter()
        .filter(|f| f.required && !f.has_default && f.api_name.ends_with("__c"))
        .map(|f| f.api_name.as_str())
        .collect();
    if affected.is_empty() {
        return;
    }
    findings.push(finding(
        format!("REQUIRED_NO_DEFAULT_{}", obj.api_name),
        Severity::Low,
        CATEGORY_DATA_MODEL,
        format!("Required fields without defaults on {}", obj.api_name),
        format!(
            "{} has required custom field(s) with no default value: {}. Any \
             source row missing these values will fail to load.",
            obj.api_name,
            affected.join(", ")
        ),
        vec![obj.api_name.clone()],
        "Incomplete source data will be rejected at load time.",
        &[
            "Profile source data for null rates on these fields",
            "Agree a backfill value or relax the constraint during the load window",
        ],
    ));
}

fn detect_master_detail(obj: &ObjectDescriptor, findings: &mut Vec<Finding>) {
    if !obj.has_records() || obj.master_detail_relationships.is_empty() {
        return;
    }
    let parents: Vec<&str> = obj
        .master_detail_relationships
        .iter()
        .map(|r| r.references.as_str())
        .collect();
    findings.push(finding(
        format!("MASTER_DETAIL_{}", obj.api_name),
        Severity::Medium,
        CATEGORY_DATA_MODEL,
        format!("Master-detail dependencies on {}", obj.api_name),
        format!(
            "{} is the detail side of master-detail relationship(s) to {} and \
             holds records, so parents must be loaded and re-keyed first.",
            obj.api_name,
            parents.join(", ")
        ),
        vec![obj.api_name.clone()],
        "Load order is constrained: detail rows cannot exist before their masters.",
        &[
            "Sequence the load parent-first",
            "Maintain an old-to-new id mapping for the master objects",
        ],
    ));
}

fn detect_triggers(
    obj: &ObjectDescriptor,
    by_object: &AutomationByObject,
    findings: &mut Vec<Finding>,
) {
    let active = AutomationByObject::count(&by_object.triggers, &obj.api_name);
    if active == 0 {
        return;
    }

    // A trigger over a populated object fires on every migrated row;
    // on an empty object it is only a porting concern.
    let severity = if obj.has_records() {
        Severity::High
    } else {
        Severity::Medium
    };
    findings.push(finding(
        format!("TRIGGER_BLOCKER_{}", obj.api_name),
        severity,
        CATEGORY_AUTOMATION,
        format!("Active trigger(s) on {}", obj.api_name),
        format!(
            "{} has {} active Apex trigger(s), which will fire during data \
             loads unless disabled.",
            obj.api_name, active
        ),
        vec![obj.api_name.clone()],
        "Trigger side effects during the load can corrupt migrated data or blow governor limits.",
        &[
            "Inventory the trigger logic and decide what must be re-implemented",
            "Deactivate or bypass triggers for the duration of the load",
        ],
    ));

    if active >= MULTI_TRIGGER_THRESHOLD {
        findings.push(finding(
            format!("MULTI_TRIGGER_{}", obj.api_name),
            Severity::High,
            CATEGORY_AUTOMATION,
            format!("Trigger pile-up on {}", obj.api_name),
            format!(
                "{} has {} active triggers; execution order between them is \
                 not guaranteed and their combined behavior is hard to reproduce.",
                obj.api_name, active
            ),
            vec![obj.api_name.clone()],
            "Multiple triggers on one object interleave unpredictably and resist faithful porting.",
            &[
                "Consolidate to a single trigger per object before migrating",
                "Document inter-trigger ordering assumptions",
            ],
        ));
    }
}

fn detect_validation_rules(
    obj: &ObjectDescriptor,
    by_object: &AutomationByObject,
    findings: &mut Vec<Finding>,
) {
    let active = AutomationByObject::count(&by_object.validation_rules, &obj.api_name);
    if active == 0 {
        return;
    }
    findings.push(finding(
        format!("VALIDATION_RULES_{}", obj.api_name),
        Severity::Medium,
        CATEGORY_AUTOMATION,
        format!("Active validation rules on {}", obj.api_name),
        format!(
            "{} has {} active validation rule(s) that will reject \
             non-conforming rows during the data load.",
            obj.api_name, active
        ),
        vec![obj.api_name.clone()],
        "Historical records frequently violate rules added later and will fail to load.",
        &[
            "Test the load against a sandbox with rules active",
            "Deactivate validation rules during the load window",
        ],
    ));
}

fn detect_record_flows(
    obj: &ObjectDescriptor,
    by_object: &AutomationByObject,
    findings: &mut Vec<Finding>,
) {
    let active = AutomationByObject::count(&by_object.record_flows, &obj.api_name);
    if active == 0 {
        return;
    }
    findings.push(finding(
        format!("RECORD_FLOWS_{}", obj.api_name),
        Severity::Medium,
        CATEGORY_AUTOMATION,
        format!("Record-triggered flows on {}", obj.api_name),
        format!(
            "{} has {} active record-triggered flow(s) that will run for \
             every migrated record.",
            obj.api_name, active
        ),
        vec![obj.api_name.clone()],
        "Flows firing en masse during the load cause side effects and limit consumption.",
        &[
            "Map each flow's behavior to the target platform's automation",
            "Suspend record-triggered flows during the load",
        ],
    ));
}

fn detect_complex_automation(
    obj: &ObjectDescriptor,
    by_object: &AutomationByObject,
    findings: &mut Vec<Finding>,
) {
    let combined = AutomationByObject::count(&by_object.triggers, &obj.api_name)
        + AutomationByObject::count(&by_object.validation_rules, &obj.api_name)
        + AutomationByObject::count(&by_object.record_flows, &obj.api_name)
        + AutomationByObject::count(&by_object.workflow_rules, &obj.api_name);
    if combined < COMPLEX_AUTOMATION_THRESHOLD {
        return;
    }
    findings.push(finding(
        format!("COMPLEX_AUTOMATION_{}", obj.api_name),
        Severity::High,
        CATEGORY_AUTOMATION,
        format!("Complex automation on {}", obj.api_name),
        format!(
            "{} has {} active automation components across triggers, rules \
             and flows; their combined behavior must be reverse-engineered \
             before it can be rebuilt.",
            obj.api_name, combined
        ),
        vec![obj.api_name.clone()],
        "Layered automation on one object is the most common source of post-migration behavior drift.",
        &[
            "Produce a single consolidated behavior spec for this object",
            "Rebuild as one orchestrated automation on the target platform",
        ],
    ));
}

fn detect_automation_density(snapshot: &InventorySnapshot, findings: &mut Vec<Finding>) {
    if snapshot.objects.is_empty() {
        return;
    }
    let components = snapshot.automation.active_component_count();
    let density = components as f64 / snapshot.objects.len() as f64;
    if density <= DENSITY_THRESHOLD {
        return;
    }
    findings.push(finding(
        "AUTOMATION_DENSITY".to_string(),
        Severity::Medium,
        CATEGORY_AUTOMATION,
        "High org-wide automation density".to_string(),
        format!(
            "The org averages {:.1} active automation components per object \
             ({} components over {} objects).",
            density,
            components,
            snapshot.objects.len()
        ),
        Vec::new(),
        "Heavily automated orgs take disproportionally longer to re-platform and verify.",
        &[
            "Rank objects by automation count and migrate the heaviest first",
            "Retire automation that no longer has an owner before migrating it",
        ],
    ));
}

fn detect_coverage(snapshot: &InventorySnapshot, findings: &mut Vec<Finding>) {
    let coverage = &snapshot.code.coverage;

    // No coverage data at all: every coverage detector stays silent.
    if let Some(percent) = coverage.org_wide_percent {
        if percent < 75.0 {
            let severity = if percent < 50.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            findings.push(finding(
                "LOW_ORG_COVERAGE".to_string(),
                severity,
                CATEGORY_CODE,
                "Org-wide test coverage below 75%".to_string(),
                format!(
                    "Org-wide Apex test coverage is {:.0}%; the platform \
                     requires 75% to deploy.",
                    percent
                ),
                Vec::new(),
                "Code changes required by the migration cannot be deployed until coverage recovers.",
                &[
                    "Backfill tests for the largest uncovered classes first",
                    "Gate further code changes on non-decreasing coverage",
                ],
            ));
        }
    }

    if !coverage.units.is_empty() {
        let below_50 = coverage.units_in_band(0.0, 50.0);
        if below_50 > 0 {
            findings.push(finding(
                "UNITS_BELOW_50".to_string(),
                Severity::High,
                CATEGORY_CODE,
                "Classes with under 50% coverage".to_string(),
                format!(
                    "{} class(es)/trigger(s) have line coverage below 50%.",
                    below_50
                ),
                Vec::new(),
                "These units are effectively untested and unsafe to port as-is.",
                &["Write characterization tests before porting these units"],
            ));
        }

        let mid_band = coverage.units_in_band(50.0, 75.0);
        if mid_band > 0 {
            findings.push(finding(
                "UNITS_50_75".to_string(),
                Severity::Medium,
                CATEGORY_CODE,
                "Classes between 50% and 75% coverage".to_string(),
                format!(
                    "{} class(es)/trigger(s) have line coverage between 50% and 75%.",
                    mid_band
                ),
                Vec::new(),
                "Partially tested units will pass deployment but hide behavior gaps.",
                &["Raise these units above 75% as part of migration prep"],
            ));
        }
    }
}
