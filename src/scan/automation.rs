//! Automation inventory fetcher: flows, Apex triggers, validation rules,
//! workflow rules, approval processes.
//!
//! Validation and workflow rules get the counting-only treatment: their
//! aggregate `COUNT()` queries are reliable where detail queries are
//! not, so the count pair is fetched first and the detail list is only
//! exposed when it actually came back non-empty.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{
    ApprovalProcessSummary, AutomationIndex, FlowSummary, ItemCollection, TriggerSummary,
    ValidationRuleSummary, WorkflowRuleSummary,
};
use crate::transport::OrgClient;

use super::cascade::{count_pair, run_cascade, CascadeOutcome, QueryStrategy};

// Ranked by how much they return when they work: the view exposes
// trigger metadata the Tooling definition object does not.
const FLOW_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "flow view (rich)",
        soql: "SELECT ApiName, Label, ProcessType, TriggerType, TriggerObjectOrEventLabel, IsActive FROM FlowDefinitionView",
        tooling: false,
    },
    QueryStrategy {
        label: "flow view (minimal)",
        soql: "SELECT ApiName, Label, ProcessType, IsActive FROM FlowDefinitionView",
        tooling: false,
    },
    QueryStrategy {
        label: "flow definition (relationship)",
        soql: "SELECT DeveloperName, ActiveVersion.ProcessType FROM FlowDefinition",
        tooling: true,
    },
];

const TRIGGER_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "apex trigger (rich)",
        soql: "SELECT Name, TableEnumOrId, Status, LengthWithoutComments FROM ApexTrigger",
        tooling: true,
    },
    QueryStrategy {
        label: "apex trigger (minimal)",
        soql: "SELECT Name, Status FROM ApexTrigger",
        tooling: true,
    },
];

const VALIDATION_RULE_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "validation rule (rich)",
        soql: "SELECT ValidationName, Active, EntityDefinition.QualifiedApiName FROM ValidationRule",
        tooling: true,
    },
    QueryStrategy {
        label: "validation rule (minimal)",
        soql: "SELECT ValidationName, Active FROM ValidationRule",
        tooling: true,
    },
];

const WORKFLOW_RULE_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "workflow rule (rich)",
        soql: "SELECT Name, TableEnumOrId, Active FROM WorkflowRule",
        tooling: true,
    },
    QueryStrategy {
        label: "workflow rule (minimal)",
        soql: "SELECT Name, Active FROM WorkflowRule",
        tooling: true,
    },
];

const APPROVAL_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "process definition",
        soql: "SELECT Name, TableEnumOrId, State FROM ProcessDefinition WHERE Type = 'Approval'",
        tooling: false,
    },
    QueryStrategy {
        label: "process definition (minimal)",
        soql: "SELECT Name, State FROM ProcessDefinition",
        tooling: false,
    },
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlowRow {
    #[serde(default)]
    api_name: Option<String>,
    #[serde(default)]
    developer_name: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    process_type: Option<String>,
    #[serde(default)]
    trigger_object_or_event_label: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    active_version: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TriggerRow {
    name: String,
    #[serde(default)]
    table_enum_or_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    length_without_comments: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ValidationRuleRow {
    validation_name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    entity_definition: Option<EntityRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EntityRef {
    #[serde(default)]
    qualified_api_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WorkflowRuleRow {
    name: String,
    #[serde(default)]
    table_enum_or_id: Option<String>,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApprovalRow {
    name: String,
    #[serde(default)]
    table_enum_or_id: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

pub async fn fetch_automation(client: &OrgClient) -> Result<AutomationIndex, TransportError> {
    let (flows, triggers, validation_rules, workflow_rules, approval_processes) = tokio::join!(
        fetch_flows(client),
        fetch_triggers(client),
        fetch_validation_rules(client),
        fetch_workflow_rules(client),
        fetch_approval_processes(client),
    );

    Ok(AutomationIndex {
        flows: flows?,
        triggers: triggers?,
        validation_rules: validation_rules?,
        workflow_rules: workflow_rules?,
        approval_processes: approval_processes?,
    })
}

async fn fetch_flows(
    client: &OrgClient,
) -> Result<ItemCollection<FlowSummary>, TransportError> {
    match run_cascade::<FlowRow>(client, "flows", FLOW_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("flows resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records.into_iter().map(flow_summary).collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

fn flow_summary(row: FlowRow) -> FlowSummary {
    // The Tooling fallback marks activity by the presence of an active
    // version rather than a flag.
    let active = row
        .is_active
        .unwrap_or_else(|| row.active_version.as_ref().is_some_and(|v| !v.is_null()));
    let process_type = row.process_type.or_else(|| {
        row.active_version
            .as_ref()
            .and_then(|v| v["ProcessType"].as_str().map(str::to_string))
    });
    FlowSummary {
        api_name: row
            .api_name
            .or(row.developer_name)
            .unwrap_or_else(|| "(unnamed flow)".to_string()),
        label: row.label,
        process_type,
        active,
        trigger_object: row.trigger_object_or_event_label,
    }
}

async fn fetch_triggers(
    client: &OrgClient,
) -> Result<ItemCollection<TriggerSummary>, TransportError> {
    match run_cascade::<TriggerRow>(client, "apex triggers", TRIGGER_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("apex triggers resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| TriggerSummary {
                        active: r.status.as_deref().is_none_or(|s| s == "Active"),
                        name: r.name,
                        object: r.table_enum_or_id,
                        length_without_comments: r.length_without_comments,
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_validation_rules(
    client: &OrgClient,
) -> Result<ItemCollection<ValidationRuleSummary>, TransportError> {
    let (total, active) = count_pair(
        client,
        "validation rules",
        "SELECT COUNT() FROM ValidationRule",
        "SELECT COUNT() FROM ValidationRule WHERE Active = true",
        true,
    )
    .await?;

    match run_cascade::<ValidationRuleRow>(client, "validation rules", VALIDATION_RULE_STRATEGIES)
        .await?
    {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("validation rules resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| ValidationRuleSummary {
                        name: r.validation_name,
                        object: r.entity_definition.and_then(|e| e.qualified_api_name),
                        active: r.active,
                    })
                    .collect(),
            ))
        }
        // Detail queries routinely refuse this entity while the counts
        // answer; counts are the category's representation then. The
        // per-object describe scan that once backfilled detail here is
        // deliberately gone.
        CascadeOutcome::Empty | CascadeOutcome::Unavailable { .. }
            if total.is_some() || active.is_some() =>
        {
            Ok(ItemCollection::count_only(total, active))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_workflow_rules(
    client: &OrgClient,
) -> Result<ItemCollection<WorkflowRuleSummary>, TransportError> {
    let (total, active) = count_pair(
        client,
        "workflow rules",
        "SELECT COUNT() FROM WorkflowRule",
        "SELECT COUNT() FROM WorkflowRule WHERE Active = true",
        true,
    )
    .await?;

    match run_cascade::<WorkflowRuleRow>(client, "workflow rules", WORKFLOW_RULE_STRATEGIES)
        .await?
    {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("workflow rules resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| WorkflowRuleSummary {
                        name: r.name,
                        object: r.table_enum_or_id,
                        active: r.active,
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty | CascadeOutcome::Unavailable { .. }
            if total.is_some() || active.is_some() =>
        {
            Ok(ItemCollection::count_only(total, active))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_approval_processes(
    client: &OrgClient,
) -> Result<ItemCollection<ApprovalProcessSummary>, TransportError> {
    match run_cascade::<ApprovalRow>(client, "approval processes", APPROVAL_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("approval processes resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| ApprovalProcessSummary {
                        name: r.name,
                        object: r.table_enum_or_id,
                        active: r.state.as_deref().is_none_or(|s| s == "Active"),
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}
