//! Object schema fetcher.
//!
//! Listing comes from the global describe, which is the one endpoint in
//! the whole scan prone to indefinite stalls, so it runs under its own
//! deadline. Record counts come from the record-count limits endpoint.
//! Per-object describes fan out with bounded concurrency; a single
//! describe failing yields a shallow descriptor, never a fetcher failure.

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::CONFIG;
use crate::error::TransportError;
use crate::model::{FieldDescriptor, ObjectDescriptor, RelationshipDescriptor};
use crate::transport::OrgClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlobalSObject {
    name: String,
    label: String,
    custom: bool,
    #[serde(default)]
    queryable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeField {
    name: String,
    label: String,
    #[serde(rename = "type")]
    field_type: String,
    nillable: bool,
    #[serde(default)]
    auto_number: bool,
    #[serde(default)]
    defaulted_on_create: bool,
    #[serde(default)]
    default_value: Option<Value>,
    #[serde(default)]
    reference_to: Vec<String>,
    #[serde(default)]
    cascade_delete: bool,
    #[serde(default)]
    relationship_order: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRecordType {
    name: String,
}

/// System companion objects that only add noise to a migration audit.
const NOISE_SUFFIXES: &[&str] = &["__Share", "__History", "__Tag", "__Feed", "ChangeEvent"];

fn is_noise(api_name: &str) -> bool {
    NOISE_SUFFIXES.iter().any(|s| api_name.ends_with(s))
}

pub async fn fetch_schema(client: &OrgClient) -> Result<Vec<ObjectDescriptor>, TransportError> {
    let describe_timeout = Duration::from_millis(CONFIG.describe_timeout_ms);
    let mut listing = match tokio::time::timeout(describe_timeout, client.describe_global()).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(TransportError::Timeout(format!(
                "global describe did not answer within {}ms",
                CONFIG.describe_timeout_ms
            )));
        }
    };

    let sobjects: Vec<GlobalSObject> =
        serde_json::from_value(listing["sobjects"].take())?;

    // Counts are best-effort: an org can deny this endpoint while the
    // listing still works, and "unknown" must stay distinct from zero.
    let counts = fetch_record_counts(client).await;

    let mut objects: Vec<ObjectDescriptor> = sobjects
        .into_iter()
        .filter(|s| s.queryable && !is_noise(&s.name))
        .filter(|s| s.custom || counts.get(s.name.as_str()).is_some_and(|n| *n > 0))
        .map(|s| {
            let mut obj = ObjectDescriptor::shallow(s.name, s.label, s.custom);
            obj.record_count = counts.get(obj.api_name.as_str()).copied();
            obj
        })
        .collect();

    info!(
        "schema: {} objects retained from listing ({} with known record counts)",
        objects.len(),
        counts.len()
    );

    describe_objects(client, &mut objects).await;
    Ok(objects)
}

async fn fetch_record_counts(client: &OrgClient) -> HashMap<String, u64> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct CountEntry {
        name: String,
        count: u64,
    }

    match client.record_counts().await {
        Ok(mut value) => {
            match serde_json::from_value::<Vec<CountEntry>>(value["sObjects"].take()) {
                Ok(entries) => entries.into_iter().map(|e| (e.name, e.count)).collect(),
                Err(e) => {
                    debug!("schema: record count payload unreadable: {}", e);
                    HashMap::new()
                }
            }
        }
        Err(e) => {
            debug!("schema: record counts unavailable: {}", e);
            HashMap::new()
        }
    }
}

/// Fill schema detail for custom objects via per-object describes, a
/// bounded-concurrency fan-out over the shared client. Only the first
/// `describe_object_cap` custom objects are described.
async fn describe_objects(client: &OrgClient, objects: &mut [ObjectDescriptor]) {
    let targets: Vec<usize> = objects
        .iter()
        .enumerate()
        .filter(|(_, o)| o.custom)
        .take(CONFIG.describe_object_cap)
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        return;
    }

    let mut futures = FuturesUnordered::new();
    let mut target_iter = targets.into_iter();

    // Seed the initial window, then refill as describes complete.
    for _ in 0..CONFIG.describe_concurrency {
        if let Some(idx) = target_iter.next() {
            futures.push(describe_one(client, idx, objects[idx].api_name.clone()));
        }
    }

    let mut described = 0usize;
    while let Some((idx, result)) = futures.next().await {
        match result {
            Ok(describe) => {
                apply_describe(&mut objects[idx], describe);
                described += 1;
            }
            Err(e) => {
                warn!(
                    "schema: describe of {} failed, keeping shallow descriptor: {}",
                    objects[idx].api_name, e
                );
            }
        }
        if let Some(next_idx) = target_iter.next() {
            futures.push(describe_one(client, next_idx, objects[next_idx].api_name.clone()));
        }
    }

    debug!("schema: {} objects described in detail", described);
}

async fn describe_one(
    client: &OrgClient,
    idx: usize,
    name: String,
) -> (usize, Result<Value, TransportError>) {
    (idx, client.describe_object(&name).await)
}

fn apply_describe(obj: &mut ObjectDescriptor, mut describe: Value) {
    let fields: Vec<DescribeField> =
        match serde_json::from_value(describe["fields"].take()) {
            Ok(f) => f,
            Err(e) => {
                debug!("schema: field list of {} unreadable: {}", obj.api_name, e);
                return;
            }
        };

    if let Ok(record_types) =
        serde_json::from_value::<Vec<DescribeRecordType>>(describe["recordTypeInfos"].take())
    {
        obj.record_types = record_types.into_iter().map(|r| r.name).collect();
    }

    for field in &fields {
        if field.auto_number {
            obj.autonumber_fields.push(field.name.clone());
        }
        if field.field_type == "picklist" || field.field_type == "multipicklist" {
            obj.picklist_fields.push(field.name.clone());
        }
        if field.field_type == "reference" {
            for parent in &field.reference_to {
                let rel = RelationshipDescriptor {
                    field: field.name.clone(),
                    references: parent.clone(),
                };
                // A master-detail field cascades deletes from its parent.
                if field.cascade_delete || field.relationship_order.is_some() {
                    obj.master_detail_relationships.push(rel);
                } else {
                    obj.lookup_relationships.push(rel);
                }
            }
        }
    }

    obj.fields = fields
        .into_iter()
        .map(|f| FieldDescriptor {
            required: !f.nillable && !f.defaulted_on_create && f.field_type != "boolean",
            has_default: f.defaulted_on_create
                || f.default_value.as_ref().is_some_and(|v| !v.is_null()),
            api_name: f.name,
            label: f.label,
            field_type: f.field_type,
            references: f.reference_to,
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn noise_objects_are_excluded() {
        assert!(is_noise("Invoice__Share"));
        assert!(is_noise("Invoice__History"));
        assert!(is_noise("InvoiceChangeEvent"));
        assert!(!is_noise("Invoice__c"));
    }

    #[test]
    fn describe_classifies_fields() {
        let mut obj = ObjectDescriptor::shallow("Invoice__c".into(), "Invoice".into(), true);
        let describe = json!({
            "fields": [
                {
                    "name": "Name",
                    "label": "Invoice Number",
                    "type": "string",
                    "nillable": false,
                    "autoNumber": true
                },
                {
                    "name": "Status__c",
                    "label": "Status",
                    "type": "picklist",
                    "nillable": true
                },
                {
                    "name": "Account__c",
                    "label": "Account",
                    "type": "reference",
                    "nillable": false,
                    "referenceTo": ["Account"],
                    "cascadeDelete": true,
                    "relationshipOrder": 0
                },
                {
                    "name": "Contact__c",
                    "label": "Contact",
                    "type": "reference",
                    "nillable": true,
                    "referenceTo": ["Contact"]
                },
                {
                    "name": "Amount__c",
                    "label": "Amount",
                    "type": "currency",
                    "nillable": false,
                    "defaultValue": 0.0
                }
            ],
            "recordTypeInfos": [{"name": "Master"}]
        });

        apply_describe(&mut obj, describe);

        assert_eq!(obj.autonumber_fields, vec!["Name"]);
        assert_eq!(obj.picklist_fields, vec!["Status__c"]);
        assert_eq!(obj.master_detail_relationships.len(), 1);
        assert_eq!(obj.master_detail_relationships[0].references, "Account");
        assert_eq!(obj.lookup_relationships.len(), 1);
        assert_eq!(obj.record_types, vec!["Master"]);

        // Amount__c is required but carries a default; Account__c is
        // required with none.
        let amount = obj.fields.iter().find(|f| f.api_name == "Amount__c").unwrap();
        assert!(amount.required && amount.has_default);
        let account = obj.fields.iter().find(|f| f.api_name == "Account__c").unwrap();
        assert!(account.required && !account.has_default);
    }
}
