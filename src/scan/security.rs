//! Security-model fetcher: profiles and standalone permission sets.
//! Sharing rules have no queryable REST surface; that gap is recorded as
//! a note rather than silently dropped.

use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{ItemCollection, PermissionSetSummary, ProfileSummary, SecurityIndex};
use crate::transport::OrgClient;

use super::cascade::{run_cascade, CascadeOutcome, QueryStrategy};

const PROFILE_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "profile (rich)",
        soql: "SELECT Name, UserType FROM Profile",
        tooling: false,
    },
    QueryStrategy {
        label: "profile (minimal)",
        soql: "SELECT Name FROM Profile",
        tooling: false,
    },
];

const PERMISSION_SET_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "permission set listing",
    soql: "SELECT Name, Label FROM PermissionSet WHERE IsOwnedByProfile = false",
    tooling: false,
}];

const SHARING_NOTE: &str = "sharing rules are not queryable over the REST API surface";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProfileRow {
    name: String,
    #[serde(default)]
    user_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PermissionSetRow {
    name: String,
    #[serde(default)]
    label: Option<String>,
}

pub async fn fetch_security(client: &OrgClient) -> Result<SecurityIndex, TransportError> {
    let (profiles, permission_sets) =
        tokio::join!(fetch_profiles(client), fetch_permission_sets(client));

    Ok(SecurityIndex {
        profiles: profiles?,
        permission_sets: permission_sets?,
        note: Some(SHARING_NOTE.to_string()),
    })
}

async fn fetch_profiles(
    client: &OrgClient,
) -> Result<ItemCollection<ProfileSummary>, TransportError> {
    match run_cascade::<ProfileRow>(client, "profiles", PROFILE_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("profiles resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| ProfileSummary {
                        name: r.name,
                        user_type: r.user_type,
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_permission_sets(
    client: &OrgClient,
) -> Result<ItemCollection<PermissionSetSummary>, TransportError> {
    match run_cascade::<PermissionSetRow>(client, "permission sets", PERMISSION_SET_STRATEGIES)
        .await?
    {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| PermissionSetSummary {
                    name: r.name,
                    label: r.label,
                })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}
