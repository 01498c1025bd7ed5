//! Integration-surface fetcher: everything that points out of the org.
//! Each slice is independent; one being refused must not hide the rest.

use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{
    ConnectedAppSummary, ExternalDataSourceSummary, IntegrationIndex, ItemCollection,
    NamedCredentialSummary, RemoteSiteSummary,
};
use crate::transport::OrgClient;

use super::cascade::{run_cascade, CascadeOutcome, QueryStrategy};

const CONNECTED_APP_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "connected app listing",
    soql: "SELECT Name FROM ConnectedApplication",
    tooling: false,
}];

const NAMED_CREDENTIAL_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "named credential listing",
    soql: "SELECT DeveloperName, Endpoint FROM NamedCredential",
    tooling: false,
}];

const EXTERNAL_DATA_SOURCE_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "external data source listing",
    soql: "SELECT DeveloperName FROM ExternalDataSource",
    tooling: false,
}];

const REMOTE_SITE_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "remote site listing",
    soql: "SELECT SiteName, EndpointUrl FROM RemoteProxy",
    tooling: true,
}];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectedAppRow {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NamedCredentialRow {
    developer_name: String,
    #[serde(default)]
    endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExternalDataSourceRow {
    developer_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteSiteRow {
    site_name: String,
    #[serde(default)]
    endpoint_url: Option<String>,
}

pub async fn fetch_integrations(client: &OrgClient) -> Result<IntegrationIndex, TransportError> {
    let (apps, credentials, sources, sites) = tokio::join!(
        fetch_connected_apps(client),
        fetch_named_credentials(client),
        fetch_external_data_sources(client),
        fetch_remote_sites(client),
    );

    Ok(IntegrationIndex {
        connected_apps: apps?,
        named_credentials: credentials?,
        external_data_sources: sources?,
        remote_sites: sites?,
    })
}

async fn fetch_connected_apps(
    client: &OrgClient,
) -> Result<ItemCollection<ConnectedAppSummary>, TransportError> {
    match run_cascade::<ConnectedAppRow>(client, "connected apps", CONNECTED_APP_STRATEGIES)
        .await?
    {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| ConnectedAppSummary { name: r.name })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_named_credentials(
    client: &OrgClient,
) -> Result<ItemCollection<NamedCredentialSummary>, TransportError> {
    match run_cascade::<NamedCredentialRow>(
        client,
        "named credentials",
        NAMED_CREDENTIAL_STRATEGIES,
    )
    .await?
    {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| NamedCredentialSummary {
                    name: r.developer_name,
                    endpoint: r.endpoint,
                })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_external_data_sources(
    client: &OrgClient,
) -> Result<ItemCollection<ExternalDataSourceSummary>, TransportError> {
    match run_cascade::<ExternalDataSourceRow>(
        client,
        "external data sources",
        EXTERNAL_DATA_SOURCE_STRATEGIES,
    )
    .await?
    {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| ExternalDataSourceSummary {
                    name: r.developer_name,
                })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_remote_sites(
    client: &OrgClient,
) -> Result<ItemCollection<RemoteSiteSummary>, TransportError> {
    match run_cascade::<RemoteSiteRow>(client, "remote sites", REMOTE_SITE_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("remote sites resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| RemoteSiteSummary {
                        name: r.site_name,
                        endpoint: r.endpoint_url,
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}
