//! Installed-package fetcher.

use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{ItemCollection, PackageInfo};
use crate::transport::OrgClient;

use super::cascade::{run_cascade, CascadeOutcome, QueryStrategy};

const PACKAGE_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "installed package (rich)",
        soql: "SELECT SubscriberPackage.Name, SubscriberPackage.NamespacePrefix, \
               SubscriberPackageVersion.Name FROM InstalledSubscriberPackage",
        tooling: true,
    },
    QueryStrategy {
        label: "installed package (minimal)",
        soql: "SELECT SubscriberPackage.Name FROM InstalledSubscriberPackage",
        tooling: true,
    },
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PackageRow {
    #[serde(default)]
    subscriber_package: Option<SubscriberPackageRef>,
    #[serde(default)]
    subscriber_package_version: Option<VersionRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubscriberPackageRef {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionRef {
    #[serde(default)]
    name: Option<String>,
}

pub async fn fetch_packages(
    client: &OrgClient,
) -> Result<ItemCollection<PackageInfo>, TransportError> {
    match run_cascade::<PackageRow>(client, "installed packages", PACKAGE_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("installed packages resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| {
                        let (name, namespace) = match r.subscriber_package {
                            Some(p) => (
                                p.name.unwrap_or_else(|| "(unnamed package)".to_string()),
                                p.namespace_prefix,
                            ),
                            None => ("(unnamed package)".to_string(), None),
                        };
                        PackageInfo {
                            name,
                            namespace,
                            version: r.subscriber_package_version.and_then(|v| v.name),
                        }
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}
