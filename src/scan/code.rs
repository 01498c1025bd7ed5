//! Apex code and test-coverage fetcher.

use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{ApexClassSummary, CodeIndex, CoverageSummary, ItemCollection, UnitCoverage};
use crate::transport::OrgClient;

use super::cascade::{run_cascade, CascadeOutcome, QueryStrategy};

const APEX_CLASS_STRATEGIES: &[QueryStrategy] = &[
    QueryStrategy {
        label: "apex class (rich)",
        soql: "SELECT Name, Status, ApiVersion, LengthWithoutComments FROM ApexClass",
        tooling: true,
    },
    QueryStrategy {
        label: "apex class (minimal)",
        soql: "SELECT Name FROM ApexClass",
        tooling: true,
    },
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApexClassRow {
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    api_version: Option<f64>,
    #[serde(default)]
    length_without_comments: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrgWideCoverageRow {
    percent_covered: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CoverageAggregateRow {
    #[serde(default)]
    apex_class_or_trigger: Option<NameRef>,
    num_lines_covered: u32,
    num_lines_uncovered: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NameRef {
    #[serde(default)]
    name: Option<String>,
}

pub async fn fetch_code(client: &OrgClient) -> Result<CodeIndex, TransportError> {
    let (classes, coverage) = tokio::join!(fetch_classes(client), fetch_coverage(client));
    let apex_classes = classes?;
    let mut coverage = coverage?;

    // An org with Apex but an empty coverage aggregate has never run its
    // tests; that is a different statement than measured-zero coverage.
    if coverage.org_wide_percent.is_none()
        && coverage.units.is_empty()
        && coverage.note.is_none()
        && apex_classes.total().unwrap_or(0) > 0
    {
        coverage.note = Some("no coverage data recorded; tests have never run".to_string());
    }

    Ok(CodeIndex {
        apex_classes,
        coverage,
    })
}

async fn fetch_classes(
    client: &OrgClient,
) -> Result<ItemCollection<ApexClassSummary>, TransportError> {
    match run_cascade::<ApexClassRow>(client, "apex classes", APEX_CLASS_STRATEGIES).await? {
        CascadeOutcome::Hit { strategy, records } => {
            debug!("apex classes resolved via '{}'", strategy);
            Ok(ItemCollection::detailed(
                records
                    .into_iter()
                    .map(|r| ApexClassSummary {
                        name: r.name,
                        status: r.status,
                        api_version: r.api_version,
                        length_without_comments: r.length_without_comments,
                    })
                    .collect(),
            ))
        }
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => Ok(ItemCollection::unavailable(note)),
    }
}

async fn fetch_coverage(client: &OrgClient) -> Result<CoverageSummary, TransportError> {
    let (org_wide, per_unit) = tokio::join!(
        client.query_all::<OrgWideCoverageRow>(
            "SELECT PercentCovered FROM ApexOrgWideCoverage",
            true
        ),
        client.query_all::<CoverageAggregateRow>(
            "SELECT ApexClassOrTrigger.Name, NumLinesCovered, NumLinesUncovered \
             FROM ApexCodeCoverageAggregate",
            true
        ),
    );

    let org_wide_percent = match org_wide {
        Ok(rows) => rows.first().map(|r| r.percent_covered),
        Err(e) if e.is_auth() => return Err(e),
        Err(e) => {
            debug!("org-wide coverage unavailable: {}", e);
            None
        }
    };

    let units = match per_unit {
        Ok(rows) => rows
            .into_iter()
            .map(|r| UnitCoverage {
                name: r
                    .apex_class_or_trigger
                    .and_then(|n| n.name)
                    .unwrap_or_else(|| "(unnamed unit)".to_string()),
                covered_lines: r.num_lines_covered,
                uncovered_lines: r.num_lines_uncovered,
            })
            .collect(),
        Err(e) if e.is_auth() => return Err(e),
        Err(e) => {
            debug!("per-unit coverage unavailable: {}", e);
            Vec::new()
        }
    };

    Ok(CoverageSummary {
        org_wide_percent,
        units,
        note: None,
    })
}
