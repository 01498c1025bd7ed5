//! Reporting-asset fetcher: reports, dashboards, email templates.
//! Detail lists here can be large; when detail is out of reach the
//! category falls back to a plain total.

use serde::Deserialize;
use tracing::debug;

use crate::error::TransportError;
use crate::model::{
    DashboardSummary, EmailTemplateSummary, ItemCollection, ReportSummary, ReportingIndex,
};
use crate::transport::OrgClient;

use super::cascade::{run_cascade, CascadeOutcome, QueryStrategy};

const REPORT_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "report listing",
    soql: "SELECT Name, Format FROM Report",
    tooling: false,
}];

const DASHBOARD_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "dashboard listing",
    soql: "SELECT Title FROM Dashboard",
    tooling: false,
}];

const EMAIL_TEMPLATE_STRATEGIES: &[QueryStrategy] = &[QueryStrategy {
    label: "email template listing",
    soql: "SELECT Name, IsActive FROM EmailTemplate",
    tooling: false,
}];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReportRow {
    name: String,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DashboardRow {
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EmailTemplateRow {
    name: String,
    #[serde(default)]
    is_active: bool,
}

pub async fn fetch_reporting(client: &OrgClient) -> Result<ReportingIndex, TransportError> {
    let (reports, dashboards, email_templates) = tokio::join!(
        fetch_reports(client),
        fetch_dashboards(client),
        fetch_email_templates(client),
    );

    Ok(ReportingIndex {
        reports: reports?,
        dashboards: dashboards?,
        email_templates: email_templates?,
    })
}

async fn fetch_reports(
    client: &OrgClient,
) -> Result<ItemCollection<ReportSummary>, TransportError> {
    match run_cascade::<ReportRow>(client, "reports", REPORT_STRATEGIES).await? {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| ReportSummary {
                    name: r.name,
                    format: r.format,
                })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => fallback_total(
            client,
            "reports",
            "SELECT COUNT() FROM Report",
            false,
            note,
        )
        .await,
    }
}

async fn fetch_dashboards(
    client: &OrgClient,
) -> Result<ItemCollection<DashboardSummary>, TransportError> {
    match run_cascade::<DashboardRow>(client, "dashboards", DASHBOARD_STRATEGIES).await? {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| DashboardSummary { title: r.title })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => fallback_total(
            client,
            "dashboards",
            "SELECT COUNT() FROM Dashboard",
            false,
            note,
        )
        .await,
    }
}

async fn fetch_email_templates(
    client: &OrgClient,
) -> Result<ItemCollection<EmailTemplateSummary>, TransportError> {
    match run_cascade::<EmailTemplateRow>(client, "email templates", EMAIL_TEMPLATE_STRATEGIES)
        .await?
    {
        CascadeOutcome::Hit { records, .. } => Ok(ItemCollection::detailed(
            records
                .into_iter()
                .map(|r| EmailTemplateSummary {
                    name: r.name,
                    active: r.is_active,
                })
                .collect(),
        )),
        CascadeOutcome::Empty => Ok(ItemCollection::empty()),
        CascadeOutcome::Unavailable { note } => fallback_total(
            client,
            "email templates",
            "SELECT COUNT() FROM EmailTemplate",
            false,
            note,
        )
        .await,
    }
}

/// When the detail listing is out of reach, a bare total is still worth
/// surfacing; only if the count fails too is the category unavailable.
async fn fallback_total<T>(
    client: &OrgClient,
    what: &str,
    count_soql: &str,
    tooling: bool,
    note: String,
) -> Result<ItemCollection<T>, TransportError> {
    match client.count(count_soql, tooling).await {
        Ok(total) => {
            debug!("{}: detail unavailable, exposing count {}", what, total);
            Ok(ItemCollection::count_only_with_note(
                Some(total),
                None,
                note,
            ))
        }
        Err(e) if e.is_auth() => Err(e),
        Err(e) => {
            debug!("{}: count fallback failed: {}", what, e);
            Ok(ItemCollection::unavailable(note))
        }
    }
}
