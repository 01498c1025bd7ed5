// src/main.rs

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use orgscan::config::CONFIG;
use orgscan::model::Severity;
use orgscan::{run_scan, Credentials, ScanError};

#[derive(Parser)]
#[command(name = "orgscan", about = "Migration-readiness scanner for CRM orgs")]
struct Args {
    /// Org instance URL, e.g. https://example.my.salesforce.com
    #[arg(long, env = "ORGSCAN_INSTANCE_URL")]
    instance_url: String,

    /// REST API access token for the org
    #[arg(long, env = "ORGSCAN_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// API version to scan against
    #[arg(long, env = "ORGSCAN_API_VERSION", default_value = "59.0")]
    api_version: String,

    /// Print the full snapshot as JSON instead of the summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = CONFIG.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("orgscan starting against {}", args.instance_url);

    let credentials = Credentials {
        instance_url: args.instance_url,
        access_token: args.access_token,
        api_version: args.api_version,
    };

    let snapshot = match run_scan(&credentials).await {
        Ok(snapshot) => snapshot,
        Err(ScanError::AuthenticationExpired { trace_id }) => {
            error!("credentials rejected by the org; re-authenticate and retry (trace {trace_id})");
            std::process::exit(1);
        }
        Err(ScanError::ScanFailed { trace_id, message }) => {
            error!("scan failed: {message} (trace {trace_id})");
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let summary = &snapshot.summary;
    println!("Org: {} ({})", snapshot.org.name, snapshot.org.id);
    println!(
        "Inventory: {} objects, ~{} records, {} flows, {} triggers, {} validation rules",
        summary.objects,
        summary.records_approx,
        summary.flows.map_or_else(|| "?".into(), |n| n.to_string()),
        summary.triggers.map_or_else(|| "?".into(), |n| n.to_string()),
        summary
            .validation_rules
            .map_or_else(|| "?".into(), |n| n.to_string()),
    );
    println!(
        "Findings: {} high / {} medium / {} low",
        summary.findings_by_severity.high,
        summary.findings_by_severity.medium,
        summary.findings_by_severity.low,
    );

    if let Some(health) = &snapshot.health {
        match health.overall_score {
            Some(score) => println!("Readiness score: {score}/100"),
            None => println!("Readiness score: not computable"),
        }
        for category in &health.categories {
            let score = category
                .score
                .map_or_else(|| "n/a".to_string(), |s| format!("{s}/100"));
            println!("  {:<16} {}", category.label, score);
        }
    }

    if !snapshot.degraded.is_empty() {
        println!("Degraded categories:");
        for note in &snapshot.degraded {
            println!("  - {note}");
        }
    }

    let blockers: Vec<_> = snapshot
        .findings
        .iter()
        .filter(|f| f.severity == Severity::High)
        .collect();
    if !blockers.is_empty() {
        println!("Migration blockers:");
        for finding in blockers {
            println!("  [{}] {}", finding.severity.label(), finding.title);
        }
    }

    println!("Snapshot hash: {}", snapshot.structural_hash());
    Ok(())
}
