// tests/scan_pipeline.rs
// Full-pipeline tests against an in-process mock org. The mock answers
// by first-matching rule on "path + decoded SOQL"; unmatched queries
// answer empty, unmatched paths 404.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use orgscan::model::ItemCollection;
use orgscan::{run_scan, Credentials, ScanError, Severity};

struct Rule {
    matcher: &'static str,
    status: u16,
    body: Value,
}

fn rule(matcher: &'static str, status: u16, body: Value) -> Rule {
    Rule {
        matcher,
        status,
        body,
    }
}

#[derive(Clone)]
struct MockOrg {
    rules: Arc<Vec<Rule>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockOrg {
    async fn hits(&self) -> Vec<String> {
        self.hits.lock().await.clone()
    }
}

fn rows(records: Value) -> Value {
    let count = records.as_array().map_or(0, |a| a.len());
    json!({"totalSize": count, "done": true, "records": records})
}

fn count_result(n: u32) -> Value {
    json!({"totalSize": n, "done": true, "records": []})
}

fn empty_query() -> Value {
    count_result(0)
}

fn auth_error_body() -> Value {
    json!([{"message": "Session expired or invalid", "errorCode": "INVALID_SESSION_ID"}])
}

async fn handler(State(org): State<MockOrg>, uri: Uri) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    let soql = uri
        .query()
        .unwrap_or("")
        .split('&')
        .find_map(|kv| kv.strip_prefix("q="))
        .map(|v| {
            urlencoding::decode(v)
                .map(|c| c.into_owned())
                .unwrap_or_default()
        })
        .unwrap_or_default();
    let key = format!("{} {}", path, soql);
    org.hits.lock().await.push(key.clone());

    for rule in org.rules.iter() {
        if key.contains(rule.matcher) {
            let status = StatusCode::from_u16(rule.status).unwrap_or(StatusCode::OK);
            return (status, Json(rule.body.clone()));
        }
    }

    if path.ends_with("/query") {
        return (StatusCode::OK, Json(empty_query()));
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!([{"message": "The requested resource does not exist"}])),
    )
}

async fn spawn_mock(rules: Vec<Rule>) -> (MockOrg, Credentials) {
    let org = MockOrg {
        rules: Arc::new(rules),
        hits: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new().fallback(handler).with_state(org.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let credentials = Credentials {
        instance_url: format!("http://{addr}"),
        access_token: "00Dtest!token".to_string(),
        api_version: "59.0".to_string(),
    };
    (org, credentials)
}

fn organization_rule() -> Rule {
    rule(
        "FROM Organization",
        200,
        rows(json!([{
            "Id": "00D000000000001EAA",
            "Name": "Acme Corp",
            "OrganizationType": "Enterprise Edition",
            "IsSandbox": false,
            "InstanceName": "EU45"
        }])),
    )
}

fn happy_org_rules() -> Vec<Rule> {
    vec![
        organization_rule(),
        // Paths (most specific first).
        rule(
            "/limits/recordCount",
            200,
            json!({"sObjects": [
                {"name": "Invoice__c", "count": 250_000},
                {"name": "Account", "count": 10}
            ]}),
        ),
        rule(
            "/sobjects/Invoice__c/describe",
            200,
            json!({
                "name": "Invoice__c",
                "fields": [
                    {"name": "Name", "label": "Invoice Number", "type": "string",
                     "nillable": false, "autoNumber": true},
                    {"name": "Account__c", "label": "Account", "type": "reference",
                     "nillable": false, "referenceTo": ["Account"],
                     "cascadeDelete": true, "relationshipOrder": 0},
                    {"name": "Status__c", "label": "Status", "type": "picklist",
                     "nillable": true},
                    {"name": "Amount__c", "label": "Amount", "type": "currency",
                     "nillable": false}
                ],
                "recordTypeInfos": [{"name": "Master"}]
            }),
        ),
        rule(
            "v59.0/sobjects ",
            200,
            json!({"sobjects": [
                {"name": "Invoice__c", "label": "Invoice", "custom": true, "queryable": true},
                {"name": "Account", "label": "Account", "custom": false, "queryable": true},
                {"name": "Invoice__Share", "label": "Invoice Share", "custom": true, "queryable": true}
            ]}),
        ),
        rule(
            "v59.0/limits ",
            200,
            json!({
                "DailyApiRequests": {"Max": 100_000, "Remaining": 40_000},
                "DataStorageMB": {"Max": 1000, "Remaining": 900},
                "FileStorageMB": {"Max": 1000, "Remaining": 500}
            }),
        ),
        // Automation.
        rule(
            "TriggerObjectOrEventLabel, IsActive FROM FlowDefinitionView",
            200,
            rows(json!([{
                "ApiName": "Invoice_After_Save",
                "Label": "Invoice After Save",
                "ProcessType": "RecordTriggeredFlow",
                "TriggerType": "RecordAfterSave",
                "TriggerObjectOrEventLabel": "Invoice__c",
                "IsActive": true
            }])),
        ),
        rule(
            "LengthWithoutComments FROM ApexTrigger",
            200,
            rows(json!([{
                "Name": "InvoiceTrigger",
                "TableEnumOrId": "Invoice__c",
                "Status": "Active",
                "LengthWithoutComments": 1200
            }])),
        ),
        rule(
            "COUNT() FROM ValidationRule WHERE Active = true",
            200,
            count_result(22),
        ),
        rule("COUNT() FROM ValidationRule", 200, count_result(40)),
        // Code.
        rule(
            "LengthWithoutComments FROM ApexClass",
            200,
            rows(json!([
                {"Name": "InvoiceService", "Status": "Active", "ApiVersion": 59.0,
                 "LengthWithoutComments": 4200},
                {"Name": "PaymentService", "Status": "Active", "ApiVersion": 59.0,
                 "LengthWithoutComments": 1800}
            ])),
        ),
        rule(
            "FROM ApexOrgWideCoverage",
            200,
            rows(json!([{"PercentCovered": 42.0}])),
        ),
        rule(
            "FROM ApexCodeCoverageAggregate",
            200,
            rows(json!([
                {"ApexClassOrTrigger": {"Name": "InvoiceService"},
                 "NumLinesCovered": 42, "NumLinesUncovered": 58},
                {"ApexClassOrTrigger": {"Name": "PaymentService"},
                 "NumLinesCovered": 80, "NumLinesUncovered": 20}
            ])),
        ),
        // Packages / security.
        rule(
            "FROM InstalledSubscriberPackage",
            200,
            rows(json!([{
                "SubscriberPackage": {"Name": "Marketing Connect", "NamespacePrefix": "mktc"},
                "SubscriberPackageVersion": {"Name": "1.97"}
            }])),
        ),
        rule(
            "UserType FROM Profile",
            200,
            rows(json!([
                {"Name": "System Administrator", "UserType": "Standard"},
                {"Name": "Standard User", "UserType": "Standard"}
            ])),
        ),
    ]
}

#[tokio::test]
async fn happy_path_scan_assembles_snapshot_findings_and_health() {
    let (org, credentials) = spawn_mock(happy_org_rules()).await;

    let snapshot = run_scan(&credentials).await.expect("scan succeeds");

    assert_eq!(snapshot.org.name, "Acme Corp");
    assert_eq!(snapshot.org.api_version, "59.0");

    // Invoice__c and populated Account survive; the __Share companion
    // does not.
    assert_eq!(snapshot.summary.objects, 2);
    assert!(snapshot.objects.iter().all(|o| o.api_name != "Invoice__Share"));
    let invoice = snapshot
        .objects
        .iter()
        .find(|o| o.api_name == "Invoice__c")
        .expect("invoice object");
    assert_eq!(invoice.record_count, Some(250_000));
    assert_eq!(invoice.autonumber_fields, vec!["Name"]);
    assert_eq!(invoice.master_detail_relationships.len(), 1);
    assert_eq!(snapshot.summary.records_approx, 250_010);

    // Validation rules came back count-only: aggregates without detail.
    match &snapshot.automation.validation_rules {
        ItemCollection::CountOnly { total, active, available, .. } => {
            assert_eq!(*total, Some(40));
            assert_eq!(*active, Some(22));
            assert!(*available);
        }
        other => panic!("expected count-only validation rules, got {other:?}"),
    }
    assert_eq!(snapshot.summary.validation_rules, Some(40));

    let find = |id: &str| snapshot.findings.iter().find(|f| f.id == id);
    assert_eq!(find("LARGE_OBJECT_Invoice__c").unwrap().severity, Severity::Medium);
    assert_eq!(find("TRIGGER_BLOCKER_Invoice__c").unwrap().severity, Severity::High);
    assert_eq!(find("LOW_ORG_COVERAGE").unwrap().severity, Severity::High);
    assert!(find("RECORD_FLOWS_Invoice__c").is_some());
    assert!(find("AUTONUMBER_Invoice__c").is_some());
    assert!(find("MASTER_DETAIL_Invoice__c").is_some());

    let tally = &snapshot.summary.findings_by_severity;
    assert_eq!(
        tally.high + tally.medium + tally.low,
        snapshot.findings.len() as u32
    );

    // Health computed, with the limits category scored from /limits.
    let health = snapshot.health.as_ref().expect("health section");
    assert!(health.overall_score.is_some());
    let limits = health
        .categories
        .iter()
        .find(|c| c.key == "limits")
        .unwrap();
    assert!(limits.score.is_some());

    // Cascade short-circuit: the rich trigger strategy answered, so the
    // minimal variant must never have been issued.
    let hits = org.hits().await;
    assert!(hits.iter().any(|h| h.contains("LengthWithoutComments FROM ApexTrigger")));
    assert!(!hits.iter().any(|h| h.contains("SELECT Name, Status FROM ApexTrigger")));

    // Same snapshot, same structural hash.
    assert_eq!(snapshot.structural_hash(), snapshot.structural_hash());
}

#[tokio::test]
async fn profile_auth_failure_aborts_before_fanout() {
    let (org, credentials) = spawn_mock(vec![rule("FROM Organization", 401, auth_error_body())]).await;

    let err = run_scan(&credentials).await.expect_err("scan must fail");
    assert!(matches!(err, ScanError::AuthenticationExpired { .. }));
    assert!(!err.trace_id().is_empty());

    // Nothing beyond the profile query was issued.
    let hits = org.hits().await;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].contains("FROM Organization"));
}

#[tokio::test]
async fn late_auth_failure_discards_partial_results() {
    // REST answers normally; every Tooling query rejects the token.
    let mut rules = vec![organization_rule()];
    rules.push(rule("/tooling/query", 401, auth_error_body()));
    rules.push(rule(
        "v59.0/sobjects ",
        200,
        json!({"sobjects": [
            {"name": "Account", "label": "Account", "custom": false, "queryable": true}
        ]}),
    ));
    let (_org, credentials) = spawn_mock(rules).await;

    let err = run_scan(&credentials).await.expect_err("scan must fail");
    assert!(matches!(err, ScanError::AuthenticationExpired { .. }));
}

#[tokio::test]
async fn non_auth_failures_degrade_to_documented_defaults() {
    let rules = vec![
        organization_rule(),
        // Global describe down: the whole objects category degrades.
        rule("v59.0/sobjects ", 500, json!([{"message": "server error"}])),
        // Profile queries down on both shapes: category unavailable,
        // with a note, not empty-success.
        rule("FROM Profile", 500, json!([{"message": "server error"}])),
    ];
    let (_org, credentials) = spawn_mock(rules).await;

    let snapshot = run_scan(&credentials).await.expect("scan still succeeds");

    assert!(snapshot.objects.is_empty());
    assert!(snapshot.degraded.iter().any(|n| n.contains("objects")));

    let profiles = &snapshot.security.profiles;
    assert!(!profiles.is_available());
    let note = profiles.note().expect("unavailable category carries a note");
    assert!(!note.is_empty());

    // Everything else still stands; no fatal error escaped.
    assert_eq!(snapshot.org.name, "Acme Corp");
}

#[tokio::test]
async fn paginated_queries_follow_the_cursor() {
    let rules = vec![
        organization_rule(),
        rule(
            "FROM Report",
            200,
            json!({
                "totalSize": 3,
                "done": false,
                "nextRecordsUrl": "/services/data/v59.0/query/01gRT0000000001-2000",
                "records": [
                    {"Name": "Pipeline", "Format": "Matrix"},
                    {"Name": "Forecast", "Format": "Summary"}
                ]
            }),
        ),
        rule(
            "query/01gRT0000000001-2000",
            200,
            rows(json!([{"Name": "Won Deals", "Format": "Tabular"}])),
        ),
    ];
    let (_org, credentials) = spawn_mock(rules).await;

    let snapshot = run_scan(&credentials).await.expect("scan succeeds");
    let reports = snapshot
        .reporting
        .reports
        .items()
        .expect("detailed reports");
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().any(|r| r.name == "Won Deals"));
}
