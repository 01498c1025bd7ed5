// src/model/mod.rs

pub mod collection;
pub mod finding;
pub mod health;
pub mod snapshot;

pub use collection::ItemCollection;
pub use finding::{Finding, Severity};
pub use health::{HealthCategory, HealthComputation, Kpi, KpiStatus, Methodology};
pub use snapshot::{
    ApexClassSummary, ApprovalProcessSummary, AutomationIndex, CodeIndex, ConnectedAppSummary,
    CoverageSummary, DashboardSummary, EmailTemplateSummary, ExternalDataSourceSummary,
    FieldDescriptor, FlowSummary, IntegrationIndex, InventorySnapshot, NamedCredentialSummary,
    ObjectDescriptor, OrgProfile, OwnershipIndex, PackageInfo, ProfileSummary,
    RelationshipDescriptor, ReportSummary, ReportingIndex, ScanSummary, SecurityIndex,
    SeverityTally, TriggerSummary, UnitCoverage, ValidationRuleSummary, WorkflowRuleSummary,
    PermissionSetSummary, RemoteSiteSummary,
};
