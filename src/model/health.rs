// src/model/health.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Classification of one KPI against its fixed threshold table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KpiStatus {
    Healthy,
    Monitor,
    Risk,
    /// Input data was missing; excluded from scoring entirely.
    #[serde(rename = "NA")]
    NotApplicable,
}

impl KpiStatus {
    /// Points contributed toward the category score. NA never reaches
    /// this — NA KPIs are dropped from both numerator and denominator.
    pub fn points(&self) -> u32 {
        match self {
            KpiStatus::Healthy => 2,
            KpiStatus::Monitor => 1,
            KpiStatus::Risk | KpiStatus::NotApplicable => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub key: String,
    pub label: String,
    /// Display value of the measured metric.
    pub value: String,
    pub status: KpiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCategory {
    pub key: String,
    pub label: String,
    pub weight: u32,
    /// `None` iff every KPI in the category is NA.
    pub score: Option<u8>,
    pub kpis: Vec<Kpi>,
}

/// Record of how the numbers were produced, attached to every
/// computation so the score is explainable after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Methodology {
    pub weights: BTreeMap<String, u32>,
    pub status_points: BTreeMap<String, u32>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComputation {
    /// Weighted average over scored categories; `None` if none scored.
    pub overall_score: Option<u8>,
    pub categories: Vec<HealthCategory>,
    pub methodology: Methodology,
}
