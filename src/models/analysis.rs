use serde::{Deserialize, Serialize};

use super::enums::{RiskLevel, Trend};

/// One oracle verdict for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_emergency: bool,
    pub needs_follow_up: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up_questions: Vec<String>,
    #[serde(default)]
    pub condition_name: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_level_translated: String,
    #[serde(default)]
    pub risk_score: i32,
    pub explanation: String,
    pub first_aid_steps: Vec<String>,
    #[serde(default)]
    pub what_not_to_do: Vec<String>,
    pub care_recommendation: String,
    #[serde(default)]
    pub language: String,
}

impl AnalysisResult {
    /// Safe low-risk verdict returned whenever the oracle cannot answer.
    pub fn fallback(language: &str) -> Self {
        Self {
            is_emergency: false,
            needs_follow_up: false,
            follow_up_questions: Vec::new(),
            condition_name: "Unavailable".to_string(),
            risk_level: RiskLevel::Low,
            risk_level_translated: RiskLevel::Low.label().to_string(),
            risk_score: 0,
            explanation: "Connection error. Please try again.".to_string(),
            first_aid_steps: vec!["Visit a doctor.".to_string()],
            what_not_to_do: Vec::new(),
            care_recommendation: "Consult a doctor.".to_string(),
            language: language.to_string(),
        }
    }

    /// Label for display: the oracle's translation if given, else English.
    pub fn risk_display(&self) -> &str {
        if self.risk_level_translated.trim().is_empty() {
            self.risk_level.label()
        } else {
            &self.risk_level_translated
        }
    }
}

/// Longitudinal summary over a profile's recent consultations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendAnalysisResult {
    pub trend: Trend,
    pub summary: String,
    pub advice: String,
}

impl TrendAnalysisResult {
    pub fn fallback() -> Self {
        Self {
            trend: Trend::Stable,
            summary: "Analysis failed.".to_string(),
            advice: "Consult a doctor.".to_string(),
        }
    }
}
