use std::future::Future;

use serde::{Deserialize, Serialize};

use super::client::{GenerateRequest, LlmClient};
use super::parser::parse_trend_response;
use super::prompt::trend_prompt;
use super::OracleError;
use crate::language::Language;
use crate::models::{ConsultationRecord, PatientProfile, RiskLevel, TrendAnalysisResult};

/// A consultation reduced to what the trend oracle sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendEntry {
    pub date: String,
    pub symptoms: String,
    pub risk_level: RiskLevel,
}

impl From<&ConsultationRecord> for TrendEntry {
    fn from(record: &ConsultationRecord) -> Self {
        Self {
            date: record.date.clone(),
            symptoms: record.symptoms.clone(),
            risk_level: record.diagnosis.risk_level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendRequest {
    /// Newest first.
    pub entries: Vec<TrendEntry>,
    pub language: Language,
    pub profile: PatientProfile,
}

/// Longitudinal summary against the oracle. Never fails; see
/// `TrendAnalysisResult::fallback`.
pub trait TrendService: Send + Sync {
    fn summarize(&self, request: &TrendRequest) -> impl Future<Output = TrendAnalysisResult> + Send;
}

pub struct LlmTrendService<C> {
    client: C,
    model: String,
}

impl<C: LlmClient> LlmTrendService<C> {
    pub fn new(client: C, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    async fn try_summarize(&self, request: &TrendRequest) -> Result<TrendAnalysisResult, OracleError> {
        let generate = GenerateRequest {
            model: self.model.clone(),
            system: String::new(),
            prompt: trend_prompt(&request.profile, &request.entries, request.language),
            images: Vec::new(),
            json_output: true,
        };
        let raw = self.client.generate(&generate).await?;
        parse_trend_response(&raw)
    }
}

impl<C: LlmClient> TrendService for LlmTrendService<C> {
    async fn summarize(&self, request: &TrendRequest) -> TrendAnalysisResult {
        match self.try_summarize(request).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, model = %self.model, "Trend analysis failed, using fallback");
                TrendAnalysisResult::fallback()
            }
        }
    }
}
