use std::future::Future;

use super::client::{GenerateRequest, LlmClient};
use super::parser::parse_analysis_response;
use super::prompt::{triage_system_prompt, triage_user_prompt};
use super::OracleError;
use crate::language::Language;
use crate::models::{AnalysisResult, ImageAttachment, PatientProfile};

/// Everything the oracle needs for one turn.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub symptoms: String,
    pub image: Option<ImageAttachment>,
    pub language: Language,
    /// Accumulated conversation transcript, passed through verbatim.
    pub context: String,
    pub profile: Option<PatientProfile>,
}

/// One triage turn against the oracle.
///
/// Implementations must always produce a structurally valid result; any
/// failure is turned into `AnalysisResult::fallback`.
pub trait AnalysisService: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> impl Future<Output = AnalysisResult> + Send;
}

/// `AnalysisService` backed by an LLM that answers in JSON.
pub struct LlmAnalysisService<C> {
    client: C,
    model: String,
}

impl<C: LlmClient> LlmAnalysisService<C> {
    pub fn new(client: C, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn try_analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, OracleError> {
        let generate = GenerateRequest {
            model: self.model.clone(),
            system: triage_system_prompt(request.language),
            prompt: triage_user_prompt(request.profile.as_ref(), &request.context, &request.symptoms),
            images: request.image.iter().map(ImageAttachment::to_base64).collect(),
            json_output: true,
        };
        let raw = self.client.generate(&generate).await?;
        parse_analysis_response(&raw, request.language)
    }
}

impl<C: LlmClient> AnalysisService for LlmAnalysisService<C> {
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        match self.try_analyze(request).await {
            Ok(result) => {
                tracing::debug!(
                    risk = %result.risk_level,
                    emergency = result.is_emergency,
                    follow_up = result.needs_follow_up,
                    "Oracle verdict received"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, model = %self.model, "Analysis failed, using fallback verdict");
                AnalysisResult::fallback(request.language.code())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use crate::oracle::client::MockLlmClient;

    fn request(symptoms: &str) -> AnalysisRequest {
        AnalysisRequest {
            symptoms: symptoms.to_string(),
            image: None,
            language: Language::Hi,
            context: "New Consultation.".to_string(),
            profile: Some(PatientProfile::demo()),
        }
    }

    const FINAL_VERDICT: &str = r#"{"isEmergency": false, "needsFollowUp": false,
        "conditionName": "Fever", "riskLevel": "MEDIUM", "riskScore": 35,
        "explanation": "Probably viral.", "firstAidSteps": ["Rest", "Fluids"],
        "whatNotToDo": [], "careRecommendation": "See a doctor in 2 days."}"#;

    #[tokio::test]
    async fn successful_verdict_passes_through() {
        let service = LlmAnalysisService::new(MockLlmClient::new(FINAL_VERDICT), "medgemma:4b");
        let result = service.analyze(&request("fever")).await;
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.condition_name, "Fever");
        assert_eq!(result.language, "hi");
    }

    #[tokio::test]
    async fn prompt_carries_profile_context_and_input() {
        let client = MockLlmClient::new(FINAL_VERDICT);
        let service = LlmAnalysisService::new(client, "medgemma:4b");
        service.analyze(&request("fever since yesterday")).await;

        let sent = service.client.last_request().unwrap();
        assert_eq!(sent.model, "medgemma:4b");
        assert!(sent.json_output);
        assert!(sent.system.contains("Hindi"));
        assert!(sent.prompt.contains("Patient: Demo Patient"));
        assert!(sent.prompt.contains("History: New Consultation."));
        assert!(sent.prompt.ends_with("Input: fever since yesterday"));
        assert!(sent.images.is_empty());
    }

    #[tokio::test]
    async fn image_is_sent_base64() {
        let service = LlmAnalysisService::new(MockLlmClient::new(FINAL_VERDICT), "m");
        let mut req = request("");
        req.image = Some(ImageAttachment::jpeg(b"abc".to_vec()).unwrap());
        service.analyze(&req).await;
        assert_eq!(service.client.last_request().unwrap().images, vec!["YWJj".to_string()]);
    }

    #[tokio::test]
    async fn transport_failure_yields_fallback() {
        let service = LlmAnalysisService::new(MockLlmClient::unreachable("http://x"), "m");
        let result = service.analyze(&request("fever")).await;
        assert_eq!(result, AnalysisResult::fallback("hi"));
    }

    #[tokio::test]
    async fn malformed_payload_yields_fallback() {
        let service = LlmAnalysisService::new(MockLlmClient::new("I am not JSON"), "m");
        let result = service.analyze(&request("fever")).await;
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.needs_follow_up);
        assert!(!result.is_emergency);
    }

    #[tokio::test]
    async fn missing_required_field_yields_fallback() {
        let service = LlmAnalysisService::new(
            MockLlmClient::new(r#"{"isEmergency": true, "riskLevel": "EMERGENCY"}"#),
            "m",
        );
        let result = service.analyze(&request("chest pain")).await;
        assert_eq!(result, AnalysisResult::fallback("hi"));
    }
}
