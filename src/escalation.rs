//! Emergency escalation payloads.
//!
//! The core only assembles what the host needs: a line to speak aloud, a
//! pre-filled message for the emergency contact, and nearby-help searches.
//! Dialing, texting, speaking and map lookups are performed by whoever
//! implements `EmergencyEscalator`.

use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::models::{AnalysisResult, PatientProfile};

/// Characters of the symptom description quoted in the emergency message.
const MESSAGE_SYMPTOM_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechAlert {
    pub text: String,
    /// BCP 47 locale for text-to-speech.
    pub locale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyMessage {
    pub recipient_name: String,
    /// Empty when no profile (and so no contact) is selected.
    pub recipient_number: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpCategory {
    Hospital,
    Pharmacy,
}

impl HelpCategory {
    pub fn query(&self) -> &'static str {
        match self {
            Self::Hospital => "hospital",
            Self::Pharmacy => "pharmacy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyHelpQuery {
    pub category: HelpCategory,
    pub location_hint: Option<String>,
}

/// Everything the host needs to raise the alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPayload {
    pub speech: SpeechAlert,
    pub message: EmergencyMessage,
    pub nearby_help: Vec<NearbyHelpQuery>,
}

impl EscalationPayload {
    pub fn assemble(
        profile: Option<&PatientProfile>,
        result: &AnalysisResult,
        symptoms: &str,
        location_hint: Option<&str>,
        language: Language,
    ) -> Self {
        let location_hint = location_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .map(str::to_string);

        let speech = SpeechAlert {
            text: format!("EMERGENCY. {}", result.explanation.trim()),
            locale: language.speech_locale().to_string(),
        };

        let (name, age) = match profile {
            Some(p) => (p.name.clone(), p.age.to_string()),
            None => ("Patient".to_string(), "?".to_string()),
        };
        let body = format!(
            "EMERGENCY ALERT: {} (Age {}) needs help!\nSymptoms: {}...\nRisk: {}\nLoc: {}",
            name,
            age,
            truncate_chars(symptoms.trim(), MESSAGE_SYMPTOM_CHARS),
            result.risk_level,
            location_hint.as_deref().unwrap_or("Unknown"),
        );
        let message = EmergencyMessage {
            recipient_name: profile
                .map(|p| p.emergency_contact_name.clone())
                .unwrap_or_default(),
            recipient_number: profile
                .map(|p| p.emergency_contact_number.clone())
                .unwrap_or_default(),
            body,
        };

        let nearby_help = [HelpCategory::Hospital, HelpCategory::Pharmacy]
            .into_iter()
            .map(|category| NearbyHelpQuery {
                category,
                location_hint: location_hint.clone(),
            })
            .collect();

        Self {
            speech,
            message,
            nearby_help,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Native side of an emergency: speech, messaging, maps.
pub trait EmergencyEscalator: Send + Sync {
    fn escalate(&self, payload: &EscalationPayload);

    /// Stop anything still in progress (speech in particular).
    fn cancel(&self);
}
