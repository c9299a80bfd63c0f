use crate::language::Language;
use crate::models::{PatientProfile, UNKNOWN_PROFILE_SUMMARY};

use super::trend::TrendEntry;

/// System instruction for a triage turn. The bounds listed here are advice
/// to the model; responses are not truncated to them.
pub fn triage_system_prompt(language: Language) -> String {
    let lang = language.name();
    format!(
        r#"Role: rural triage assistant. Goal: fast, safe triage.

INSTRUCTIONS:
1. Read the input (text and any photo) together with the history.
2. Reason privately in English and check for emergencies first.
3. Write every user-facing string in {lang} only.

CONSTRAINTS:
- At most 5 first aid steps.
- At most 3 'what not to do' points.
- At most 2 follow-up questions, and only when critical information is missing.
- Explanation under 30 words.
- Set isEmergency=true and riskLevel=EMERGENCY for chest pain, stroke signs, heavy bleeding, unconsciousness or anything equally severe.

OUTPUT: one JSON object and nothing else, with these keys:
isEmergency (bool), needsFollowUp (bool), followUpQuestions (string[]),
conditionName (string), riskLevel ("LOW"|"MEDIUM"|"HIGH"|"EMERGENCY"),
riskLevelTranslated (string), riskScore (integer 0-100), explanation (string),
firstAidSteps (string[]), whatNotToDo (string[]), careRecommendation (string)."#
    )
}

/// Per-turn prompt: who the patient is, what was said so far, the new input.
pub fn triage_user_prompt(
    profile: Option<&PatientProfile>,
    context: &str,
    symptoms: &str,
) -> String {
    let profile_line = profile
        .map(PatientProfile::prompt_summary)
        .unwrap_or_else(|| UNKNOWN_PROFILE_SUMMARY.to_string());
    format!("{profile_line}\nHistory: {context}\nInput: {symptoms}")
}

/// Prompt asking whether the recent history is improving, worsening or stable.
pub fn trend_prompt(
    profile: &PatientProfile,
    entries: &[TrendEntry],
    language: Language,
) -> String {
    let history = entries
        .iter()
        .map(|e| format!("{}: {} (Risk: {})", e.date, e.symptoms, e.risk_level))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze the health trend for {} ({}).\nHistory (newest first):\n{}\n\n\
         Task: is the condition IMPROVING, WORSENING or STABLE?\n\
         Output one concise JSON object in {} with keys \
         trend (\"IMPROVING\"|\"WORSENING\"|\"STABLE\"), summary (string), advice (string).",
        profile.name,
        profile.age,
        history,
        language.name()
    )
}
