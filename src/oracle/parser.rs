use serde_json::Value;

use super::OracleError;
use crate::language::Language;
use crate::models::{AnalysisResult, RiskLevel, TrendAnalysisResult};

const ANALYSIS_REQUIRED: &[&str] = &[
    "isEmergency",
    "needsFollowUp",
    "riskLevel",
    "explanation",
    "firstAidSteps",
    "careRecommendation",
];

const ANALYSIS_OPTIONAL: &[&str] = &[
    "followUpQuestions",
    "conditionName",
    "riskLevelTranslated",
    "riskScore",
    "whatNotToDo",
    "language",
];

const TREND_REQUIRED: &[&str] = &["trend", "summary", "advice"];

/// Parse a triage verdict and enforce the result invariants:
/// an emergency always carries `EMERGENCY` risk, and follow-up questions
/// only survive when a follow-up is actually requested.
pub fn parse_analysis_response(
    raw: &str,
    language: Language,
) -> Result<AnalysisResult, OracleError> {
    let mut value = parse_object(raw)?;
    require_fields(&value, ANALYSIS_REQUIRED)?;
    drop_null_fields(&mut value, ANALYSIS_OPTIONAL);
    normalize_risk_score(&mut value);
    upper_case_field(&mut value, "riskLevel");

    let mut result: AnalysisResult = serde_json::from_value(value)
        .map_err(|e| OracleError::JsonParsing(e.to_string()))?;

    if result.is_emergency {
        result.risk_level = RiskLevel::Emergency;
        result.needs_follow_up = false;
    }
    if result.needs_follow_up && result.follow_up_questions.iter().all(|q| q.trim().is_empty()) {
        tracing::debug!("Follow-up requested without questions; treating verdict as final");
        result.needs_follow_up = false;
    }
    if !result.needs_follow_up {
        result.follow_up_questions.clear();
    }
    result.language = language.code().to_string();
    Ok(result)
}

pub fn parse_trend_response(raw: &str) -> Result<TrendAnalysisResult, OracleError> {
    let mut value = parse_object(raw)?;
    require_fields(&value, TREND_REQUIRED)?;
    upper_case_field(&mut value, "trend");
    serde_json::from_value(value).map_err(|e| OracleError::JsonParsing(e.to_string()))
}

fn parse_object(raw: &str) -> Result<Value, OracleError> {
    let json_str = extract_json(raw)?;
    let value: Value =
        serde_json::from_str(json_str).map_err(|e| OracleError::JsonParsing(e.to_string()))?;
    if !value.is_object() {
        return Err(OracleError::MalformedResponse("Expected a JSON object".into()));
    }
    Ok(value)
}

/// Locate the JSON document: a ```json fenced block if present, otherwise
/// the span from the first `{` to the last `}`.
fn extract_json(response: &str) -> Result<&str, OracleError> {
    if let Some(fence) = response.find("```json") {
        let start = fence + 7;
        let end = response[start..]
            .find("```")
            .ok_or_else(|| OracleError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(response[start..start + end].trim());
    }

    let start = response
        .find('{')
        .ok_or_else(|| OracleError::MalformedResponse("No JSON object found".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| OracleError::MalformedResponse("Unterminated JSON object".into()))?;
    Ok(&response[start..=end])
}

fn require_fields(value: &Value, fields: &[&'static str]) -> Result<(), OracleError> {
    for field in fields {
        match value.get(*field) {
            None | Some(Value::Null) => return Err(OracleError::MissingField(*field)),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Models often write `null` for optional fields they have nothing for.
fn drop_null_fields(value: &mut Value, fields: &[&str]) {
    if let Value::Object(map) = value {
        for field in fields {
            if map.get(*field).is_some_and(Value::is_null) {
                map.remove(*field);
            }
        }
    }
}

/// Accept `92.5` or `"92"` for the integer score; drop anything unreadable.
fn normalize_risk_score(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };
    let Some(raw) = map.get("riskScore") else {
        return;
    };
    let score = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite());

    match score {
        Some(f) => {
            let clamped = f.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32;
            map.insert("riskScore".to_string(), Value::from(clamped));
        }
        None => {
            tracing::debug!(raw = %raw, "Unreadable riskScore dropped");
            map.remove("riskScore");
        }
    }
}

fn upper_case_field(value: &mut Value, field: &str) {
    if let Some(Value::String(s)) = value.get_mut(field) {
        *s = s.trim().to_ascii_uppercase();
    }
}
