use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analysis::AnalysisResult;

/// One finalized consultation, the unit of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRecord {
    pub id: String,
    pub profile_id: Option<String>,
    pub date: String,
    /// Milliseconds since the Unix epoch; history is ordered by this.
    pub timestamp: i64,
    pub symptoms: String,
    pub diagnosis: AnalysisResult,
    pub image_preview: Option<String>,
}

impl ConsultationRecord {
    /// Stamp a new record with the current time.
    pub fn new(
        profile_id: Option<String>,
        symptoms: &str,
        diagnosis: AnalysisResult,
        image_preview: Option<String>,
    ) -> Self {
        Self::at(Utc::now(), profile_id, symptoms, diagnosis, image_preview)
    }

    pub fn at(
        now: DateTime<Utc>,
        profile_id: Option<String>,
        symptoms: &str,
        diagnosis: AnalysisResult,
        image_preview: Option<String>,
    ) -> Self {
        Self {
            // v7 UUIDs carry the creation time in their leading bits.
            id: Uuid::now_v7().to_string(),
            profile_id,
            date: now.with_timezone(&Local).format("%Y-%m-%d").to_string(),
            timestamp: now.timestamp_millis(),
            symptoms: symptoms.to_string(),
            diagnosis,
            image_preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_uses_given_instant() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let record = ConsultationRecord::at(
            now,
            Some("demo_1".into()),
            "High fever (102F), headache.",
            AnalysisResult::fallback("en"),
            None,
        );
        assert_eq!(record.timestamp, 1_700_000_000_000);
        assert_eq!(record.date.len(), 10);
        assert_eq!(record.symptoms, "High fever (102F), headache.");
    }

    #[test]
    fn record_ids_are_unique() {
        let a = ConsultationRecord::new(None, "a", AnalysisResult::fallback("en"), None);
        let b = ConsultationRecord::new(None, "b", AnalysisResult::fallback("en"), None);
        assert_ne!(a.id, b.id);
    }
}
