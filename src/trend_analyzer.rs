//! Longitudinal trend summaries over a profile's recent consultations.
//!
//! Independent of the consultation state machine: it only reads history,
//! asks the trend oracle and keeps the latest answer around for display.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::DEFAULT_ORACLE_TIMEOUT_SECS;
use crate::db::DatabaseError;
use crate::language::Language;
use crate::models::{PatientProfile, TrendAnalysisResult};
use crate::oracle::{TrendEntry, TrendRequest, TrendService};
use crate::store::HistoryStore;

/// Records needed before a trend can be computed.
pub const MIN_TREND_RECORDS: usize = 2;

/// Most recent records handed to the oracle.
pub const MAX_TREND_RECORDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrendOutcome {
    /// Refused locally; no oracle call was made.
    InsufficientHistory { available: usize },
    Summary(TrendAnalysisResult),
}

pub struct TrendAnalyzer<T> {
    service: T,
    history: Arc<dyn HistoryStore>,
    timeout: Duration,
    latest: Mutex<Option<TrendAnalysisResult>>,
}

impl<T: TrendService> TrendAnalyzer<T> {
    pub fn new(service: T, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            service,
            history,
            timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            latest: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn analyze(
        &self,
        profile: &PatientProfile,
        language: Language,
    ) -> Result<TrendOutcome, DatabaseError> {
        let records = self.history.recent(&profile.id, MAX_TREND_RECORDS)?;
        if records.len() < MIN_TREND_RECORDS {
            tracing::info!(
                profile_id = %profile.id,
                available = records.len(),
                "Not enough history for a trend"
            );
            return Ok(TrendOutcome::InsufficientHistory {
                available: records.len(),
            });
        }

        let request = TrendRequest {
            entries: records.iter().map(TrendEntry::from).collect(),
            language,
            profile: profile.clone(),
        };
        let result = match tokio::time::timeout(self.timeout, self.service.summarize(&request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(profile_id = %profile.id, "Trend call timed out, using fallback");
                TrendAnalysisResult::fallback()
            }
        };

        tracing::info!(
            profile_id = %profile.id,
            records = request.entries.len(),
            trend = %result.trend,
            "Trend computed"
        );
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        Ok(TrendOutcome::Summary(result))
    }

    /// Last computed summary, until superseded or cleared.
    pub fn latest(&self) -> Option<TrendAnalysisResult> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, ConsultationRecord, RiskLevel, Trend};
    use crate::store::SqliteStore;

    #[derive(Default)]
    struct RecordingTrend {
        requests: Mutex<Vec<TrendRequest>>,
        hang: bool,
    }

    impl TrendService for RecordingTrend {
        async fn summarize(&self, request: &TrendRequest) -> TrendAnalysisResult {
            self.requests.lock().unwrap().push(request.clone());
            if self.hang {
                std::future::pending::<()>().await;
            }
            TrendAnalysisResult {
                trend: Trend::Improving,
                summary: "Fever resolved.".into(),
                advice: "Keep hydrated.".into(),
            }
        }
    }

    fn append(store: &SqliteStore, profile_id: &str, timestamp: i64, risk: RiskLevel) {
        let mut diagnosis = AnalysisResult::fallback("en");
        diagnosis.risk_level = risk;
        let mut record = ConsultationRecord::new(
            Some(profile_id.to_string()),
            &format!("symptoms at {timestamp}"),
            diagnosis,
            None,
        );
        record.timestamp = timestamp;
        store.append(&record).unwrap();
    }

    fn analyzer(service: RecordingTrend) -> (TrendAnalyzer<RecordingTrend>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        (TrendAnalyzer::new(service, store.clone()), store)
    }

    #[tokio::test]
    async fn refuses_with_fewer_than_two_records() {
        let (analyzer, store) = analyzer(RecordingTrend::default());
        let profile = PatientProfile::demo();

        let outcome = analyzer.analyze(&profile, Language::En).await.unwrap();
        assert_eq!(outcome, TrendOutcome::InsufficientHistory { available: 0 });

        append(&store, &profile.id, 100, RiskLevel::Low);
        let outcome = analyzer.analyze(&profile, Language::En).await.unwrap();
        assert_eq!(outcome, TrendOutcome::InsufficientHistory { available: 1 });

        assert!(analyzer.service.requests.lock().unwrap().is_empty());
        assert!(analyzer.latest().is_none());
    }

    #[tokio::test]
    async fn sends_records_newest_first() {
        let (analyzer, store) = analyzer(RecordingTrend::default());
        let profile = PatientProfile::demo();
        append(&store, &profile.id, 100, RiskLevel::Low);
        append(&store, &profile.id, 200, RiskLevel::High);
        append(&store, &profile.id, 300, RiskLevel::Low);

        let outcome = analyzer.analyze(&profile, Language::En).await.unwrap();
        assert!(matches!(outcome, TrendOutcome::Summary(ref r) if r.trend == Trend::Improving));

        let requests = analyzer.service.requests.lock().unwrap();
        let entries = &requests[0].entries;
        let symptoms: Vec<_> = entries.iter().map(|e| e.symptoms.as_str()).collect();
        assert_eq!(symptoms, vec!["symptoms at 300", "symptoms at 200", "symptoms at 100"]);
        let risks: Vec<_> = entries.iter().map(|e| e.risk_level).collect();
        assert_eq!(risks, vec![RiskLevel::Low, RiskLevel::High, RiskLevel::Low]);
    }

    #[tokio::test]
    async fn caps_at_five_most_recent_of_profile() {
        let (analyzer, store) = analyzer(RecordingTrend::default());
        let profile = PatientProfile::demo();
        for ts in 1..=8 {
            append(&store, &profile.id, ts * 100, RiskLevel::Medium);
        }
        append(&store, "someone_else", 5000, RiskLevel::High);

        analyzer.analyze(&profile, Language::Hi).await.unwrap();

        let requests = analyzer.service.requests.lock().unwrap();
        let symptoms: Vec<_> = requests[0].entries.iter().map(|e| e.symptoms.as_str()).collect();
        assert_eq!(
            symptoms,
            vec!["symptoms at 800", "symptoms at 700", "symptoms at 600", "symptoms at 500", "symptoms at 400"]
        );
        assert_eq!(requests[0].language, Language::Hi);
    }

    #[tokio::test]
    async fn latest_kept_until_cleared() {
        let (analyzer, store) = analyzer(RecordingTrend::default());
        let profile = PatientProfile::demo();
        append(&store, &profile.id, 1, RiskLevel::Low);
        append(&store, &profile.id, 2, RiskLevel::Low);

        analyzer.analyze(&profile, Language::En).await.unwrap();
        assert_eq!(analyzer.latest().unwrap().summary, "Fever resolved.");
        analyzer.clear();
        assert!(analyzer.latest().is_none());
    }

    #[tokio::test]
    async fn timeout_yields_stable_fallback() {
        let service = RecordingTrend {
            hang: true,
            ..Default::default()
        };
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let analyzer = TrendAnalyzer::new(service, store.clone()).with_timeout(Duration::from_millis(50));
        let profile = PatientProfile::demo();
        append(&store, &profile.id, 1, RiskLevel::Low);
        append(&store, &profile.id, 2, RiskLevel::High);

        let outcome = analyzer.analyze(&profile, Language::En).await.unwrap();
        assert_eq!(outcome, TrendOutcome::Summary(TrendAnalysisResult::fallback()));
    }
}
