//! Keyed persistence for profiles and consultation history.
//!
//! The orchestrator and trend analyzer only see the two traits. `SqliteStore`
//! backs both with one connection; tests substitute failing or in-memory
//! implementations. Every write error is returned to the caller.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::models::{ConsultationRecord, NewProfile, PatientProfile};

const ACTIVE_PROFILE_KEY: &str = "active_profile_id";

/// Append-only consultation history, ordered newest-first.
pub trait HistoryStore: Send + Sync {
    fn append(&self, record: &ConsultationRecord) -> Result<(), DatabaseError>;

    /// All records, or only those of `profile_id`, newest-first by timestamp.
    fn list(&self, profile_id: Option<&str>) -> Result<Vec<ConsultationRecord>, DatabaseError>;

    /// The `limit` most recent records of one profile, newest-first.
    fn recent(&self, profile_id: &str, limit: usize) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let mut records = self.list(Some(profile_id))?;
        records.truncate(limit);
        Ok(records)
    }
}

/// Patient profiles plus the currently selected one.
pub trait ProfileStore: Send + Sync {
    /// Validate, persist and activate a new profile.
    fn create(&self, profile: NewProfile) -> Result<PatientProfile, DatabaseError>;

    fn list(&self) -> Result<Vec<PatientProfile>, DatabaseError>;

    /// The selected profile, or the first one when none was selected yet.
    fn get_active(&self) -> Result<Option<PatientProfile>, DatabaseError>;

    fn set_active(&self, id: &str) -> Result<(), DatabaseError>;
}

/// SQLite-backed implementation of both stores.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and seed the demo profile if empty.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Self::from_connection(db::open_database(path)?)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(db::open_memory_database()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.seed_if_empty()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    fn seed_if_empty(&self) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        if db::count_profiles(&conn)? == 0 {
            let demo = PatientProfile::demo();
            db::insert_profile(&conn, &demo)?;
            db::set_setting(&conn, ACTIVE_PROFILE_KEY, &demo.id)?;
            tracing::info!(profile_id = %demo.id, "Seeded demo profile");
        }
        Ok(())
    }
}

impl HistoryStore for SqliteStore {
    fn append(&self, record: &ConsultationRecord) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        db::insert_consultation(&conn, record)?;
        tracing::debug!(
            record_id = %record.id,
            risk = %record.diagnosis.risk_level,
            "Consultation recorded"
        );
        Ok(())
    }

    fn list(&self, profile_id: Option<&str>) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let conn = self.lock()?;
        db::list_consultations(&conn, profile_id, None)
    }

    fn recent(&self, profile_id: &str, limit: usize) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let conn = self.lock()?;
        db::list_consultations(&conn, Some(profile_id), Some(limit))
    }
}

impl ProfileStore for SqliteStore {
    fn create(&self, profile: NewProfile) -> Result<PatientProfile, DatabaseError> {
        profile
            .validate()
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
        let profile = profile.into_profile();

        let conn = self.lock()?;
        db::insert_profile(&conn, &profile)?;
        db::set_setting(&conn, ACTIVE_PROFILE_KEY, &profile.id)?;
        tracing::info!(profile_id = %profile.id, "Profile created");
        Ok(profile)
    }

    fn list(&self) -> Result<Vec<PatientProfile>, DatabaseError> {
        let conn = self.lock()?;
        db::list_profiles(&conn)
    }

    fn get_active(&self) -> Result<Option<PatientProfile>, DatabaseError> {
        let conn = self.lock()?;
        if let Some(id) = db::get_setting(&conn, ACTIVE_PROFILE_KEY)? {
            if let Some(profile) = db::get_profile(&conn, &id)? {
                return Ok(Some(profile));
            }
        }
        Ok(db::list_profiles(&conn)?.into_iter().next())
    }

    fn set_active(&self, id: &str) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        if db::get_profile(&conn, id)?.is_none() {
            return Err(DatabaseError::NotFound {
                entity_type: "Profile".into(),
                id: id.into(),
            });
        }
        db::set_setting(&conn, ACTIVE_PROFILE_KEY, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, DEMO_PROFILE_ID};

    fn new_profile(name: &str) -> NewProfile {
        NewProfile::from_form(name, "30", "Female", "", "Ravi", "5550100").unwrap()
    }

    fn record_at(profile_id: &str, timestamp: i64) -> ConsultationRecord {
        let mut record = ConsultationRecord::new(
            Some(profile_id.to_string()),
            "headache",
            AnalysisResult::fallback("en"),
            None,
        );
        record.timestamp = timestamp;
        record
    }

    #[test]
    fn empty_store_seeds_demo_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let profiles = ProfileStore::list(&store).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, DEMO_PROFILE_ID);
        assert_eq!(store.get_active().unwrap().unwrap().id, DEMO_PROFILE_ID);
    }

    #[test]
    fn seeding_happens_once_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.create(new_profile("Asha")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let profiles = ProfileStore::list(&store).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(store.get_active().unwrap().unwrap().name, "Asha");
    }

    #[test]
    fn create_activates_new_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store.create(new_profile("Asha")).unwrap();
        assert_eq!(store.get_active().unwrap().unwrap(), created);
    }

    #[test]
    fn create_rejects_invalid_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut invalid = new_profile("Asha");
        invalid.emergency_contact_number = " ".into();
        let err = store.create(invalid).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert_eq!(ProfileStore::list(&store).unwrap().len(), 1);
    }

    #[test]
    fn set_active_unknown_profile_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.set_active("nope").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        assert_eq!(store.get_active().unwrap().unwrap().id, DEMO_PROFILE_ID);
    }

    #[test]
    fn set_active_switches_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(new_profile("Asha")).unwrap();
        store.set_active(DEMO_PROFILE_ID).unwrap();
        assert_eq!(store.get_active().unwrap().unwrap().id, DEMO_PROFILE_ID);
    }

    #[test]
    fn history_lists_newest_first_per_profile() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&record_at("p", 100)).unwrap();
        store.append(&record_at("p", 300)).unwrap();
        store.append(&record_at("other", 250)).unwrap();
        store.append(&record_at("p", 200)).unwrap();

        let stamps: Vec<_> = HistoryStore::list(&store, Some("p"))
            .unwrap()
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(stamps, vec![300, 200, 100]);
        assert_eq!(HistoryStore::list(&store, None).unwrap().len(), 4);
    }

    #[test]
    fn recent_caps_and_orders() {
        let store = SqliteStore::open_in_memory().unwrap();
        for ts in [5, 1, 7, 3, 6, 2, 4] {
            store.append(&record_at("p", ts)).unwrap();
        }
        let stamps: Vec<_> = store.recent("p", 5).unwrap().iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn duplicate_record_id_surfaces_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = record_at("p", 1);
        store.append(&record).unwrap();
        assert!(store.append(&record).is_err());
    }
}
