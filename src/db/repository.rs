use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;
use crate::models::{AnalysisResult, ConsultationRecord, PatientProfile};

// ═══════════════════════════════════════════
// Profile Repository
// ═══════════════════════════════════════════

pub fn insert_profile(conn: &Connection, profile: &PatientProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO profiles (id, name, age, gender, known_conditions,
         emergency_contact_name, emergency_contact_number, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            profile.id,
            profile.name,
            profile.age,
            profile.gender,
            profile.known_conditions,
            profile.emergency_contact_name,
            profile.emergency_contact_number,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "profile {}: {}",
                profile.id,
                msg.as_deref().unwrap_or("constraint failed")
            ))
        }
        other => DatabaseError::Sqlite(other),
    })?;
    Ok(())
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<PatientProfile> {
    Ok(PatientProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        known_conditions: row.get(4)?,
        emergency_contact_name: row.get(5)?,
        emergency_contact_number: row.get(6)?,
    })
}

/// All profiles in creation order.
pub fn list_profiles(conn: &Connection) -> Result<Vec<PatientProfile>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, age, gender, known_conditions,
         emergency_contact_name, emergency_contact_number
         FROM profiles ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map([], profile_from_row)?;

    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row?);
    }
    Ok(profiles)
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<PatientProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT id, name, age, gender, known_conditions,
             emergency_contact_name, emergency_contact_number
             FROM profiles WHERE id = ?1",
            params![id],
            profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn count_profiles(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
    Ok(count)
}

// ═══════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

// ═══════════════════════════════════════════
// Consultation Repository
// ═══════════════════════════════════════════

pub fn insert_consultation(
    conn: &Connection,
    record: &ConsultationRecord,
) -> Result<(), DatabaseError> {
    let diagnosis_json = serde_json::to_string(&record.diagnosis)?;
    conn.execute(
        "INSERT INTO consultations (id, profile_id, date, timestamp, symptoms,
         risk_level, diagnosis_json, image_preview)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id,
            record.profile_id,
            record.date,
            record.timestamp,
            record.symptoms,
            record.diagnosis.risk_level.as_str(),
            diagnosis_json,
            record.image_preview,
        ],
    )?;
    Ok(())
}

/// Intermediate row before the diagnosis JSON is decoded.
struct ConsultationRow {
    id: String,
    profile_id: Option<String>,
    date: String,
    timestamp: i64,
    symptoms: String,
    diagnosis_json: String,
    image_preview: Option<String>,
}

impl ConsultationRow {
    fn into_record(self) -> Result<ConsultationRecord, DatabaseError> {
        let diagnosis: AnalysisResult = serde_json::from_str(&self.diagnosis_json)?;
        Ok(ConsultationRecord {
            id: self.id,
            profile_id: self.profile_id,
            date: self.date,
            timestamp: self.timestamp,
            symptoms: self.symptoms,
            diagnosis,
            image_preview: self.image_preview,
        })
    }
}

/// Consultations newest-first, optionally for one profile and capped at `limit`.
pub fn list_consultations(
    conn: &Connection,
    profile_id: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<ConsultationRecord>, DatabaseError> {
    let mut sql = String::from(
        "SELECT id, profile_id, date, timestamp, symptoms, diagnosis_json, image_preview
         FROM consultations",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(pid) = profile_id {
        sql.push_str(" WHERE profile_id = ?1");
        params_vec.push(Box::new(pid.to_string()));
    }
    sql.push_str(" ORDER BY timestamp DESC, rowid DESC");
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {n}"));
    }

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(ConsultationRow {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            date: row.get(2)?,
            timestamp: row.get(3)?,
            symptoms: row.get(4)?,
            diagnosis_json: row.get(5)?,
            image_preview: row.get(6)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}
