use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the profile seeded into an empty store.
pub const DEMO_PROFILE_ID: &str = "demo_1";

/// Patient identity and clinical context used to bias inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub known_conditions: String,
    pub emergency_contact_name: String,
    pub emergency_contact_number: String,
}

impl PatientProfile {
    /// Profile seeded when the store has never been used.
    pub fn demo() -> Self {
        Self {
            id: DEMO_PROFILE_ID.to_string(),
            name: "Demo Patient".to_string(),
            age: 45,
            gender: "Male".to_string(),
            known_conditions: "BP".to_string(),
            emergency_contact_name: "Emergency".to_string(),
            emergency_contact_number: "9999999999".to_string(),
        }
    }

    /// One-line summary the oracle sees with every request.
    pub fn prompt_summary(&self) -> String {
        let conditions = if self.known_conditions.trim().is_empty() {
            "None"
        } else {
            self.known_conditions.trim()
        };
        format!(
            "Patient: {}, Age: {}, Gender: {}, Conditions: {}",
            self.name, self.age, self.gender, conditions
        )
    }
}

/// Marker sent instead of a profile summary when none is selected.
pub const UNKNOWN_PROFILE_SUMMARY: &str = "Profile: Unknown";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileValidationError {
    #[error("Name is required")]
    MissingName,
    #[error("Emergency contact number is required")]
    MissingEmergencyNumber,
    #[error("Age must be a non-negative whole number, got '{0}'")]
    InvalidAge(String),
}

/// Input for creating a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub known_conditions: String,
    pub emergency_contact_name: String,
    pub emergency_contact_number: String,
}

impl NewProfile {
    /// Build from raw form fields, where age arrives as text.
    pub fn from_form(
        name: &str,
        age: &str,
        gender: &str,
        known_conditions: &str,
        emergency_contact_name: &str,
        emergency_contact_number: &str,
    ) -> Result<Self, ProfileValidationError> {
        let age_text = age.trim();
        if age_text.is_empty() {
            return Err(ProfileValidationError::InvalidAge(age.to_string()));
        }
        let age = age_text
            .parse::<u32>()
            .map_err(|_| ProfileValidationError::InvalidAge(age.to_string()))?;

        let profile = Self {
            name: name.trim().to_string(),
            age,
            gender: gender.trim().to_string(),
            known_conditions: known_conditions.trim().to_string(),
            emergency_contact_name: emergency_contact_name.trim().to_string(),
            emergency_contact_number: emergency_contact_number.trim().to_string(),
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.name.trim().is_empty() {
            return Err(ProfileValidationError::MissingName);
        }
        if self.emergency_contact_number.trim().is_empty() {
            return Err(ProfileValidationError::MissingEmergencyNumber);
        }
        Ok(())
    }

    /// Assign a fresh identifier.
    pub fn into_profile(self) -> PatientProfile {
        PatientProfile {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            age: self.age,
            gender: self.gender,
            known_conditions: self.known_conditions,
            emergency_contact_name: self.emergency_contact_name,
            emergency_contact_number: self.emergency_contact_number,
        }
    }
}
