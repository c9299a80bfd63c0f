//! Multi-turn consultation engine.
//!
//! One `ConsultationOrchestrator` owns one conversation: it sequences oracle
//! turns, decides between follow-up and finalization, records finished
//! consultations and requests escalation for emergencies.

pub mod context;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use context::*;
pub use events::*;
pub use orchestrator::*;
pub use state::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::ImageError;

#[derive(Error, Debug)]
pub enum ConsultationError {
    #[error("Describe your symptoms or attach a photo")]
    EmptySubmission,

    #[error("Image rejected: {0}")]
    Image(#[from] ImageError),

    #[error("No follow-up question is pending")]
    NotAwaitingFollowUp,

    #[error("A consultation turn is already in progress")]
    Busy,

    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Consultation state lock poisoned")]
    LockPoisoned,
}
