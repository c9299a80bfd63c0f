use serde::{Deserialize, Serialize};

/// Where the conversation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationState {
    #[default]
    Idle,
    AwaitingOracle,
    FollowUpPending,
    Finalized,
    OfflineRedirect,
}

impl ConsultationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::AwaitingOracle => "AWAITING_ORACLE",
            Self::FollowUpPending => "FOLLOW_UP_PENDING",
            Self::Finalized => "FINALIZED",
            Self::OfflineRedirect => "OFFLINE_REDIRECT",
        }
    }

    /// Terminal states wait for the user to reset before the next consultation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::OfflineRedirect)
    }
}

impl std::fmt::Display for ConsultationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
