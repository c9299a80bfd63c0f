use crate::models::AnalysisResult;

const NEW_CONSULTATION_MARKER: &str = "New Consultation.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEntry {
    /// Opens every consultation.
    NewConsultation,
    UserInput(String),
    /// The oracle's own previous answer, serialized.
    OracleResponse(String),
}

impl ContextEntry {
    fn render(&self) -> String {
        match self {
            Self::NewConsultation => NEW_CONSULTATION_MARKER.to_string(),
            Self::UserInput(text) => format!("User Answer: {text}"),
            Self::OracleResponse(json) => format!("AI: {json}"),
        }
    }
}

/// Transcript of one consultation, handed back to the oracle on every turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationContext {
    entries: Vec<ContextEntry>,
}

impl ConversationContext {
    /// Drop the previous transcript and open a new consultation.
    pub fn begin(&mut self) {
        self.entries.clear();
        self.entries.push(ContextEntry::NewConsultation);
    }

    pub fn push_user_answer(&mut self, text: &str) {
        self.entries.push(ContextEntry::UserInput(text.to_string()));
    }

    pub fn push_oracle_response(&mut self, result: &AnalysisResult) {
        let json = serde_json::to_string(result).unwrap_or_default();
        self.entries.push(ContextEntry::OracleResponse(json));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The opaque string form the oracle sees.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ContextEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_resets_to_marker() {
        let mut ctx = ConversationContext::default();
        ctx.push_user_answer("stale");
        ctx.begin();
        assert_eq!(ctx.render(), "New Consultation.");
    }

    #[test]
    fn transcript_grows_in_order() {
        let mut ctx = ConversationContext::default();
        ctx.begin();
        ctx.push_oracle_response(&AnalysisResult::fallback("en"));
        ctx.push_user_answer("Two days");

        let rendered = ctx.render();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "New Consultation.");
        assert!(lines[1].starts_with("AI: {"));
        assert!(lines[1].contains("\"riskLevel\":\"LOW\""));
        assert_eq!(lines[2], "User Answer: Two days");
    }

    #[test]
    fn clear_empties() {
        let mut ctx = ConversationContext::default();
        ctx.begin();
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.render(), "");
    }
}
