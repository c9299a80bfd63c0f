use std::sync::Mutex;

use super::state::ConsultationState;
use crate::escalation::EscalationPayload;
use crate::models::{AnalysisResult, ConsultationRecord};

/// Notifications pushed to the UI instead of shared mutable flags.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsultationEvent {
    StateChanged(ConsultationState),
    FollowUpRequested(Vec<String>),
    /// `record` is `None` when the turn finalized without persisting.
    Finalized {
        result: AnalysisResult,
        record: Option<ConsultationRecord>,
    },
    EscalationRequested(EscalationPayload),
    Reset,
}

pub type Subscriber = Box<dyn Fn(&ConsultationEvent) + Send + Sync>;

/// Synchronous fan-out to subscribers.
///
/// Callbacks run on the emitting task and must not subscribe from inside
/// a callback.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn subscribe(&self, subscriber: Subscriber) {
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(subscriber),
            Err(_) => tracing::warn!("Event subscribers lock poisoned, subscription dropped"),
        }
    }

    pub fn emit(&self, event: &ConsultationEvent) {
        match self.subscribers.lock() {
            Ok(subs) => subs.iter().for_each(|sub| sub(event)),
            Err(_) => tracing::warn!("Event subscribers lock poisoned, event dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn every_subscriber_receives_event() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let seen = seen.clone();
            bus.subscribe(Box::new(move |e| seen.lock().unwrap().push(e.clone())));
        }
        bus.emit(&ConsultationEvent::Reset);
        assert_eq!(*seen.lock().unwrap(), vec![ConsultationEvent::Reset, ConsultationEvent::Reset]);
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        EventBus::default().emit(&ConsultationEvent::StateChanged(ConsultationState::Idle));
    }
}
