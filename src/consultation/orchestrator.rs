use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::context::ConversationContext;
use super::events::{ConsultationEvent, EventBus, Subscriber};
use super::state::ConsultationState;
use super::ConsultationError;
use crate::config::DEFAULT_ORACLE_TIMEOUT_SECS;
use crate::connectivity::Connectivity;
use crate::escalation::{EmergencyEscalator, EscalationPayload};
use crate::language::Language;
use crate::models::{AnalysisResult, ConsultationRecord, ImageAttachment, PatientProfile};
use crate::oracle::{AnalysisRequest, AnalysisService};
use crate::store::{HistoryStore, ProfileStore};

// ═══════════════════════════════════════════
// Requests & outcomes
// ═══════════════════════════════════════════

/// One user turn: fresh symptoms, or the answer to a follow-up question.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub text: String,
    pub image: Option<ImageAttachment>,
    pub is_follow_up: bool,
}

impl SubmitRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            is_follow_up: false,
        }
    }

    pub fn follow_up(text: impl Into<String>) -> Self {
        Self {
            is_follow_up: true,
            ..Self::new(text)
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Offline: no oracle call was made, route the user to static guidance.
    OfflineRedirect,
    FollowUp {
        questions: Vec<String>,
        result: AnalysisResult,
    },
    Finalized {
        result: AnalysisResult,
        record: Option<ConsultationRecord>,
        escalation: Option<EscalationPayload>,
    },
    /// The conversation was reset while the oracle was answering.
    Discarded,
}

// ═══════════════════════════════════════════
// Session state
// ═══════════════════════════════════════════

#[derive(Default)]
struct Session {
    state: ConsultationState,
    context: ConversationContext,
    current: Option<AnalysisResult>,
    /// Bumped on every reset; responses carrying an older value are stale.
    epoch: u64,
    /// First-turn input of the running consultation.
    symptoms: String,
    image_preview: Option<String>,
    language: Language,
    location_hint: Option<String>,
}

impl Session {
    fn clear(&mut self) {
        self.state = ConsultationState::Idle;
        self.context.clear();
        self.current = None;
        self.symptoms.clear();
        self.image_preview = None;
    }
}

struct PendingTurn {
    epoch: u64,
    request: AnalysisRequest,
    profile: Option<PatientProfile>,
    is_follow_up: bool,
}

enum TurnStart {
    Offline,
    Pending(PendingTurn),
}

/// Returns the session to `Idle` if the submit future is dropped mid-call.
struct InFlightTurn<'a, A: AnalysisService> {
    orchestrator: &'a ConsultationOrchestrator<A>,
    epoch: u64,
    settled: bool,
}

impl<A: AnalysisService> Drop for InFlightTurn<'_, A> {
    fn drop(&mut self) {
        if !self.settled {
            self.orchestrator.abandon_turn(self.epoch);
        }
    }
}

enum Decision {
    FollowUp(Vec<String>),
    Finalize {
        record: Option<ConsultationRecord>,
        escalation: Option<EscalationPayload>,
    },
}

// ═══════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════

/// Drives one conversation through the consultation state machine.
///
/// At most one oracle call is in flight. The session lock is never held
/// across an await; events are emitted after it is released, so
/// subscribers may query `state()` and `current_result()`.
pub struct ConsultationOrchestrator<A> {
    analysis: A,
    history: Arc<dyn HistoryStore>,
    profiles: Arc<dyn ProfileStore>,
    escalator: Arc<dyn EmergencyEscalator>,
    connectivity: Arc<dyn Connectivity>,
    oracle_timeout: Duration,
    session: Mutex<Session>,
    events: EventBus,
}

impl<A: AnalysisService> ConsultationOrchestrator<A> {
    pub fn new(
        analysis: A,
        history: Arc<dyn HistoryStore>,
        profiles: Arc<dyn ProfileStore>,
        escalator: Arc<dyn EmergencyEscalator>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            analysis,
            history,
            profiles,
            escalator,
            connectivity,
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            session: Mutex::new(Session::default()),
            events: EventBus::default(),
        }
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn subscribe(&self, subscriber: Subscriber) {
        self.events.subscribe(subscriber);
    }

    pub fn state(&self) -> ConsultationState {
        self.read(|s| s.state)
    }

    /// Verdict of the latest turn of the running consultation.
    pub fn current_result(&self) -> Option<AnalysisResult> {
        self.read(|s| s.current.clone())
    }

    pub fn language(&self) -> Language {
        self.read(|s| s.language)
    }

    pub fn set_language(&self, language: Language) {
        self.write(|s| s.language = language);
    }

    /// Free-form location (address or coordinates) quoted in emergency payloads.
    pub fn set_location_hint(&self, hint: Option<String>) {
        self.write(|s| s.location_hint = hint);
    }

    /// Abandon the running consultation from any state.
    ///
    /// A response still in flight is discarded when it arrives.
    pub fn reset(&self) {
        let epoch = self.write(|s| {
            s.clear();
            s.epoch += 1;
            s.epoch
        });
        self.escalator.cancel();
        tracing::info!(epoch, "Consultation reset");
        self.events.emit(&ConsultationEvent::Reset);
        self.events
            .emit(&ConsultationEvent::StateChanged(ConsultationState::Idle));
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome, ConsultationError> {
        let turn = match self.begin_turn(request)? {
            TurnStart::Offline => {
                self.events.emit(&ConsultationEvent::StateChanged(
                    ConsultationState::OfflineRedirect,
                ));
                return Ok(SubmitOutcome::OfflineRedirect);
            }
            TurnStart::Pending(turn) => turn,
        };
        self.events.emit(&ConsultationEvent::StateChanged(
            ConsultationState::AwaitingOracle,
        ));
        let mut in_flight = InFlightTurn {
            orchestrator: self,
            epoch: turn.epoch,
            settled: false,
        };

        let result =
            match tokio::time::timeout(self.oracle_timeout, self.analysis.analyze(&turn.request)).await
            {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.oracle_timeout.as_millis() as u64,
                        "Oracle call timed out, using fallback verdict"
                    );
                    AnalysisResult::fallback(turn.request.language.code())
                }
            };
        in_flight.settled = true;

        self.complete_turn(turn, result)
    }

    /// Called when a submit future is dropped before the oracle answered.
    fn abandon_turn(&self, epoch: u64) {
        let abandoned = self.write(|s| {
            let stuck = s.epoch == epoch && s.state == ConsultationState::AwaitingOracle;
            if stuck {
                s.clear();
            }
            stuck
        });
        if abandoned {
            tracing::warn!(epoch, "Consultation turn abandoned before the oracle answered");
            self.events
                .emit(&ConsultationEvent::StateChanged(ConsultationState::Idle));
        }
    }

    fn begin_turn(&self, request: SubmitRequest) -> Result<TurnStart, ConsultationError> {
        let mut session = self.lock()?;
        // Busy is checked ahead of connectivity: an in-flight turn must not be
        // overwritten by an offline redirect.
        if session.state == ConsultationState::AwaitingOracle {
            return Err(ConsultationError::Busy);
        }

        if !self.connectivity.is_online() {
            tracing::info!("Offline, redirecting to static guidance");
            session.state = ConsultationState::OfflineRedirect;
            session.current = None;
            return Ok(TurnStart::Offline);
        }

        let text = request.text.trim().to_string();
        if text.is_empty() && request.image.is_none() {
            return Err(ConsultationError::EmptySubmission);
        }
        if request.is_follow_up && session.state != ConsultationState::FollowUpPending {
            return Err(ConsultationError::NotAwaitingFollowUp);
        }

        let profile = self.profiles.get_active()?;

        if request.is_follow_up {
            session.context.push_user_answer(&text);
        } else {
            if session.state.is_terminal() {
                tracing::debug!(previous = %session.state, "Starting a new consultation");
            }
            session.context.begin();
            session.symptoms = text.clone();
            session.image_preview = request.image.as_ref().map(ImageAttachment::data_uri);
        }
        session.state = ConsultationState::AwaitingOracle;
        session.current = None;

        tracing::info!(
            epoch = session.epoch,
            follow_up = request.is_follow_up,
            has_image = request.image.is_some(),
            language = session.language.code(),
            "Consultation turn submitted"
        );

        Ok(TurnStart::Pending(PendingTurn {
            epoch: session.epoch,
            request: AnalysisRequest {
                symptoms: text,
                image: request.image,
                language: session.language,
                context: session.context.render(),
                profile: profile.clone(),
            },
            profile,
            is_follow_up: request.is_follow_up,
        }))
    }

    fn complete_turn(
        &self,
        turn: PendingTurn,
        result: AnalysisResult,
    ) -> Result<SubmitOutcome, ConsultationError> {
        let mut session = self.lock()?;
        if session.epoch != turn.epoch {
            tracing::debug!(
                turn_epoch = turn.epoch,
                epoch = session.epoch,
                "Discarding stale oracle response"
            );
            return Ok(SubmitOutcome::Discarded);
        }

        session.context.push_oracle_response(&result);
        session.current = Some(result.clone());
        let profile_id = turn.profile.as_ref().map(|p| p.id.clone());

        let decision = if result.is_emergency {
            session.state = ConsultationState::Finalized;
            let escalation = EscalationPayload::assemble(
                turn.profile.as_ref(),
                &result,
                &session.symptoms,
                session.location_hint.as_deref(),
                session.language,
            );
            // Always the first-turn text, even when the emergency surfaced on a follow-up.
            let record = ConsultationRecord::new(
                profile_id,
                &session.symptoms,
                result.clone(),
                session.image_preview.clone(),
            );
            Decision::Finalize {
                record: Some(record),
                escalation: Some(escalation),
            }
        } else if result.needs_follow_up && !turn.is_follow_up {
            session.state = ConsultationState::FollowUpPending;
            Decision::FollowUp(result.follow_up_questions.clone())
        } else {
            session.state = ConsultationState::Finalized;
            let record = (!turn.is_follow_up).then(|| {
                ConsultationRecord::new(
                    profile_id,
                    &session.symptoms,
                    result.clone(),
                    session.image_preview.clone(),
                )
            });
            Decision::Finalize {
                record,
                escalation: None,
            }
        };
        let epoch = session.epoch;
        drop(session);

        match decision {
            Decision::FollowUp(questions) => {
                tracing::info!(epoch, questions = questions.len(), "Follow-up requested");
                self.events.emit(&ConsultationEvent::StateChanged(
                    ConsultationState::FollowUpPending,
                ));
                self.events
                    .emit(&ConsultationEvent::FollowUpRequested(questions.clone()));
                Ok(SubmitOutcome::FollowUp { questions, result })
            }
            Decision::Finalize { record, escalation } => {
                tracing::info!(
                    epoch,
                    risk = %result.risk_level,
                    emergency = result.is_emergency,
                    recorded = record.is_some(),
                    "Consultation finalized"
                );
                self.events
                    .emit(&ConsultationEvent::StateChanged(ConsultationState::Finalized));

                if let Some(payload) = &escalation {
                    tracing::warn!(epoch, "Emergency verdict, escalating");
                    self.escalator.escalate(payload);
                    self.events
                        .emit(&ConsultationEvent::EscalationRequested(payload.clone()));
                }

                if let Some(record) = &record {
                    if let Err(e) = self.history.append(record) {
                        tracing::error!(error = %e, record_id = %record.id, "Failed to persist consultation");
                        self.events.emit(&ConsultationEvent::Finalized {
                            result,
                            record: None,
                        });
                        return Err(e.into());
                    }
                }

                self.events.emit(&ConsultationEvent::Finalized {
                    result: result.clone(),
                    record: record.clone(),
                });
                Ok(SubmitOutcome::Finalized {
                    result,
                    record,
                    escalation,
                })
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>, ConsultationError> {
        self.session
            .lock()
            .map_err(|_| ConsultationError::LockPoisoned)
    }

    fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&self.session.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.session.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
