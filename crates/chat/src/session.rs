use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cogito_llm::{Generation, LlmProvider, StreamSessionId, StreamTarget};
use snafu::{OptionExt, ensure};
use tokio::sync::oneshot;

use crate::aggregator::{CANCELLED_DETAIL, CompletionCall, RequestOptions, ResponseAggregator};
use crate::demux::{AccumulatedResponse, ResponseStatus};
use crate::error::{
    ChatError, ChatResult, EmptyInputSnafu, EmptyResponseSnafu, NothingToRetrySnafu,
    SessionBusySnafu, StreamFailureSnafu, TurnDiscardedSnafu,
};
use crate::message::Message;
use crate::transcript::Transcript;

/// Renderer-side view of a turn.
pub trait TurnObserver: Send + Sync {
    /// Called with the latest accumulation while the turn is current.
    fn on_update(&self, response: &AccumulatedResponse);

    fn on_commit(&self, message: &Message) {
        let _ = message;
    }
}

/// Observer for callers that only need the final message.
pub struct NoopObserver;

impl TurnObserver for NoopObserver {
    fn on_update(&self, _response: &AccumulatedResponse) {}
}

/// Lifecycle of the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingResponse(StreamTarget),
    Committed(StreamTarget),
    Failed {
        target: StreamTarget,
        message: String,
    },
    Cancelled(StreamTarget),
}

/// State transition input for the turn lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransition {
    Start(StreamTarget),
    Commit(StreamTarget),
    Fail {
        target: StreamTarget,
        message: String,
    },
    Cancel(StreamTarget),
    ResetToIdle,
}

/// Rejection reason for illegal turn transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransitionRejection {
    AlreadyAwaiting {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveTurn,
    TargetMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

pub type TurnTransitionResult = Result<TurnPhase, TurnTransitionRejection>;

impl TurnPhase {
    /// Returns the awaited target if and only if the phase is `AwaitingResponse`.
    pub fn active_target(&self) -> Option<StreamTarget> {
        match self {
            Self::AwaitingResponse(target) => Some(*target),
            Self::Idle | Self::Committed(_) | Self::Failed { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn accepts_stream_event(&self, target: StreamTarget) -> bool {
        matches!(self, Self::AwaitingResponse(active) if *active == target)
    }

    /// True when the last turn ended without an assistant reply.
    pub fn left_unanswered(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Cancelled(_))
    }

    /// Applies one transition deterministically.
    ///
    /// Any terminal transition must match the awaited target exactly.
    pub fn apply(&self, transition: TurnTransition) -> TurnTransitionResult {
        match transition {
            TurnTransition::Start(target) => self.apply_start(target),
            TurnTransition::Commit(target) => {
                self.apply_terminal(target, TurnPhase::Committed(target))
            }
            TurnTransition::Fail { target, message } => {
                self.apply_terminal(target, TurnPhase::Failed { target, message })
            }
            TurnTransition::Cancel(target) => {
                self.apply_terminal(target, TurnPhase::Cancelled(target))
            }
            TurnTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_start(&self, target: StreamTarget) -> TurnTransitionResult {
        match self {
            Self::AwaitingResponse(active) if *active != target => {
                Err(TurnTransitionRejection::AlreadyAwaiting {
                    active: *active,
                    attempted: target,
                })
            }
            Self::AwaitingResponse(_) => Ok(self.clone()),
            Self::Idle | Self::Committed(_) | Self::Failed { .. } | Self::Cancelled(_) => {
                Ok(Self::AwaitingResponse(target))
            }
        }
    }

    fn apply_terminal(&self, target: StreamTarget, next: TurnPhase) -> TurnTransitionResult {
        match self {
            Self::AwaitingResponse(active) if *active == target => Ok(next),
            Self::AwaitingResponse(active) => Err(TurnTransitionRejection::TargetMismatch {
                active: *active,
                attempted: target,
            }),
            Self::Idle | Self::Committed(_) | Self::Failed { .. } | Self::Cancelled(_) => {
                Err(TurnTransitionRejection::NoActiveTurn)
            }
        }
    }
}

struct SessionState {
    transcript: Transcript,
    phase: TurnPhase,
    next_session_id: u64,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl SessionState {
    fn is_current(&self, target: StreamTarget) -> bool {
        self.transcript.generation() == target.generation
            && self.phase.accepts_stream_event(target)
    }

    fn alloc_target(&mut self) -> StreamTarget {
        let session_id = StreamSessionId::new(self.next_session_id);
        self.next_session_id = self.next_session_id.saturating_add(1);
        StreamTarget::new(self.transcript.generation(), session_id)
    }

    /// Moves to `AwaitingResponse`, rejecting re-entrant submissions.
    fn start_turn(&mut self, stage: &'static str) -> ChatResult<StreamTarget> {
        if let Some(active) = self.phase.active_target() {
            tracing::debug!(active = ?active, stage, "rejecting submission while awaiting");
            return SessionBusySnafu { stage, active }.fail();
        }

        let target = self.alloc_target();
        self.phase = match self.phase.apply(TurnTransition::Start(target)) {
            Ok(phase) => phase,
            Err(rejection) => {
                tracing::error!(?rejection, "start transition rejected from a non-awaiting phase");
                return SessionBusySnafu {
                    stage,
                    active: target,
                }
                .fail();
            }
        };
        Ok(target)
    }

    fn transition(&mut self, transition: TurnTransition) {
        match self.phase.apply(transition) {
            Ok(phase) => self.phase = phase,
            Err(rejection) => tracing::warn!(?rejection, "ignoring illegal turn transition"),
        }
    }

    fn signal_cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

/// Single entry point for the turns of one conversation.
///
/// One completion call is in flight at a time; cancellation and resets may
/// run concurrently with it.
pub struct SessionController {
    aggregator: ResponseAggregator,
    state: Mutex<SessionState>,
}

impl SessionController {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        options: RequestOptions,
        system_prompt: Option<&str>,
    ) -> Self {
        Self::with_aggregator(
            ResponseAggregator::new(provider, options),
            Transcript::initialize(system_prompt),
        )
    }

    pub fn with_aggregator(aggregator: ResponseAggregator, transcript: Transcript) -> Self {
        Self {
            aggregator,
            state: Mutex::new(SessionState {
                transcript,
                phase: TurnPhase::Idle,
                next_session_id: 0,
                cancel_tx: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock().transcript.snapshot()
    }

    pub fn generation(&self) -> Generation {
        self.lock().transcript.generation()
    }

    pub fn phase(&self) -> TurnPhase {
        self.lock().phase.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.aggregator.ensure_configured().is_ok()
    }

    pub fn model_id(&self) -> &str {
        &self.aggregator.options().model_id
    }

    pub fn set_model(&mut self, model_id: impl Into<String>) {
        self.aggregator.set_model(model_id);
    }

    pub async fn submit_turn(&self, user_text: &str) -> ChatResult<Message> {
        self.submit_turn_with(user_text, &NoopObserver).await
    }

    /// Appends the user message, runs the completion and commits the reply.
    ///
    /// Resubmitting the text of a turn that failed reuses the unanswered user
    /// message instead of appending it twice.
    pub async fn submit_turn_with(
        &self,
        user_text: &str,
        observer: &dyn TurnObserver,
    ) -> ChatResult<Message> {
        ensure!(
            !user_text.trim().is_empty(),
            EmptyInputSnafu {
                stage: "submit-turn"
            }
        );
        self.aggregator.ensure_configured()?;

        let call = {
            let mut state = self.lock();
            let reuse_pending = state.phase.left_unanswered()
                && state
                    .transcript
                    .unanswered_user_message()
                    .is_some_and(|message| message.content == user_text);

            let target = state.start_turn("submit-turn")?;
            if reuse_pending {
                tracing::debug!(target = ?target, "resubmitting unanswered user message");
            } else if let Err(error) = state.transcript.append(Message::user(user_text)) {
                state.phase = TurnPhase::Idle;
                return Err(error);
            }
            self.prepare_call(&mut state, target)
        };

        self.drive(call, observer).await
    }

    /// Re-runs the completion for the unanswered user message at the tail.
    pub async fn retry_last_turn(&self, observer: &dyn TurnObserver) -> ChatResult<Message> {
        self.aggregator.ensure_configured()?;

        let call = {
            let mut state = self.lock();
            if let Some(active) = state.phase.active_target() {
                return SessionBusySnafu {
                    stage: "retry-turn",
                    active,
                }
                .fail();
            }
            state
                .transcript
                .unanswered_user_message()
                .context(NothingToRetrySnafu {
                    stage: "retry-turn",
                })?;
            let target = state.start_turn("retry-turn")?;
            self.prepare_call(&mut state, target)
        };

        self.drive(call, observer).await
    }

    /// Signals the in-flight call to stop. Returns false when nothing is running.
    pub fn cancel_turn(&self) -> bool {
        self.lock().signal_cancel()
    }

    /// Resets the transcript and abandons any in-flight call.
    pub fn clear_session(&self, preserve_system: bool) {
        let mut state = self.lock();
        if state.signal_cancel() {
            tracing::debug!("abandoning in-flight call on session reset");
        }
        let generation = state.transcript.reset(preserve_system);
        state.transition(TurnTransition::ResetToIdle);
        tracing::info!(generation = ?generation, preserve_system, "session cleared");
    }

    fn prepare_call(&self, state: &mut SessionState, target: StreamTarget) -> CompletionCall {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        state.cancel_tx = Some(cancel_tx);
        CompletionCall::new(target, state.transcript.snapshot()).with_cancel(cancel_rx)
    }

    async fn drive(&self, call: CompletionCall, observer: &dyn TurnObserver) -> ChatResult<Message> {
        let target = call.target;
        let mut guard = TurnGuard {
            controller: self,
            target,
            armed: true,
        };

        let result = self
            .aggregator
            .run(call, |response| {
                if self.lock().is_current(target) {
                    observer.on_update(response);
                }
            })
            .await;
        guard.armed = false;

        match result {
            Ok(response) => self.finish_turn(target, response, observer),
            Err(error) => {
                let mut state = self.lock();
                if state.is_current(target) {
                    state.cancel_tx = None;
                    state.transition(TurnTransition::Fail {
                        target,
                        message: error.to_string(),
                    });
                }
                Err(error)
            }
        }
    }

    fn finish_turn(
        &self,
        target: StreamTarget,
        response: AccumulatedResponse,
        observer: &dyn TurnObserver,
    ) -> ChatResult<Message> {
        let mut state = self.lock();
        if !state.is_current(target) {
            tracing::debug!(target = ?target, "discarding result of superseded call");
            return TurnDiscardedSnafu {
                stage: "finish-turn",
                target,
            }
            .fail();
        }
        state.cancel_tx = None;

        let AccumulatedResponse {
            reasoning,
            content,
            status,
        } = response;

        match status {
            ResponseStatus::Complete if content.is_empty() => {
                tracing::warn!(
                    target = ?target,
                    reasoning_len = reasoning.len(),
                    "completion finished without answer content; not committing"
                );
                state.transition(TurnTransition::Fail {
                    target,
                    message: "empty response".to_string(),
                });
                EmptyResponseSnafu {
                    stage: "finish-turn",
                    reasoning,
                }
                .fail()
            }
            ResponseStatus::Complete => {
                let message = Message::assistant(content, reasoning);
                if let Err(error) = state.transcript.append(message.clone()) {
                    state.transition(TurnTransition::Fail {
                        target,
                        message: error.to_string(),
                    });
                    return Err(error);
                }
                state.transition(TurnTransition::Commit(target));
                tracing::info!(
                    target = ?target,
                    transcript_len = state.transcript.len(),
                    "assistant turn committed"
                );
                drop(state);

                observer.on_commit(&message);
                Ok(message)
            }
            ResponseStatus::Failed { detail } => {
                if detail == CANCELLED_DETAIL {
                    state.transition(TurnTransition::Cancel(target));
                } else {
                    tracing::warn!(target = ?target, detail = %detail, "completion call failed");
                    state.transition(TurnTransition::Fail {
                        target,
                        message: detail.clone(),
                    });
                }
                StreamFailureSnafu {
                    stage: "finish-turn",
                    detail,
                }
                .fail()
            }
            ResponseStatus::InProgress => {
                let detail = "completion returned before reaching a terminal state".to_string();
                state.transition(TurnTransition::Fail {
                    target,
                    message: detail.clone(),
                });
                Err(ChatError::StreamFailure {
                    stage: "finish-turn",
                    detail,
                })
            }
        }
    }
}

/// Returns the controller to a non-busy phase if the turn future is dropped
/// before the call resolves.
struct TurnGuard<'a> {
    controller: &'a SessionController,
    target: StreamTarget,
    armed: bool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut state = self.controller.lock();
        if state.phase.active_target() == Some(self.target) {
            tracing::debug!(target = ?self.target, "turn dropped while awaiting; cancelling");
            state.signal_cancel();
            state.transition(TurnTransition::Cancel(self.target));
        }
    }
}
