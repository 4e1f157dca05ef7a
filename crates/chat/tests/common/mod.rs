#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cogito_chat::{AccumulatedResponse, Message, RequestOptions, SessionController, TurnObserver};
use cogito_llm::{
    LlmProvider, ProviderError, ProviderResult, ProviderStreamHandle, ProviderWorker,
    StreamEvent, StreamEventMapped, StreamRequest, StreamSessionId, StreamTarget,
    make_event_stream,
};
use tokio::sync::oneshot;

pub const SYSTEM_PROMPT: &str = "S";

/// What the scripted provider does for one `stream_chat` call.
pub enum Script {
    /// Emits every event back to back.
    Events(Vec<StreamEvent>),
    /// Emits `before`, waits for the gate, then emits `after`.
    Gated {
        before: Vec<StreamEvent>,
        gate: oneshot::Receiver<()>,
        after: Vec<StreamEvent>,
    },
    /// Emits events tagged with another call's target, then `events`.
    Foreign {
        foreign: Vec<StreamEvent>,
        events: Vec<StreamEvent>,
    },
    /// Emits nothing and waits until cancelled.
    Hang,
    /// Fails synchronously, like a rejected handshake.
    Reject,
}

/// In-memory provider replaying queued scripts in order.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

fn send_all(
    event_tx: &tokio::sync::mpsc::UnboundedSender<StreamEventMapped>,
    target: StreamTarget,
    events: Vec<StreamEvent>,
) {
    for event in events {
        let _ = event_tx.send(StreamEventMapped::new(target, event));
    }
}

impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        let target = request.target;
        self.requests.lock().expect("requests lock").push(request);
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .pop_front()
            .unwrap_or(Script::Events(vec![StreamEvent::Error(
                "no script queued".to_string(),
            )]));

        if matches!(script, Script::Reject) {
            return Err(ProviderError::EmptyMessageSet {
                stage: "scripted-reject",
                target,
            });
        }

        let (event_tx, stream, cancel_rx) = make_event_stream();
        let worker: ProviderWorker = Box::pin(async move {
            match script {
                Script::Events(events) => send_all(&event_tx, target, events),
                Script::Gated {
                    before,
                    gate,
                    after,
                } => {
                    send_all(&event_tx, target, before);
                    let _ = gate.await;
                    send_all(&event_tx, target, after);
                }
                Script::Foreign { foreign, events } => {
                    let other = StreamTarget::new(
                        target.generation,
                        StreamSessionId::new(target.session_id.0 + 1_000),
                    );
                    send_all(&event_tx, other, foreign);
                    send_all(&event_tx, target, events);
                }
                Script::Hang => {
                    let _ = cancel_rx.await;
                }
                Script::Reject => {}
            }
        });

        Ok(ProviderStreamHandle { stream, worker })
    }
}

/// Observer that records everything it is shown.
#[derive(Default)]
pub struct Recorder {
    pub updates: Mutex<Vec<AccumulatedResponse>>,
    pub commits: Mutex<Vec<Message>>,
}

impl Recorder {
    pub fn updates(&self) -> Vec<AccumulatedResponse> {
        self.updates.lock().expect("updates lock").clone()
    }

    pub fn commits(&self) -> Vec<Message> {
        self.commits.lock().expect("commits lock").clone()
    }
}

impl TurnObserver for Recorder {
    fn on_update(&self, response: &AccumulatedResponse) {
        self.updates
            .lock()
            .expect("updates lock")
            .push(response.clone());
    }

    fn on_commit(&self, message: &Message) {
        self.commits
            .lock()
            .expect("commits lock")
            .push(message.clone());
    }
}

pub fn controller(provider: Arc<ScriptedProvider>) -> SessionController {
    SessionController::new(
        Some(provider as Arc<dyn LlmProvider>),
        RequestOptions::new("scripted-model"),
        Some(SYSTEM_PROMPT),
    )
}

pub fn reasoning(text: &str) -> StreamEvent {
    StreamEvent::Reasoning(text.to_string())
}

pub fn content(text: &str) -> StreamEvent {
    StreamEvent::Content(text.to_string())
}

pub fn error(detail: &str) -> StreamEvent {
    StreamEvent::Error(detail.to_string())
}

/// Yields to the runtime until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition was not reached");
}
