use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

use super::events::{Role, StreamEventMapped, StreamTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub target: StreamTarget,
    pub model_id: String,
    pub messages: Vec<ProviderMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl StreamRequest {
    pub fn new(
        target: StreamTarget,
        model_id: impl Into<String>,
        messages: Vec<ProviderMessage>,
    ) -> Self {
        Self {
            target,
            model_id: model_id.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("stream request for {target:?} has no messages"))]
    EmptyMessageSet {
        stage: &'static str,
        target: StreamTarget,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
}

/// Receiving half of one completion stream.
///
/// Finite and single-pass. Dropping it signals the provider worker to stop.
pub struct ProviderEventStream {
    events: mpsc::UnboundedReceiver<StreamEventMapped>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<StreamEventMapped>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub async fn recv(&mut self) -> Option<StreamEventMapped> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamEventMapped> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
}

/// Builds the channel plumbing shared by every provider implementation.
///
/// Returns the sender the worker emits events on, the stream handed to the
/// consumer, and the receiver the worker watches for cancellation.
pub fn make_event_stream() -> (
    mpsc::UnboundedSender<StreamEventMapped>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        ProviderEventStream::new(event_rx, cancel_tx),
        cancel_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Generation, StreamEvent, StreamSessionId};

    fn target() -> StreamTarget {
        StreamTarget::new(Generation::new(0), StreamSessionId::new(1))
    }

    #[test]
    fn config_trims_every_field() {
        let config = ProviderConfig::new(" deepseek ", "  sk-123\n", " https://api.deepseek.com ");
        assert_eq!(config.provider_id, "deepseek");
        assert_eq!(config.api_key, "sk-123");
        assert_eq!(config.endpoint, "https://api.deepseek.com");
    }

    #[tokio::test]
    async fn event_stream_delivers_in_send_order() {
        let (event_tx, mut stream, _cancel_rx) = make_event_stream();
        for event in [
            StreamEvent::Reasoning("a".to_string()),
            StreamEvent::Content("b".to_string()),
            StreamEvent::Done,
        ] {
            event_tx
                .send(StreamEventMapped::new(target(), event))
                .expect("receiver is alive");
        }
        drop(event_tx);

        let mut received = Vec::new();
        while let Some(mapped) = stream.recv().await {
            received.push(mapped.event);
        }

        assert_eq!(
            received,
            vec![
                StreamEvent::Reasoning("a".to_string()),
                StreamEvent::Content("b".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn dropping_stream_signals_cancellation() {
        let (_event_tx, stream, cancel_rx) = make_event_stream();
        drop(stream);
        assert!(cancel_rx.await.is_ok());
    }

    #[test]
    fn cancel_fires_at_most_once() {
        let (_event_tx, mut stream, _cancel_rx) = make_event_stream();
        assert!(stream.cancel());
        assert!(!stream.cancel());
    }
}
