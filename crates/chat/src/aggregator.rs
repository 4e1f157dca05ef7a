use std::sync::Arc;

use cogito_llm::{LlmProvider, StreamEvent, StreamRequest, StreamTarget};
use snafu::{OptionExt, ensure};
use tokio::sync::oneshot;

use crate::demux::{AccumulatedResponse, feed};
use crate::error::{ChatResult, ConfigurationMissingSnafu};
use crate::message::Message;

pub const CANCELLED_DETAIL: &str = "cancelled";
pub const UNTERMINATED_STREAM_DETAIL: &str = "provider stream ended before a terminal event";

/// Per-call request knobs forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestOptions {
    pub model_id: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl RequestOptions {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u64>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Everything one completion call needs.
pub struct CompletionCall {
    pub target: StreamTarget,
    pub messages: Vec<Message>,
    pub cancel: Option<oneshot::Receiver<()>>,
}

impl CompletionCall {
    pub fn new(target: StreamTarget, messages: Vec<Message>) -> Self {
        Self {
            target,
            messages,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: oneshot::Receiver<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Drives one completion call from request to terminal state.
pub struct ResponseAggregator {
    provider: Option<Arc<dyn LlmProvider>>,
    options: RequestOptions,
}

impl ResponseAggregator {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, options: RequestOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn set_model(&mut self, model_id: impl Into<String>) {
        self.options.model_id = model_id.into().trim().to_string();
    }

    pub fn ensure_configured(&self) -> ChatResult<&Arc<dyn LlmProvider>> {
        let provider = self.provider.as_ref().context(ConfigurationMissingSnafu {
            stage: "aggregator-provider",
            details: "no API key or endpoint was supplied",
        })?;
        ensure!(
            !self.options.model_id.is_empty(),
            ConfigurationMissingSnafu {
                stage: "aggregator-model",
                details: "model id is blank",
            }
        );
        Ok(provider)
    }

    fn build_request(&self, call: &CompletionCall) -> StreamRequest {
        let messages = call
            .messages
            .iter()
            .map(Message::to_provider_message)
            .collect();
        let mut request = StreamRequest::new(call.target, self.options.model_id.clone(), messages);
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    /// Runs the call without progress reporting.
    pub async fn collect(&self, call: CompletionCall) -> ChatResult<AccumulatedResponse> {
        self.run(call, |_| {}).await
    }

    /// Runs the call to a terminal state, reporting progress through `on_update`.
    ///
    /// Stream faults never surface as `Err`; they come back as a failed
    /// response. Updates are coalesced over events that are already buffered,
    /// and the terminal state is always reported.
    pub async fn run<F>(
        &self,
        mut call: CompletionCall,
        mut on_update: F,
    ) -> ChatResult<AccumulatedResponse>
    where
        F: FnMut(&AccumulatedResponse),
    {
        let provider = self.ensure_configured()?;
        let target = call.target;
        let request = self.build_request(&call);

        let handle = match provider.stream_chat(request) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(
                    target = ?target,
                    provider_id = %provider.id(),
                    error = %error,
                    "provider rejected stream request"
                );
                let response = AccumulatedResponse::failed(error.to_string());
                on_update(&response);
                return Ok(response);
            }
        };

        let worker = tokio::spawn(handle.worker);
        let mut stream = handle.stream;
        let mut response = AccumulatedResponse::new();

        while !response.is_terminal() {
            // A dropped cancel sender counts as cancellation: nobody is left to commit.
            let next = match call.cancel.as_mut() {
                Some(cancel) => tokio::select! {
                    biased;
                    _ = cancel => None,
                    next = stream.recv() => Some(next),
                },
                None => Some(stream.recv().await),
            };

            let event = match next {
                None => {
                    tracing::debug!(target = ?target, "completion call cancelled");
                    stream.cancel();
                    StreamEvent::Error(CANCELLED_DETAIL.to_string())
                }
                Some(None) => StreamEvent::Error(UNTERMINATED_STREAM_DETAIL.to_string()),
                Some(Some(mapped)) if mapped.target != target => {
                    tracing::warn!(
                        expected = ?target,
                        received = ?mapped.target,
                        "dropping stream event for a different call"
                    );
                    continue;
                }
                Some(Some(mapped)) => mapped.event,
            };
            response = feed(event, response);

            while !response.is_terminal() {
                let Some(mapped) = stream.try_recv() else {
                    break;
                };
                if mapped.target == target {
                    response = feed(mapped.event, response);
                }
            }

            on_update(&response);
        }

        drop(stream);
        worker.abort();

        Ok(response)
    }
}
