//! Folds stream events into the reasoning and content channels.

use cogito_llm::StreamEvent;

const MISSING_ERROR_DETAIL: &str = "stream failed without detail";

/// Lifecycle of one accumulated response.
///
/// Only ever advances from `InProgress` to one of the terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseStatus {
    #[default]
    InProgress,
    Complete,
    Failed {
        detail: String,
    },
}

impl ResponseStatus {
    pub fn failed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            MISSING_ERROR_DETAIL.to_string()
        } else {
            detail
        };
        Self::Failed { detail }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Both channels of one completion call as received so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccumulatedResponse {
    pub reasoning: String,
    pub content: String,
    pub status: ResponseStatus,
}

impl AccumulatedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response for a call that failed before producing any event.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::failed(detail),
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_complete(&self) -> bool {
        self.status == ResponseStatus::Complete
    }

    pub fn failure_detail(&self) -> Option<&str> {
        match &self.status {
            ResponseStatus::Failed { detail } => Some(detail),
            ResponseStatus::InProgress | ResponseStatus::Complete => None,
        }
    }
}

/// Applies one event to the accumulated state.
///
/// Fragments are appended in arrival order. Empty fragments and payload
/// kinds without a channel leave the state unchanged. Once the state is
/// terminal every further event is ignored.
pub fn feed(event: StreamEvent, mut state: AccumulatedResponse) -> AccumulatedResponse {
    if state.is_terminal() {
        return state;
    }

    match event {
        StreamEvent::Reasoning(fragment) => state.reasoning.push_str(&fragment),
        StreamEvent::Content(fragment) => state.content.push_str(&fragment),
        StreamEvent::Done => state.status = ResponseStatus::Complete,
        StreamEvent::Error(detail) => state.status = ResponseStatus::failed(detail),
        StreamEvent::Other(_) => {}
        _ => {}
    }

    state
}
