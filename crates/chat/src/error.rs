use cogito_llm::StreamTarget;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("user input is empty"))]
    EmptyInput { stage: &'static str },
    #[snafu(display("cannot append {role} message at position {position}: {details}"))]
    InvalidRoleOrder {
        stage: &'static str,
        role: &'static str,
        position: usize,
        details: &'static str,
    },
    #[snafu(display("a turn is already awaiting a response for {active:?}"))]
    SessionBusy {
        stage: &'static str,
        active: StreamTarget,
    },
    #[snafu(display("completion provider is not configured: {details}"))]
    ConfigurationMissing {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("completion stream failed: {detail}"))]
    StreamFailure { stage: &'static str, detail: String },
    #[snafu(display("model finished without producing any answer content"))]
    EmptyResponse {
        stage: &'static str,
        reasoning: String,
    },
    #[snafu(display("result for {target:?} was discarded because the session was reset"))]
    TurnDiscarded {
        stage: &'static str,
        target: StreamTarget,
    },
    #[snafu(display("there is no unanswered user message to retry"))]
    NothingToRetry { stage: &'static str },
}

impl ChatError {
    /// True for failures raised after the remote call started; the user turn
    /// stays in the transcript and can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StreamFailure { .. } | Self::EmptyResponse { .. }
        )
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
