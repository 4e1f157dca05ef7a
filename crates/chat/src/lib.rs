#![deny(unsafe_code)]

//! Conversation state and streaming response aggregation.
//!
//! A [`SessionController`] owns the [`Transcript`] of one conversation and
//! drives one completion call per turn through the [`ResponseAggregator`],
//! which folds provider events into reasoning and content with [`feed`].

pub mod aggregator;
pub mod demux;
pub mod error;
pub mod message;
pub mod session;
pub mod transcript;

pub use aggregator::{
    CANCELLED_DETAIL, CompletionCall, RequestOptions, ResponseAggregator,
    UNTERMINATED_STREAM_DETAIL,
};
pub use cogito_llm::{Generation, Role, StreamEvent, StreamSessionId, StreamTarget};
pub use demux::{AccumulatedResponse, ResponseStatus, feed};
pub use error::{ChatError, ChatResult};
pub use message::Message;
pub use session::{
    NoopObserver, SessionController, TurnObserver, TurnPhase, TurnTransition,
    TurnTransitionRejection, TurnTransitionResult,
};
pub use transcript::Transcript;
