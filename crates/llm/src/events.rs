/// Transcript generation a completion call was issued against.
///
/// Bumped on every transcript reset so results of calls issued before the
/// reset can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the generation that follows this one.
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Identifier for one streaming completion call.
///
/// This must change on every submit/retry so stale chunks can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Stream routing key used for stale-chunk rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub generation: Generation,
    pub session_id: StreamSessionId,
}

impl StreamTarget {
    pub const fn new(generation: Generation, session_id: StreamSessionId) -> Self {
        Self {
            generation,
            session_id,
        }
    }
}

/// Chat speaker role as understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One partial update emitted by a completion stream.
///
/// `Done` and `Error` are terminal; a well-behaved stream emits exactly one of
/// them as its last event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StreamEvent {
    /// Fragment of the model's intermediate deliberation.
    Reasoning(String),
    /// Fragment of the final answer.
    Content(String),
    Done,
    Error(String),
    /// Payload kind with no chat channel (tool-call chunks and the like),
    /// tagged with the provider's name for it.
    Other(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Stream event routed to the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub event: StreamEvent,
}

impl StreamEventMapped {
    pub fn new(target: StreamTarget, event: StreamEvent) -> Self {
        Self { target, event }
    }
}
