use cogito_llm::{Generation, Role};
use snafu::ensure;

use crate::error::{ChatResult, InvalidRoleOrderSnafu};
use crate::message::Message;

/// Ordered conversation history replayed verbatim to the provider.
///
/// Holds at most one system message, always at index 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    generation: Generation,
}

impl Transcript {
    /// Creates a transcript seeded with the system prompt, if any.
    ///
    /// A whitespace-only prompt is treated as absent.
    pub fn initialize(system_prompt: Option<&str>) -> Self {
        let messages = system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(|prompt| vec![Message::system(prompt)])
            .unwrap_or_default();

        Self {
            messages,
            generation: Generation::default(),
        }
    }

    pub fn append(&mut self, message: Message) -> ChatResult<()> {
        if message.role == Role::System {
            ensure!(
                !self.has_system_message(),
                InvalidRoleOrderSnafu {
                    stage: "transcript-append",
                    role: Role::System.as_str(),
                    position: self.messages.len(),
                    details: "transcript already has a system message",
                }
            );
            ensure!(
                self.messages.is_empty(),
                InvalidRoleOrderSnafu {
                    stage: "transcript-append",
                    role: Role::System.as_str(),
                    position: self.messages.len(),
                    details: "system message must be the first entry",
                }
            );
        }

        self.messages.push(message);
        Ok(())
    }

    /// Drops the conversation and starts a new generation.
    ///
    /// Results of calls issued against the previous generation must not be
    /// committed afterwards.
    pub fn reset(&mut self, preserve_system: bool) -> Generation {
        if preserve_system && self.has_system_message() {
            self.messages.truncate(1);
        } else {
            self.messages.clear();
        }

        self.generation = self.generation.next();
        self.generation
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|message| message.role == Role::System)
            .map(|message| message.content.as_str())
    }

    fn has_system_message(&self) -> bool {
        self.system_prompt().is_some()
    }

    /// Returns the trailing user message when it has not been answered yet.
    pub(crate) fn unanswered_user_message(&self) -> Option<&Message> {
        self.messages
            .last()
            .filter(|message| message.role == Role::User)
    }
}
