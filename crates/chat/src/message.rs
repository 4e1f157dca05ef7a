use cogito_llm::{ProviderMessage, Role};

/// One committed conversation entry.
///
/// Reasoning is kept beside the content and never replayed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub reasoning: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            reasoning: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant reply; an empty reasoning channel is stored as `None`.
    pub fn assistant(content: impl Into<String>, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning: (!reasoning.is_empty()).then_some(reasoning),
        }
    }

    pub fn to_provider_message(&self) -> ProviderMessage {
        ProviderMessage::new(self.role, self.content.clone())
    }
}
