#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub streams_reasoning: bool,
}

impl Model {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            streams_reasoning: false,
        }
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reasoning(mut self) -> Self {
        self.streams_reasoning = true;
        self
    }
}

pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-reasoner";
pub const DEFAULT_DEEPSEEK_ENDPOINT: &str = "https://api.deepseek.com";

pub fn default_deepseek_models() -> Vec<Model> {
    vec![
        Model::new(DEFAULT_DEEPSEEK_MODEL, "DeepSeek-R1")
            .with_description("Reasoning model; streams its chain of thought")
            .with_reasoning(),
        Model::new("deepseek-chat", "DeepSeek-V3").with_description("General chat model"),
    ]
}

/// Looks up a known model by id, falling back to a bare entry for ids the
/// catalog does not list.
pub fn lookup_model(id: &str) -> Model {
    default_deepseek_models()
        .into_iter()
        .find(|model| model.id == id)
        .unwrap_or_else(|| Model::from_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_listed_and_streams_reasoning() {
        let model = lookup_model(DEFAULT_DEEPSEEK_MODEL);
        assert_eq!(model.name, "DeepSeek-R1");
        assert!(model.streams_reasoning);
    }

    #[test]
    fn unknown_model_falls_back_to_bare_entry() {
        let model = lookup_model("my-fine-tune");
        assert_eq!(model, Model::from_id("my-fine-tune"));
        assert!(!model.streams_reasoning);
    }
}
