use std::sync::Arc;

mod events;
mod model;
mod provider;
mod rig_adapter;

pub use events::{Generation, Role, StreamEvent, StreamEventMapped, StreamSessionId, StreamTarget};
pub use model::{
    DEFAULT_DEEPSEEK_ENDPOINT, DEFAULT_DEEPSEEK_MODEL, Model, default_deepseek_models,
    lookup_model,
};
pub use provider::{
    LlmProvider, ProviderConfig, ProviderError, ProviderEventStream, ProviderMessage,
    ProviderResult, ProviderStreamHandle, ProviderWorker, StreamRequest, make_event_stream,
};
pub use rig_adapter::{RIG_DEEPSEEK_PROVIDER_ID, RigProviderAdapter};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_DEEPSEEK_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "deepseek" | "rig-deepseek" => {
            config.provider_id = RIG_DEEPSEEK_PROVIDER_ID.to_string();
            Ok(Arc::new(RigProviderAdapter::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
