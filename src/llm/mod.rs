//! LLM integration for ClarityOS.
//!
//! The advisor talks to any OpenAI-compatible chat-completions endpoint
//! (NVIDIA NIM by default) through rig-core. `RigAdapter` bridges rig's
//! `CompletionModel` trait to our `LlmProvider` trait so the conversation
//! logic never sees the transport and tests can plug in stubs.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let base_url = config.base_url.trim().trim_end_matches('/');
    if base_url.is_empty() {
        return Err(LlmError::RequestFailed {
            provider: "openai-compatible".to_string(),
            reason: "base URL is empty".to_string(),
        });
    }

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::builder()
            .api_key(config.api_key.expose_secret())
            .base_url(base_url)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: "openai-compatible".to_string(),
                reason: format!("Failed to create OpenAI-compatible client: {}", e),
            })?;

    // NIM and most self-hosted servers only speak /chat/completions.
    let model = client.completions_api().completion_model(&config.model);
    tracing::info!("Using OpenAI-compatible endpoint {} (model: {})", base_url, config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}
