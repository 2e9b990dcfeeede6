//! Provider integrations and the shared calling conventions.
//!
//! Every outbound call goes through [`retry::call_with_retry`], so transient
//! connectivity failures get exactly one backed-off second attempt while
//! provider-side and parse failures surface immediately.

pub mod http;
pub mod openai;
pub mod replicate;
pub mod retry;

use crate::config::Integrations;
use crate::registry::{NetworkEntry, Provider};
use crate::store::{CompletionEntry, DialogEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Uniform error taxonomy for provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connectivity-class failure; the only retried variant.
    #[error("network error: {0}")]
    Network(String),
    /// Provider-reported rejection (non-2xx status or error payload).
    #[error("provider error: {0}")]
    Api(String),
    /// A 2xx response missing the expected fields or failing to parse.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The integration required by the resolved network is not configured.
    #[error("{0} integration is not configured")]
    NotConfigured(&'static str),
}

impl ProviderError {
    /// Transient errors are retried once; everything else is terminal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Result of an image generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutput {
    /// Decoded image bytes (OpenAI `b64_json`).
    Bytes(Vec<u8>),
    /// Hosted image URL (Replicate).
    Url(String),
}

/// The outbound side of every handler: one method per modality.
///
/// Implementations unwrap provider responses down to the minimal value the
/// handler needs; tests substitute a mock.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Role-tagged chat completion over the dialog history.
    async fn chat(
        &self,
        network: &NetworkEntry,
        history: &[DialogEntry],
        text: &str,
    ) -> Result<String, ProviderError>;

    /// One-shot completion with `PromptN:`/`AnswerN:` context formatting.
    async fn complete(
        &self,
        network: &NetworkEntry,
        history: &[CompletionEntry],
        text: &str,
    ) -> Result<String, ProviderError>;

    async fn generate_image(
        &self,
        network: &NetworkEntry,
        prompt: &str,
    ) -> Result<ImageOutput, ProviderError>;

    async fn transcribe(
        &self,
        network: &NetworkEntry,
        audio: &[u8],
        language: Option<&str>,
    ) -> Result<String, ProviderError>;
}

/// Gateway backed by the real OpenAI and Replicate clients, with the retry
/// policy applied around every call.
pub struct LiveGateway {
    openai: Option<openai::OpenAiClient>,
    replicate: Option<replicate::ReplicateClient>,
}

impl LiveGateway {
    #[must_use]
    pub fn from_settings(integrations: &Integrations) -> Self {
        Self {
            openai: integrations
                .openai
                .as_ref()
                .map(|p| openai::OpenAiClient::new(p.api_key.clone())),
            replicate: integrations
                .replicate
                .as_ref()
                .map(|p| replicate::ReplicateClient::new(p.api_key.clone())),
        }
    }

    fn openai(&self) -> Result<&openai::OpenAiClient, ProviderError> {
        self.openai
            .as_ref()
            .ok_or(ProviderError::NotConfigured("OpenAI"))
    }

    fn replicate(&self) -> Result<&replicate::ReplicateClient, ProviderError> {
        self.replicate
            .as_ref()
            .ok_or(ProviderError::NotConfigured("Replicate"))
    }
}

#[async_trait]
impl ProviderGateway for LiveGateway {
    async fn chat(
        &self,
        network: &NetworkEntry,
        history: &[DialogEntry],
        text: &str,
    ) -> Result<String, ProviderError> {
        let client = self.openai()?;
        retry::call_with_retry(|| client.chat(&network.name, history, text)).await
    }

    async fn complete(
        &self,
        network: &NetworkEntry,
        history: &[CompletionEntry],
        text: &str,
    ) -> Result<String, ProviderError> {
        let client = self.replicate()?;
        retry::call_with_retry(|| client.complete(network, history, text)).await
    }

    async fn generate_image(
        &self,
        network: &NetworkEntry,
        prompt: &str,
    ) -> Result<ImageOutput, ProviderError> {
        match network.provider {
            Provider::OpenAi => {
                let client = self.openai()?;
                retry::call_with_retry(|| client.generate_image(&network.name, prompt)).await
            }
            Provider::Replicate => {
                let client = self.replicate()?;
                retry::call_with_retry(|| client.generate_image(network, prompt)).await
            }
        }
    }

    async fn transcribe(
        &self,
        network: &NetworkEntry,
        audio: &[u8],
        language: Option<&str>,
    ) -> Result<String, ProviderError> {
        let client = self.replicate()?;
        retry::call_with_retry(|| client.transcribe(network, audio, language)).await
    }
}
