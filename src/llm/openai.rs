//! OpenAI integration: chat completions and DALL-E image generation.

use super::http::{create_http_client, send_json};
use super::{ImageOutput, ProviderError};
use crate::store::{DialogEntry, Role};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::json;
use tracing::debug;

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.9;
const IMAGE_SIZE: &str = "1024x1024";
const IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    http_client: HttpClient,
    api_key: String,
}

impl OpenAiClient {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.clone());
        Self {
            client: Client::with_config(config),
            http_client: create_http_client(),
            api_key,
        }
    }

    /// Chat completion over the role-tagged dialog history.
    ///
    /// # Errors
    ///
    /// `Network` for connectivity failures, `Api` for provider rejections,
    /// `MalformedResponse` when no choice carries content.
    pub async fn chat(
        &self,
        model: &str,
        history: &[DialogEntry],
        text: &str,
    ) -> Result<String, ProviderError> {
        let messages = build_messages(history, text)?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .max_tokens(MAX_TOKENS)
            .temperature(TEMPERATURE)
            .build()
            .map_err(map_openai_error)?;

        debug!("OpenAI chat request for model {model}");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::MalformedResponse("no choices".to_string()))
    }

    /// Generate a 1024x1024 image and return its decoded bytes.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::chat`]; a response without `data` or with an
    /// undecodable payload is `MalformedResponse`.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<ImageOutput, ProviderError> {
        let body = json!({
            "model": model,
            "prompt": prompt,
            "n": 1,
            "size": IMAGE_SIZE,
            "response_format": "b64_json",
        });
        let auth = format!("Bearer {}", self.api_key);

        debug!("OpenAI image request for model {model}");
        let response = send_json(&self.http_client, IMAGES_URL, &body, &auth, &[]).await?;

        let encoded = response
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|first| first.get("b64_json"))
            .and_then(|b| b.as_str())
            .ok_or_else(|| ProviderError::MalformedResponse("no data".to_string()))?;

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(ImageOutput::Bytes(bytes))
    }
}

fn map_openai_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => ProviderError::Network(e.to_string()),
        OpenAIError::JSONDeserialize(e, _) => ProviderError::MalformedResponse(e.to_string()),
        other => ProviderError::Api(other.to_string()),
    }
}

/// Map the dialog history onto chat messages: each stored message keeps its
/// inferred role, each stored response becomes an assistant turn, and the new
/// text is appended with its own inferred role.
fn build_messages(
    history: &[DialogEntry],
    text: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 1);
    for entry in history {
        messages.push(request_message(entry.role, &entry.message)?);
        messages.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(entry.response.clone())
                .build()
                .map_err(map_openai_error)?
                .into(),
        );
    }
    messages.push(request_message(Role::infer(text), text)?);
    Ok(messages)
}

fn request_message(
    role: Role,
    content: &str,
) -> Result<ChatCompletionRequestMessage, ProviderError> {
    let message = match role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(map_openai_error)?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(map_openai_error)?
            .into(),
    };
    Ok(message)
}
