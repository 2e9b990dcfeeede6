//! Replicate integration: text completion, image generation, and audio
//! transcription via the predictions API.
//!
//! Predictions are created with the `Prefer: wait` header so the call blocks
//! server-side until the model finishes, matching the one-shot semantics of
//! the handlers.

#![allow(clippy::non_std_lazy_statics)]

use super::http::{create_http_client, send_json};
use super::{ImageOutput, ProviderError};
use crate::registry::NetworkEntry;
use crate::store::CompletionEntry;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use lazy_regex::lazy_regex;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const PREDICTIONS_URL: &str = "https://api.replicate.com/v1/predictions";

/// Completions sometimes echo the context format back; strip any leaked
/// `AnswerN:` prefixes from the output.
static RE_ANSWER: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"Answer\d+:\s*");

pub struct ReplicateClient {
    http_client: HttpClient,
    api_key: String,
}

impl ReplicateClient {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: create_http_client(),
            api_key,
        }
    }

    /// One-shot text completion with the conversation context folded into
    /// the prompt.
    ///
    /// # Errors
    ///
    /// `Network`/`Api` per the shared HTTP helper; `MalformedResponse` when
    /// the prediction output carries no text.
    pub async fn complete(
        &self,
        network: &NetworkEntry,
        history: &[CompletionEntry],
        text: &str,
    ) -> Result<String, ProviderError> {
        let prompt = format_with_context(history, text);
        let output = self.predict(network, json!({ "prompt": prompt })).await?;
        let raw = join_text_output(&output)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices".to_string()))?;
        Ok(RE_ANSWER.replace_all(&raw, "").trim().to_string())
    }

    /// Generate an image and return its hosted URL.
    ///
    /// # Errors
    ///
    /// `MalformedResponse` when the prediction output carries no URL.
    pub async fn generate_image(
        &self,
        network: &NetworkEntry,
        prompt: &str,
    ) -> Result<ImageOutput, ProviderError> {
        let input = json!({
            "prompt": prompt,
            "width": 768,
            "height": 768,
            "prompt_strength": 0.8,
            "num_outputs": 1,
            "num_inference_steps": 50,
            "guidance_scale": 7.5,
            "scheduler": "DPMSolverMultistep",
        });
        let output = self.predict(network, input).await?;
        let url = first_text_output(&output)
            .ok_or_else(|| ProviderError::MalformedResponse("no data".to_string()))?;
        Ok(ImageOutput::Url(url))
    }

    /// Transcribe a voice note; returns the first segment's text.
    ///
    /// # Errors
    ///
    /// `MalformedResponse` when the output has no `segments`.
    pub async fn transcribe(
        &self,
        network: &NetworkEntry,
        audio: &[u8],
        language: Option<&str>,
    ) -> Result<String, ProviderError> {
        let data_uri = format!("data:audio/ogg;base64,{}", BASE64.encode(audio));
        let mut input = json!({
            "audio": data_uri,
            "transcription": "plain text",
        });
        if let (Some(lang), Some(map)) = (language, input.as_object_mut()) {
            map.insert("language".to_string(), json!(lang));
        }
        let output = self.predict(network, input).await?;
        output
            .get("segments")
            .and_then(|s| s.get(0))
            .and_then(|first| first.get("text"))
            .and_then(Value::as_str)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| ProviderError::MalformedResponse("no segments".to_string()))
    }

    /// Create a prediction and wait for its output.
    async fn predict(&self, network: &NetworkEntry, input: Value) -> Result<Value, ProviderError> {
        let (url, body) = if network.version.is_empty() {
            (
                format!("https://api.replicate.com/v1/models/{}/predictions", network.name),
                json!({ "input": input }),
            )
        } else {
            (
                PREDICTIONS_URL.to_string(),
                json!({ "version": network.version, "input": input }),
            )
        };
        let auth = format!("Bearer {}", self.api_key);

        debug!("Replicate request for {}", network.name);
        let response = send_json(
            &self.http_client,
            &url,
            &body,
            &auth,
            &[("Prefer", "wait")],
        )
        .await?;

        if let Some(error) = response.get("error").and_then(Value::as_str) {
            return Err(ProviderError::Api(error.to_string()));
        }
        if response.get("status").and_then(Value::as_str) == Some("failed") {
            return Err(ProviderError::Api("prediction failed".to_string()));
        }
        response
            .get("output")
            .filter(|o| !o.is_null())
            .cloned()
            .ok_or_else(|| ProviderError::MalformedResponse("no output".to_string()))
    }
}

/// Fold history into the prompt:
///
/// ```text
/// Prompt1: Hello
/// Answer1: Hi
/// Prompt2: How are you?
/// ```
fn format_with_context(history: &[CompletionEntry], text: &str) -> String {
    if history.is_empty() {
        return text.to_string();
    }
    let mut result = String::new();
    for (i, entry) in history.iter().enumerate() {
        let n = i + 1;
        result.push_str(&format!("Prompt{n}: {}\n", entry.message));
        result.push_str(&format!("Answer{n}: {}\n", entry.response));
    }
    result.push_str(&format!("Prompt{}: {text}\n", history.len() + 1));
    result
}

/// Text models return either a string or a list of string chunks.
fn join_text_output(output: &Value) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: String = parts.iter().filter_map(Value::as_str).collect();
            Some(joined)
        }
        _ => None,
    }
}

/// Image models return a URL or a list of URLs; take the first.
fn first_text_output(output: &Value) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => parts.first().and_then(Value::as_str).map(String::from),
        _ => None,
    }
}
