//! Shared HTTP plumbing for the raw-JSON provider endpoints.

use super::ProviderError;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Request timeout for provider HTTP calls. Generation endpoints can be
/// slow, so this is well above a chat round trip.
const HTTP_TIMEOUT_SECS: u64 = 120;

/// Build the HTTP client used by all raw-JSON provider calls.
#[must_use]
pub fn create_http_client() -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// POST a JSON body and parse the JSON response.
///
/// # Errors
///
/// `ProviderError::Network` on connectivity failure, `ProviderError::Api` on
/// a non-success status (body truncated into the message), and
/// `ProviderError::MalformedResponse` if the body is not valid JSON.
pub async fn send_json(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: &str,
    extra_headers: &[(&str, &str)],
) -> Result<Value, ProviderError> {
    let mut request = client.post(url).json(body).header("Authorization", auth_header);
    for (key, value) in extra_headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let truncated = if error_text.chars().count() > 300 {
            let head: String = error_text.chars().take(300).collect();
            format!("{head}...")
        } else {
            error_text
        };
        return Err(ProviderError::Api(format!("{status} - {truncated}")));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}
