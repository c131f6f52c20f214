use async_trait::async_trait;
use log::{ debug, warn };
use reqwest::{ Client as HttpClient, StatusCode, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::Deserialize;

use super::{ CompletionClient, LlmError };
use super::request::ResponsesRequest;
use crate::models::chat::{ CompletionResult, TokenUsage };

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for the OpenAI Responses API.
pub struct OpenAIResponsesClient {
    http: HttpClient,
    endpoint: String,
}

#[derive(Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponsesUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAIResponsesClient {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self, LlmError> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL);
        let endpoint = if base.ends_with("/v1/responses") {
            base.to_string()
        } else {
            format!("{}/v1/responses", base.trim_end_matches('/'))
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
            LlmError::RequestFailed(format!("Invalid API key format: {}", e))
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAIResponsesClient {
    async fn complete(&self, request: &ResponsesRequest) -> Result<CompletionResult, LlmError> {
        debug!(
            "POST {} model={} messages={} tools={}",
            self.endpoint,
            request.model,
            request.input.len(),
            request.tools.len()
        );

        let resp = self.http
            .post(&self.endpoint)
            .json(request)
            .send().await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            let message = upstream_error_message(status, &body);
            warn!("Completion request rejected ({}): {}", status, message);
            return Err(LlmError::RequestFailed(message));
        }

        parse_response(&body)
    }
}

/// The `error.message` of an OpenAI error body if there is one, else the status line.
pub fn upstream_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}

pub fn parse_response(body: &str) -> Result<CompletionResult, LlmError> {
    let resp: ResponsesResponse = serde_json
        ::from_str(body)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    if let Some(error) = resp.error {
        return Err(LlmError::RequestFailed(error.message));
    }

    let text = resp.output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|part| part.content_type == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(LlmError::MalformedResponse("No response received".to_string()));
    }

    let usage = resp.usage
        .map(|u| {
            let prompt = u.input_tokens.unwrap_or(0);
            let completion = u.output_tokens.unwrap_or(0);
            TokenUsage {
                prompt,
                completion,
                total: u.total_tokens.unwrap_or(prompt.saturating_add(completion)),
            }
        })
        .unwrap_or_default();

    Ok(CompletionResult { text, usage })
}
