use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{
    ApiError, ChatRequest, ChatResponse, Choice, LlmProvider, ProviderError, Usage,
};

const CHAT_PATH: &str = "/v1/chat/completions";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Build a provider, optionally routing every request through `proxy`.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        proxy: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = build_request_body(req);
        let url = format!("{}{}", self.base_url, CHAT_PATH);

        debug!(model = %req.model, messages = req.messages.len(), "sending request to OpenAI");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if status.is_success() {
            let api_resp: ApiResponse =
                serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;
            return Ok(parse_response(api_resp));
        }

        // Error statuses normally carry an `{"error": {...}}` envelope; that is
        // relayed to the user rather than treated as a transport failure.
        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(api_resp) if api_resp.error.is_some() => {
                warn!(status = status.as_u16(), "OpenAI returned an error descriptor");
                Ok(parse_response(api_resp))
            }
            _ => {
                warn!(status = status.as_u16(), body = %text, "OpenAI API error");
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    message: text,
                })
            }
        }
    }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model,
        "messages": req.messages,
    })
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    let choices = resp
        .choices
        .into_iter()
        .map(|c| Choice {
            content: c.message.content.unwrap_or_default(),
            finish_reason: c.finish_reason,
        })
        .collect();

    let usage = resp
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    let error = resp.error.map(|e| ApiError {
        message: e.message.unwrap_or_default(),
        kind: e.kind,
        code: e.code.map(|c| match c {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }),
    });

    ChatResponse {
        model: resp.model.unwrap_or_default(),
        choices,
        usage,
        error,
    }
}

// OpenAI API response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    // OpenAI sends either a string code or null; some compatible servers send numbers.
    code: Option<serde_json::Value>,
}
