//! Direct REST client for an OpenAI-compatible Chat Completions endpoint.
//!
//! Configuration priority: ~/.config/jieri/secret.json > environment variables

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::AgentError;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// What the model came back with: a direct answer, or a request that the
/// caller execute a tool and feed its result back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmReply {
    /// Free-form text answer
    Text(String),
    /// Structured tool-invocation request
    ToolCall(ToolCallRequest),
}

/// A model-issued request to invoke a registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back with the tool result
    pub id: String,
    /// Registered tool name
    pub name: String,
    /// Raw JSON arguments string as produced by the model
    pub arguments: String,
}

/// The seam between the assistant and whichever model backs it.
///
/// Production uses [`OpenAiClient`]; tests substitute scripted
/// implementations.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Sends the conversation so far, with the given tool schemas offered,
    /// and returns the model's reply variant.
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmReply, AgentError>;
}

/// Client that talks to an OpenAI-compatible chat completions HTTP API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAiClient {
    /// Creates a new client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Loads configuration from ~/.config/jieri/secret.json or environment
    /// variables.
    ///
    /// Priority:
    /// 1. ~/.config/jieri/secret.json
    /// 2. Environment variables (OPENAI_API_KEY, OPENAI_MODEL_NAME,
    ///    OPENAI_BASE_URL)
    ///
    /// Model name defaults to `gpt-4o` if not specified.
    pub fn try_from_env() -> Result<Self, AgentError> {
        if let Ok(secret_config) = config::load_secret_config() {
            if let Some(openai_config) = secret_config.openai {
                let model = openai_config
                    .model_name
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into());
                let mut client = Self::new(openai_config.api_key, model);
                if let Some(base_url) = openai_config.base_url {
                    client = client.with_base_url(base_url);
                }
                return Ok(client);
            }
        }

        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            AgentError::Config(
                "OPENAI_API_KEY not found in ~/.config/jieri/secret.json or environment variables"
                    .into(),
            )
        })?;

        let model = env::var("OPENAI_MODEL_NAME").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.into());
        let mut client = Self::new(api_key, model);
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            client = client.with_base_url(base_url);
        }
        Ok(client)
    }

    /// Overrides the model after construction.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the endpoint, e.g. for an Azure or local deployment.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    async fn send_request(&self, body: &ChatCompletionRequest<'_>) -> Result<LlmReply, AgentError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| AgentError::ProcessError {
                status_code: None,
                message: format!("chat completion request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            AgentError::Other(format!("failed to parse chat completion response: {err}"))
        })?;

        extract_reply(parsed)
    }
}

#[async_trait]
impl Llm for OpenAiClient {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmReply, AgentError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        self.send_request(&request).await
    }
}

/// One message of the conversation being sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain("system", text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain("assistant", text)
    }

    /// User message carrying both text and an image data URL.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: Some(MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    url: image_url.into(),
                },
            ])),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message echoing a tool call, as the wire protocol requires
    /// before the matching tool result can be appended.
    pub fn assistant_tool_call(call: &ToolCallRequest) -> Self {
        Self {
            role: "assistant",
            content: None,
            tool_calls: Some(vec![ToolCallPayload {
                id: call.id.clone(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            }]),
            tool_call_id: None,
        }
    }

    /// Tool-role message feeding an executed tool's result back to the model.
    pub fn tool_result(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            role: "tool",
            content: Some(MessageContent::Text(result.into())),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: &'static str, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(text.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Message content: plain text, or multimodal parts.
#[derive(Debug, Clone)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

// Plain text serializes as a bare string, parts as the typed array the
// multimodal API expects.
impl Serialize for MessageContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            MessageContent::Text(text) => serializer.serialize_str(text),
            MessageContent::Parts(parts) => parts.serialize(serializer),
        }
    }
}

impl Serialize for ContentPart {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;

        match self {
            ContentPart::Text { text } => {
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
            }
            ContentPart::ImageUrl { url } => {
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry("image_url", &ImageUrl { url: url.clone() })?;
            }
        }

        map.end()
    }
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// Schema advertising one registered tool to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionSpec {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function",
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallPayload>>,
}

/// Wire form of a tool call, both in responses and when echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[allow(dead_code)]
    r#type: Option<String>,
    #[allow(dead_code)]
    code: Option<String>,
}

fn extract_reply(response: ChatCompletionResponse) -> Result<LlmReply, AgentError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| {
            AgentError::ExecutionFailed("chat completion response contained no choices".into())
        })?;

    if let Some(calls) = message.tool_calls {
        if let Some(call) = calls.into_iter().next() {
            return Ok(LlmReply::ToolCall(ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            }));
        }
    }

    message.content.map(LlmReply::Text).ok_or_else(|| {
        AgentError::ExecutionFailed("chat completion response contained no content".into())
    })
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> AgentError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.clone());

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    if let Some(delay) = retry_after {
        AgentError::process_error_with_retry_after(status.as_u16(), message, is_retryable, delay)
    } else {
        AgentError::ProcessError {
            status_code: Some(status.as_u16()),
            message,
            is_retryable,
            retry_after: None,
        }
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reply_prefers_tool_calls() {
        let raw = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_calendar_events", "arguments": "{\"input\":\"2024-10\"}"}
                    }]
                }
            }]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();

        match extract_reply(response).unwrap() {
            LlmReply::ToolCall(call) => {
                assert_eq!(call.name, "get_calendar_events");
                assert_eq!(call.arguments, r#"{"input":"2024-10"}"#);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_reply_plain_text() {
        let raw = r#"{"choices": [{"message": {"content": "**國慶日** 10月10日"}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(
            extract_reply(response).unwrap(),
            LlmReply::Text("**國慶日** 10月10日".to_string())
        );
    }

    #[test]
    fn test_extract_reply_empty_response_is_error() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            extract_reply(response),
            Err(AgentError::ExecutionFailed(_))
        ));
    }

    #[test]
    fn test_map_http_error_retryable_statuses() {
        let err = map_http_error(StatusCode::TOO_MANY_REQUESTS, "{}".into(), None);
        assert!(err.is_retryable());

        let err = map_http_error(StatusCode::UNAUTHORIZED, "{}".into(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_map_http_error_unwraps_error_body() {
        let body = r#"{"error": {"message": "invalid api key", "type": null, "code": null}}"#;
        let err = map_http_error(StatusCode::UNAUTHORIZED, body.into(), None);
        match err {
            AgentError::ProcessError { message, .. } => assert_eq!(message, "invalid api key"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let header = HeaderValue::from_static("30");
        assert_eq!(
            parse_retry_after(Some(&header)),
            Some(Duration::from_secs(30))
        );
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_tool_message_serialization() {
        let message = ChatMessage::tool_result("call_1", r#"{"Result":[]}"#);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["content"], r#"{"Result":[]}"#);
    }

    #[test]
    fn test_user_with_image_serializes_as_parts() {
        let message = ChatMessage::user_with_image("這張圖片是什麼節日?", "data:image/png;base64,AAAA");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_tool_spec_serialization() {
        let spec = ToolSpec::function(
            "get_calendar_events",
            "Fetch calendar events",
            serde_json::json!({"type": "object"}),
        );
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "get_calendar_events");
    }
}
