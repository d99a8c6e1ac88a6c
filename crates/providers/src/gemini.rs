//! Gemini provider implementation.
//!
//! Uses the Generative Language REST API (`models/{model}:generateContent`).
//!
//! Wire format notes:
//! - `x-goog-api-key` header authentication
//! - System prompt as top-level `systemInstruction`, not a content entry
//! - Function calling via `functionDeclarations` / `functionCall` /
//!   `functionResponse` parts; responses are addressed by function *name*
//! - Gemini issues no tool-call ids, so this adapter synthesizes UUIDs to
//!   keep correlation ids flowing through the conversation state

use async_trait::async_trait;
use serde::Deserialize;
use studyclaw_core::error::ProviderError;
use studyclaw_core::message::{Message, MessageToolCall, Role};
use studyclaw_core::provider::*;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini generateContent provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Extract system messages from the message list.
    /// Gemini takes the system prompt as a top-level field, not in contents.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Convert messages to Gemini `contents` entries.
    fn to_api_contents(messages: &[&Message]) -> Vec<serde_json::Value> {
        let mut result = Vec::new();

        for msg in messages {
            match msg.role {
                Role::User => {
                    result.push(serde_json::json!({
                        "role": "user",
                        "parts": [{ "text": msg.content }],
                    }));
                }
                Role::Assistant => {
                    let mut parts: Vec<serde_json::Value> = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(serde_json::json!({ "text": msg.content }));
                    }
                    for tc in &msg.tool_calls {
                        let args: serde_json::Value =
                            serde_json::from_str(&tc.arguments).unwrap_or_default();
                        parts.push(serde_json::json!({
                            "functionCall": { "name": tc.name, "args": args },
                        }));
                    }
                    result.push(serde_json::json!({
                        "role": "model",
                        "parts": parts,
                    }));
                }
                Role::Tool => {
                    // Function responses must be objects and are addressed
                    // by function name on this API.
                    let name = msg.tool_name.clone().unwrap_or_default();
                    let response = match serde_json::from_str::<serde_json::Value>(&msg.content) {
                        Ok(value) if value.is_object() => value,
                        _ => serde_json::json!({ "content": msg.content }),
                    };
                    result.push(serde_json::json!({
                        "role": "user",
                        "parts": [{
                            "functionResponse": { "name": name, "response": response },
                        }],
                    }));
                }
                Role::System => {} // handled separately
            }
        }

        result
    }

    /// Convert tool definitions to a Gemini `tools` entry.
    fn to_api_tools(tools: &[ToolDefinition]) -> serde_json::Value {
        let declarations: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        serde_json::json!([{ "functionDeclarations": declarations }])
    }

    fn response_to_provider_response(
        api_resp: GeminiResponse,
        requested_model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let candidate = api_resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "Gemini response contained no candidates".into(),
            })?;

        let mut text = String::new();
        let mut tool_calls: Vec<MessageToolCall> = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                tool_calls.push(MessageToolCall {
                    id: Uuid::new_v4().to_string(),
                    name: fc.name,
                    arguments: fc.args.to_string(),
                });
            }
        }

        let mut message = Message::assistant(text);
        message.tool_calls = tool_calls;

        let usage = api_resp.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_resp
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let (system, messages) = Self::extract_system(&request.messages);
        let contents = Self::to_api_contents(&messages);

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
            },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        if let Some(ref sys) = system {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": sys }] });
        }

        if !request.tools.is_empty() {
            body["tools"] = Self::to_api_tools(&request.tools);
        }

        debug!(provider = "gemini", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited { retry_after_secs: 5 });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            ));
        }
        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model.clone()));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: GeminiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        Self::response_to_provider_response(api_resp, &request.model)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- Wire format structs ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyclaw_core::provider::ModelTurn;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_request(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> ProviderRequest {
        ProviderRequest {
            model: "gemini-2.5-flash".into(),
            messages,
            temperature: 0.2,
            max_tokens: Some(512),
            tools,
        }
    }

    fn search_tool() -> ToolDefinition {
        ToolDefinition {
            name: "search_resources".into(),
            description: "Search for hands-on learning resources".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "topic": { "type": "string" } },
                "required": ["topic"]
            }),
        }
    }

    #[tokio::test]
    async fn parses_text_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "Plan complete." }] },
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 120,
                    "candidatesTokenCount": 8,
                    "totalTokenCount": 128
                },
                "modelVersion": "gemini-2.5-flash"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
        let response = provider
            .complete(test_request(vec![Message::user("go")], vec![]))
            .await
            .unwrap();

        assert_eq!(response.usage.as_ref().unwrap().total_tokens, 128);
        match response.into_turn() {
            ModelTurn::Final(text) => assert_eq!(text, "Plan complete."),
            ModelTurn::ToolCalls(_) => panic!("expected final text"),
        }
    }

    #[tokio::test]
    async fn parses_function_call_and_synthesizes_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            { "functionCall": { "name": "search_resources", "args": { "topic": "rust async" } } }
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
        let response = provider
            .complete(test_request(
                vec![Message::user("go")],
                vec![search_tool()],
            ))
            .await
            .unwrap();

        match response.into_turn() {
            ModelTurn::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "search_resources");
                assert!(!calls[0].id.is_empty());
                let args: serde_json::Value = serde_json::from_str(&calls[0].arguments).unwrap();
                assert_eq!(args["topic"], "rust async");
            }
            ModelTurn::Final(_) => panic!("expected tool call"),
        }
    }

    #[tokio::test]
    async fn sends_system_instruction_and_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "You are a learning planner." }] },
                "tools": [{ "functionDeclarations": [{ "name": "search_resources" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
        provider
            .complete(test_request(
                vec![
                    Message::system("You are a learning planner."),
                    Message::user("go"),
                ],
                vec![search_tool()],
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tool_result_is_sent_as_function_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "contents": [
                    { "role": "user" },
                    { "role": "model" },
                    { "role": "user", "parts": [{
                        "functionResponse": {
                            "name": "fetch_calendar",
                            "response": { "events": [] }
                        }
                    }] }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut assistant = Message::assistant("");
        assistant.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "fetch_calendar".into(),
            arguments: "{}".into(),
        }];

        let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
        provider
            .complete(test_request(
                vec![
                    Message::user("go"),
                    assistant,
                    Message::tool_result("call_1", "fetch_calendar", r#"{"events":[]}"#),
                ],
                vec![],
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rate_limit_maps_to_retryable_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
        let err = provider
            .complete(test_request(vec![Message::user("go")], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn auth_failure_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("bad-key").with_base_url(server.uri());
        let err = provider
            .complete(test_request(vec![Message::user("go")], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn empty_candidates_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("test-key").with_base_url(server.uri());
        let err = provider
            .complete(test_request(vec![Message::user("go")], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { .. }));
    }
}
