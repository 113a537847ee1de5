//! OpenAI-compatible chat completions backend (Ollama, llama.cpp, vLLM, ...).

use std::time::Duration;

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Role, ToolCall, ToolSpec, Usage,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Local Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
/// Ollama ignores the key, but OpenAI-style clients always send one.
pub const DEFAULT_API_KEY: &str = "ollama";
pub const DEFAULT_MODEL: &str = "mistral-nemo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    // Local runtimes mishandle `null` content, so absent text is sent as "".
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default, deserialize_with = "arguments_string")]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Arguments are specified as a JSON string, but some servers send the object.
fn arguments_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings for a chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatCompletionsConfig {
    pub base_url: String,
    /// Sent as a bearer token; omitted when empty.
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Upper bound on a whole completion request, in seconds.
    pub timeout_secs: u64,
}

impl Default for ChatCompletionsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl ChatCompletionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat completions backend.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, ModelError> {
        let timeout = config.timeout();
        Self::with_timeout(config, timeout)
    }

    /// Like [`OpenAiBackend::new`] with a sub-second timeout override.
    pub fn with_timeout(config: ChatCompletionsConfig, timeout: Duration) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
            api_key: Some(config.api_key).filter(|key| !key.is_empty()),
            temperature: config.temperature,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn message_to_api(msg: &Message) -> ApiMessage<'_> {
        ApiMessage {
            role: Self::role_to_api(msg.role),
            content: msg.content.as_deref().unwrap_or_default(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| ApiToolCall {
                    id: Some(call.id.clone()),
                    kind: function_kind(),
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.as_deref(),
            name: msg.name.as_deref(),
        }
    }

    fn build_request<'a>(&'a self, request: &ModelRequest<'a>) -> ApiRequest<'a> {
        let tools: Vec<ApiTool<'a>> = request
            .tools
            .iter()
            .map(|spec| ApiTool {
                kind: "function",
                function: spec,
            })
            .collect();

        ApiRequest {
            model: &self.model,
            messages: request.messages.iter().map(Self::message_to_api).collect(),
            tool_choice: (!tools.is_empty()).then(|| request.tool_choice.as_str()),
            tools,
            temperature: self.temperature,
            stream: false,
        }
    }

    fn response_to_model(api_response: ApiResponse) -> ModelResponse {
        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| {
                let calls = choice
                    .message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|call| ToolCall {
                        id: call
                            .id
                            .filter(|id| !id.is_empty())
                            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                        name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect();
                Message::assistant_calls(choice.message.content, calls)
            })
            .collect();

        let usage = api_response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        ModelResponse { choices, usage }
    }
}

impl std::fmt::Display for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({}, endpoint={})", self.model, self.endpoint)
    }
}

impl Backend for OpenAiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = self.build_request(&request);
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.len(),
            "model request"
        );

        let mut req = self.client.post(&self.endpoint).json(&api_request);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.timeout)
            } else {
                ModelError::Network(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.timeout)
            } else {
                ModelError::InvalidResponse(e.to_string())
            }
        })?;

        let response = Self::response_to_model(api_response);
        debug!(
            choices = response.choices.len(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "model response"
        );
        Ok(response)
    }
}
