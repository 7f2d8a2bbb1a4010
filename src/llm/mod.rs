//! OpenAI-compatible chat completions client
//!
//! One outbound call per invocation. Retries are deliberately absent:
//! callers that can degrade (intent detection) swallow the error and fall
//! back, callers that cannot (chat replies) surface it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single message in a chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Message role, `system` or `user`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Build a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Constrained output format for structured completions
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaFormat },
}

/// A named JSON schema the model output must conform to
#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    /// Schema name reported to the vendor
    pub name: String,
    /// Reject outputs that do not match the schema
    pub strict: bool,
    /// The schema itself
    pub schema: serde_json::Value,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for chat completions".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Override the API base URL, e.g. for a compatible proxy or a test server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The configured model name
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request a free-form completion, returning the assistant message text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the vendor rejects it, or the
    /// response carries no content
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.send(messages, None).await
    }

    /// Request a completion constrained to a JSON schema
    ///
    /// Returns the raw JSON text of the assistant message; the caller owns
    /// parsing and validation.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the vendor rejects it, or the
    /// response carries no content
    pub async fn chat_structured(
        &self,
        messages: &[ChatMessage],
        format: JsonSchemaFormat,
    ) -> Result<String> {
        self.send(messages, Some(ResponseFormat::JsonSchema { json_schema: format }))
            .await
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<String> {
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            structured = response_format.is_some(),
            "sending chat completion"
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            response_format,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(Error::Llm(format!("chat API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat completion response");
            e
        })?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Llm("chat completion contained no content".to_string()))?;

        tracing::debug!(chars = content.len(), "chat completion received");
        Ok(content)
    }
}
