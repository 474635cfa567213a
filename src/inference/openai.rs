use crate::errors::{HealError, Result};
use crate::inference::prompt::{clean_selector, user_prompt, SYSTEM_INSTRUCTION};
use crate::inference::{http_client, read_body, BackendSettings, InferenceBackend};
use crate::types::HealingRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Chat-completions backend; serves OpenAI and OpenAI-compatible APIs such as xAI.
pub struct OpenAiCompatibleBackend {
    provider: &'static str,
    client: Client,
    settings: BackendSettings,
}

impl OpenAiCompatibleBackend {
    pub fn new(provider: &'static str, settings: BackendSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(HealError::BackendConfig(format!(
                "missing API key for {provider}"
            )));
        }
        let client = http_client(provider, settings.timeout)?;
        Ok(Self {
            provider,
            client,
            settings,
        })
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        self.provider
    }

    async fn infer(&self, request: &HealingRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.settings.api_base);
        let body = ChatCompletionRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_INSTRUCTION.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(request),
                },
            ],
        };

        debug!(
            target: "inference",
            provider = self.provider,
            model = %self.settings.model,
            attempt = %request.attempt_id,
            "requesting locator"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await;
        let text = read_body(self.provider, response).await?;
        parse_chat_response(&text).map_err(|detail| HealError::backend_call(self.provider, None, detail))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

impl ChatCompletionContent {
    fn as_text(&self) -> String {
        match self {
            ChatCompletionContent::Text(value) => value.clone(),
            ChatCompletionContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Extract the selector from a chat-completions payload; the error string is the diagnostic.
fn parse_chat_response(body: &str) -> std::result::Result<String, String> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response ({e}): {body}"))?;
    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_ref())
        .map(ChatCompletionContent::as_text)
        .ok_or_else(|| format!("response missing content: {body}"))?;
    clean_selector(&content).ok_or_else(|| format!("empty locator in response: {body}"))
}
