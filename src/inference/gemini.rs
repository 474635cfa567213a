use crate::errors::{HealError, Result};
use crate::inference::prompt::{clean_selector, single_prompt};
use crate::inference::{http_client, read_body, BackendSettings, InferenceBackend};
use crate::types::HealingRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "google";

/// Google Gemini `generateContent` backend.
pub struct GeminiBackend {
    client: Client,
    settings: BackendSettings,
}

impl GeminiBackend {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        if settings.api_key.is_empty() {
            return Err(HealError::BackendConfig(
                "missing API key for google".to_string(),
            ));
        }
        let client = http_client(PROVIDER, settings.timeout)?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl InferenceBackend for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn infer(&self, request: &HealingRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.api_base, self.settings.model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(single_prompt(request)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
            },
        };

        debug!(
            target: "inference",
            provider = PROVIDER,
            model = %self.settings.model,
            attempt = %request.attempt_id,
            "requesting locator"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await;
        let text = read_body(PROVIDER, response).await?;
        parse_generate_response(&text).map_err(|detail| HealError::backend_call(PROVIDER, None, detail))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

fn parse_generate_response(body: &str) -> std::result::Result<String, String> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed response ({e}): {body}"))?;
    let text = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>()
        })
        .ok_or_else(|| format!("response missing candidates: {body}"))?;
    clean_selector(&text).ok_or_else(|| format!("empty locator in response: {body}"))
}
