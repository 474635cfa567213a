//! Pluggable AI backends that propose a selector for a broken locator.
//!
//! Every provider speaks its own HTTP dialect but exposes the same
//! [`InferenceBackend::infer`] contract. Failures of any kind come back as
//! [`HealError::BackendCall`] so the healing procedure can degrade to
//! heuristics without knowing which provider is configured.

pub mod gemini;
pub mod openai;
pub mod prompt;

pub use gemini::GeminiBackend;
pub use openai::OpenAiCompatibleBackend;

use crate::core::{InferenceConfig, ProviderSettings};
use crate::errors::{HealError, Result};
use crate::types::HealingRequest;
use async_trait::async_trait;
use reqwest::Client;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &str;

    /// Ask the model for one selector matching the request's intent
    async fn infer(&self, request: &HealingRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Google,
    XAi,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Google => "google",
            Provider::XAi => "xai",
        }
    }

    fn settings<'a>(&self, config: &'a InferenceConfig) -> &'a ProviderSettings {
        match self {
            Provider::OpenAi => &config.openai,
            Provider::Google => &config.google,
            Provider::XAi => &config.xai,
        }
    }

    fn key_variable(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
            Provider::XAi => "XAI_API_KEY",
        }
    }
}

impl FromStr for Provider {
    type Err = HealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "google" | "gemini" => Ok(Provider::Google),
            "xai" | "grok" => Ok(Provider::XAi),
            other => Err(HealError::BackendConfig(format!(
                "unsupported AI provider: {other}"
            ))),
        }
    }
}

/// Credentials and endpoint resolved for one provider.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Resolve the configured provider into a ready backend.
///
/// Unknown providers, missing credentials and unusable base URLs fail here,
/// never at call time.
pub fn build_backend(config: &InferenceConfig) -> Result<Arc<dyn InferenceBackend>> {
    let provider: Provider = config.provider.parse()?;
    let settings = provider.settings(config);

    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            HealError::BackendConfig(format!(
                "API key not set for provider {} ({})",
                provider.name(),
                provider.key_variable()
            ))
        })?;

    url::Url::parse(&settings.api_base).map_err(|e| {
        HealError::BackendConfig(format!(
            "invalid base URL '{}' for provider {}: {e}",
            settings.api_base,
            provider.name()
        ))
    })?;

    let resolved = BackendSettings {
        api_key: api_key.to_string(),
        model: settings.model.clone(),
        api_base: settings.api_base.trim_end_matches('/').to_string(),
        temperature: config.temperature,
        timeout: Duration::from_millis(config.timeout_ms),
    };

    let backend: Arc<dyn InferenceBackend> = match provider {
        Provider::OpenAi | Provider::XAi => {
            Arc::new(OpenAiCompatibleBackend::new(provider.name(), resolved)?)
        }
        Provider::Google => Arc::new(GeminiBackend::new(resolved)?),
    };
    Ok(backend)
}

pub(crate) fn http_client(provider: &str, timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        HealError::BackendConfig(format!("failed to build HTTP client for {provider}: {e}"))
    })
}

/// Read a response body, turning transport failures and non-2xx statuses into `BackendCall`.
pub(crate) async fn read_body(
    provider: &str,
    response: std::result::Result<reqwest::Response, reqwest::Error>,
) -> Result<String> {
    let response = response
        .map_err(|e| HealError::backend_call(provider, e.status().map(|s| s.as_u16()), e.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "<response unavailable>".to_string());
    if !status.is_success() {
        return Err(HealError::backend_call(provider, Some(status.as_u16()), text));
    }
    Ok(text)
}
