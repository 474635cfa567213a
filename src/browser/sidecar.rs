//! Client for the optional HTTP browser sidecar.
//!
//! The sidecar owns a real browser and exposes a handful of tools as
//! `POST {base}/{tool}` endpoints taking and returning JSON.

use crate::core::{ElementHandle, PageTrait, SidecarConfig};
use crate::errors::{truncate_chars, HealError, Result};
use crate::types::ElementState;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const BODY_PREVIEW: usize = 200;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct SidecarClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DomResponse {
    dom: String,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: usize,
}

impl SidecarClient {
    pub fn new(config: &SidecarConfig) -> Result<Self> {
        url::Url::parse(&config.base_url).map_err(|e| {
            HealError::Configuration(format!("invalid sidecar URL '{}': {e}", config.base_url))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| HealError::Configuration(format!("failed to build sidecar client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn open_page(&self, url: &str) -> Result<()> {
        let _: Value = self.call("open_page", json!({ "url": url })).await?;
        Ok(())
    }

    pub async fn get_dom(&self) -> Result<String> {
        let response: DomResponse = self.call("get_dom", json!({})).await?;
        Ok(response.dom)
    }

    pub async fn query_selector(&self, selector: &str) -> Result<usize> {
        let response: CountResponse = self
            .call("query_selector", json!({ "selector": selector }))
            .await?;
        Ok(response.count)
    }

    pub async fn query_by_role(&self, role: &str, name: &str) -> Result<usize> {
        let response: CountResponse = self
            .call("query_by_role", json!({ "role": role, "name": name }))
            .await?;
        Ok(response.count)
    }

    async fn call<T: DeserializeOwned>(&self, tool: &str, body: Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, tool);
        debug!(target: "sidecar", tool, "calling sidecar");

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_connect() {
                HealError::Sidecar {
                    status: None,
                    detail: format!("not available at {}. Is the server running?", self.base_url),
                }
            } else {
                HealError::Sidecar {
                    status: e.status().map(|s| s.as_u16()),
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(HealError::Sidecar {
                status: Some(status.as_u16()),
                detail: truncate_chars(&text, BODY_PREVIEW),
            });
        }

        let is_json = content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"));
        if !is_json {
            return Err(HealError::Sidecar {
                status: Some(status.as_u16()),
                detail: format!(
                    "non-JSON response ({}): {}",
                    content_type.as_deref().unwrap_or("no content type"),
                    truncate_chars(&text, BODY_PREVIEW)
                ),
            });
        }

        serde_json::from_str(&text).map_err(|e| HealError::Sidecar {
            status: Some(status.as_u16()),
            detail: format!("unexpected {tool} response ({e}): {}", truncate_chars(&text, BODY_PREVIEW)),
        })
    }
}

/// A page living in the sidecar's browser.
///
/// Supports counting, attach/detach waits and DOM reads. The sidecar has no
/// action tools, so clicks, fills and text reads are rejected.
pub struct SidecarPage {
    client: Arc<SidecarClient>,
    url: RwLock<String>,
}

impl SidecarPage {
    pub fn new(client: Arc<SidecarClient>) -> Self {
        Self {
            client,
            url: RwLock::new(String::new()),
        }
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.client.open_page(url).await?;
        *self.url.write().await = url.to_string();
        Ok(())
    }

    pub async fn count_by_role(&self, role: &str, name: &str) -> Result<usize> {
        self.client.query_by_role(role, name).await
    }
}

#[async_trait]
impl PageTrait for SidecarPage {
    type Handle = SidecarElement;

    fn locator(&self, selector: &str) -> SidecarElement {
        SidecarElement {
            client: Arc::clone(&self.client),
            selector: selector.to_string(),
        }
    }

    async fn url(&self) -> Result<String> {
        Ok(self.url.read().await.clone())
    }

    async fn content(&self) -> Result<String> {
        self.client.get_dom().await
    }
}

pub struct SidecarElement {
    client: Arc<SidecarClient>,
    selector: String,
}

#[async_trait]
impl ElementHandle for SidecarElement {
    fn selector(&self) -> &str {
        &self.selector
    }

    async fn wait_for(&self, state: ElementState, timeout: Duration) -> Result<()> {
        let want_present = match state {
            ElementState::Attached => true,
            ElementState::Detached => false,
            other => {
                return Err(HealError::Unsupported(format!(
                    "sidecar cannot wait for {} state",
                    other.name()
                )))
            }
        };

        let start_time = Instant::now();
        loop {
            if (self.count().await? > 0) == want_present {
                return Ok(());
            }
            if start_time.elapsed() >= timeout {
                return Err(HealError::CandidateTimeout(format!(
                    "'{}' not {} after {}ms",
                    self.selector,
                    state.name(),
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn count(&self) -> Result<usize> {
        self.client.query_selector(&self.selector).await
    }

    async fn click(&self) -> Result<()> {
        Err(HealError::Unsupported("click through the sidecar".to_string()))
    }

    async fn fill(&self, _value: &str) -> Result<()> {
        Err(HealError::Unsupported("fill through the sidecar".to_string()))
    }

    async fn text_content(&self) -> Result<Option<String>> {
        Err(HealError::Unsupported("text_content through the sidecar".to_string()))
    }
}
