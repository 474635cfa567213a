use crate::dom::HtmlPage;
use crate::errors::{HealError, Result};
use crate::healing::{HealingLocator, HealingStore};
use crate::inference::InferenceBackend;
use crate::types::HealingRequest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestHelper;

impl TestHelper {
    pub fn html_page(html: &str) -> Arc<HtmlPage> {
        Arc::new(HtmlPage::new("https://www.saucedemo.com/", html))
    }

    /// A store in a fresh temporary directory; keep the `TempDir` alive for the test.
    pub fn temp_store() -> Result<(TempDir, Arc<HealingStore>)> {
        let dir = tempfile::tempdir()?;
        let store = HealingStore::open(dir.path().join("healerStore.json"))?;
        Ok((dir, Arc::new(store)))
    }

    /// A locator with a short attach timeout so misses are quick.
    pub fn locator(page: Arc<HtmlPage>, store: Arc<HealingStore>) -> HealingLocator<HtmlPage> {
        HealingLocator::new(page, store).with_attach_timeout(Duration::from_millis(100))
    }

    pub fn login_page_html() -> &'static str {
        r#"<html><body>
            <form id="login">
              <input id="user-name" name="user-name" data-test="username">
              <input id="password" name="password" type="password" data-test="password">
              <input id="login-button" type="submit" data-test="login-button" value="Login">
            </form>
            <div class="error-message-container error"><h3 data-test="error">Epic sadface: Username is required</h3></div>
        </body></html>"#
    }

    pub fn inventory_html() -> &'static str {
        r#"<html><body>
            <div class="inventory_list">
              <div class="inventory_item"><div class="inventory_item_description">Backpack</div></div>
              <div class="inventory_item"><div class="inventory_item_description">Bike Light</div></div>
            </div>
        </body></html>"#
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Selector(String),
    Fail { status: Option<u16>, detail: String },
}

/// Inference backend with a canned reply that records what it was asked.
pub struct StubBackend {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<HealingRequest>>,
}

impl StubBackend {
    pub fn answering(selector: &str) -> Arc<Self> {
        Arc::new(Self::with_reply(Reply::Selector(selector.to_string())))
    }

    pub fn failing(status: Option<u16>, detail: &str) -> Arc<Self> {
        Arc::new(Self::with_reply(Reply::Fail {
            status,
            detail: detail.to_string(),
        }))
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HealingRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn infer(&self, request: &HealingRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match &self.reply {
            Reply::Selector(selector) => Ok(selector.clone()),
            Reply::Fail { status, detail } => Err(HealError::backend_call("stub", *status, detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ElementHandle, PageTrait};

    #[tokio::test]
    async fn test_fixture_pages_parse() {
        let page = TestHelper::html_page(TestHelper::inventory_html());
        assert_eq!(page.locator(".inventory_item").count().await.unwrap(), 2);

        page.set_html(TestHelper::login_page_html()).await;
        assert_eq!(page.locator("[data-test=\"error\"]").count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stub_backend_records_requests() {
        let stub = StubBackend::failing(Some(429), "rate limited");
        let request = HealingRequest::new("cartPage.checkout", "https://x", "<html></html>");
        let err = stub.infer(&request).await.unwrap_err();

        assert!(matches!(err, HealError::BackendCall { status: Some(429), .. }));
        assert_eq!(stub.calls(), 1);
        assert_eq!(stub.requests()[0].logical_name, "cartPage.checkout");
    }
}
