use crate::core::{ElementHandle, PageTrait};
use crate::errors::{HealError, Result};
use crate::types::ElementState;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// An interaction recorded by [`HtmlPage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Click(String),
    Fill { selector: String, value: String },
}

#[derive(Debug)]
struct Document {
    url: RwLock<String>,
    html: RwLock<String>,
    actions: Mutex<Vec<PageAction>>,
}

/// In-memory page over a markup string.
///
/// Selectors are evaluated with `scraper` on every call, so swapping the
/// markup with [`HtmlPage::set_html`] behaves like the live DOM drifting
/// underneath a test.
#[derive(Clone)]
pub struct HtmlPage {
    doc: Arc<Document>,
}

impl HtmlPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            doc: Arc::new(Document {
                url: RwLock::new(url.into()),
                html: RwLock::new(html.into()),
                actions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub async fn set_html(&self, html: impl Into<String>) {
        *self.doc.html.write().await = html.into();
    }

    pub async fn navigate(&self, url: impl Into<String>, html: impl Into<String>) {
        *self.doc.url.write().await = url.into();
        self.set_html(html).await;
    }

    pub async fn actions(&self) -> Vec<PageAction> {
        self.doc.actions.lock().await.clone()
    }
}

#[async_trait]
impl PageTrait for HtmlPage {
    type Handle = HtmlElement;

    fn locator(&self, selector: &str) -> HtmlElement {
        HtmlElement {
            doc: Arc::clone(&self.doc),
            selector: selector.to_string(),
        }
    }

    async fn url(&self) -> Result<String> {
        Ok(self.doc.url.read().await.clone())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.doc.html.read().await.clone())
    }
}

#[derive(Debug)]
pub struct HtmlElement {
    doc: Arc<Document>,
    selector: String,
}

#[derive(Debug)]
struct Match {
    text: String,
    visible: bool,
}

impl HtmlElement {
    async fn matches(&self) -> Result<Vec<Match>> {
        let html = self.doc.html.read().await;
        query(&html, &self.selector)
    }

    fn state_reached(state: ElementState, matches: &[Match]) -> bool {
        match state {
            ElementState::Attached => !matches.is_empty(),
            ElementState::Detached => matches.is_empty(),
            ElementState::Visible => matches.iter().any(|m| m.visible),
            ElementState::Hidden => !matches.iter().any(|m| m.visible),
        }
    }

    async fn require_first(&self) -> Result<Match> {
        self.matches()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HealError::ElementNotFound(self.selector.clone()))
    }
}

#[async_trait]
impl ElementHandle for HtmlElement {
    fn selector(&self) -> &str {
        &self.selector
    }

    async fn wait_for(&self, state: ElementState, timeout: Duration) -> Result<()> {
        let start_time = Instant::now();
        loop {
            let matches = self.matches().await?;
            if Self::state_reached(state, &matches) {
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
        Ok(self.matches().await?.len())
    }

    async fn click(&self) -> Result<()> {
        self.require_first().await?;
        self.doc
            .actions
            .lock()
            .await
            .push(PageAction::Click(self.selector.clone()));
        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<()> {
        self.require_first().await?;
        self.doc.actions.lock().await.push(PageAction::Fill {
            selector: self.selector.clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn text_content(&self) -> Result<Option<String>> {
        Ok(Some(self.require_first().await?.text))
    }
}

fn query(html: &str, selector: &str) -> Result<Vec<Match>> {
    let parsed = Selector::parse(selector)
        .map_err(|e| HealError::InvalidSelector(format!("{selector}: {e:?}")))?;
    let document = Html::parse_document(html);
    let matches = document
        .select(&parsed)
        .map(|element_ref| Match {
            text: element_ref.text().collect::<String>(),
            visible: is_visible(&element_ref),
        })
        .collect();
    Ok(matches)
}

fn is_visible(element_ref: &ElementRef) -> bool {
    let element = element_ref.value();
    if element.attr("hidden").is_some() {
        return false;
    }
    let style = element
        .attr("style")
        .map(|s| s.replace(' ', "").to_lowercase())
        .unwrap_or_default();
    !style.contains("display:none") && !style.contains("visibility:hidden")
}
