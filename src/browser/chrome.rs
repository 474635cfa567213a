use crate::core::{BrowserConfig, ElementHandle, PageTrait};
use crate::errors::{HealError, Result};
use crate::types::ElementState;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A live Chrome tab driven over CDP.
pub struct ChromePage {
    // Dropping the browser closes the tab, so it is kept alongside it.
    _browser: Browser,
    tab: Arc<Tab>,
    navigation_timeout: Duration,
}

impl ChromePage {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| HealError::Browser(format!("launch failed: {e}")))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| HealError::Browser(format!("launch failed: {e}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| HealError::Browser(format!("tab creation failed: {e}")))?;
        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        debug!(target: "browser", headless = config.headless, "chrome launched");

        Ok(Self {
            _browser: browser,
            tab,
            navigation_timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| HealError::Browser(format!("navigation failed: {e}")))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| HealError::Browser(format!("navigation failed: {e}")))?;

        wait_until(&self.tab, "document.readyState === 'complete'", self.navigation_timeout)
            .await
            .map_err(|_| HealError::Browser(format!("page load timeout: {url}")))?;

        Ok(())
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

#[async_trait]
impl PageTrait for ChromePage {
    type Handle = ChromeElement;

    fn locator(&self, selector: &str) -> ChromeElement {
        ChromeElement {
            tab: Arc::clone(&self.tab),
            selector: selector.to_string(),
        }
    }

    async fn url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn content(&self) -> Result<String> {
        evaluate(&self.tab, "document.documentElement.outerHTML")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| HealError::Browser("failed to get page source".to_string()))
    }
}

/// Selector-backed handle on a [`ChromePage`]; every call queries the live DOM.
#[derive(Clone)]
pub struct ChromeElement {
    tab: Arc<Tab>,
    selector: String,
}

impl ChromeElement {
    fn quoted(&self) -> String {
        Value::String(self.selector.clone()).to_string()
    }

    fn state_script(&self, state: ElementState) -> String {
        let selector = self.quoted();
        match state {
            ElementState::Attached => format!("document.querySelector({selector}) !== null"),
            ElementState::Detached => format!("document.querySelector({selector}) === null"),
            ElementState::Visible | ElementState::Hidden => {
                let visible = format!(
                    r#"
                    (function() {{
                        const element = document.querySelector({selector});
                        if (!element) return false;

                        const rect = element.getBoundingClientRect();
                        const style = window.getComputedStyle(element);

                        return rect.width > 0 &&
                               rect.height > 0 &&
                               style.visibility !== 'hidden' &&
                               style.display !== 'none';
                    }})()
                "#
                );
                if state == ElementState::Visible {
                    visible
                } else {
                    format!("!{visible}")
                }
            }
        }
    }
}

#[async_trait]
impl ElementHandle for ChromeElement {
    fn selector(&self) -> &str {
        &self.selector
    }

    async fn wait_for(&self, state: ElementState, timeout: Duration) -> Result<()> {
        wait_until(&self.tab, &self.state_script(state), timeout)
            .await
            .map_err(|e| match e {
                HealError::CandidateTimeout(_) => HealError::CandidateTimeout(format!(
                    "{} not {} after {}ms",
                    self.selector,
                    state.name(),
                    timeout.as_millis()
                )),
                other => other,
            })
    }

    async fn count(&self) -> Result<usize> {
        let script = format!("document.querySelectorAll({}).length", self.quoted());
        let value = evaluate(&self.tab, &script)?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self) -> Result<()> {
        self.tab
            .find_element(&self.selector)
            .map_err(|e| HealError::ElementNotFound(format!("{}: {e}", self.selector)))?
            .click()
            .map_err(HealError::from_any_error)?;

        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<()> {
        let element = self
            .tab
            .find_element(&self.selector)
            .map_err(|e| HealError::ElementNotFound(format!("{}: {e}", self.selector)))?;

        element.click().map_err(HealError::from_any_error)?;
        element.type_into(value).map_err(HealError::from_any_error)?;

        Ok(())
    }

    async fn text_content(&self) -> Result<Option<String>> {
        let script = format!(
            r#"
            (function() {{
                const element = document.querySelector({});
                return element ? element.textContent : null;
            }})()
        "#,
            self.quoted()
        );
        let value = evaluate(&self.tab, &script)?;
        Ok(value.as_str().map(str::to_string))
    }
}

fn evaluate(tab: &Tab, script: &str) -> Result<Value> {
    let result = tab
        .evaluate(script, false)
        .map_err(|e| HealError::Browser(format!("javascript failed: {e}")))?;
    Ok(result.value.unwrap_or(Value::Null))
}

/// Poll a boolean expression until it holds or `timeout` elapses.
async fn wait_until(tab: &Tab, script: &str, timeout: Duration) -> Result<()> {
    let start_time = Instant::now();

    loop {
        if evaluate(tab, script)?.as_bool() == Some(true) {
            return Ok(());
        }
        if start_time.elapsed() >= timeout {
            return Err(HealError::CandidateTimeout(format!(
                "condition not met after {}ms",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
