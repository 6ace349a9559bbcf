use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{DocumentEngine, PageSession, WaitUntil};
use crate::config::Credentials;
use crate::error::EngineError;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_SETTLE: Duration = Duration::from_millis(500);

/// Headless-Chrome document engine. One browser per run; every page session
/// is an isolated tab.
pub struct ChromiumEngine {
    browser: Browser,
    events: JoinHandle<()>,
}

impl ChromiumEngine {
    pub async fn launch() -> Result<Self, EngineError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(EngineError::Session)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|error| EngineError::Session(error.to_string()))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self { browser, events })
    }

    pub async fn shutdown(mut self) {
        if let Err(error) = self.browser.close().await {
            tracing::debug!("browser close failed: {}", error);
        }
        if let Err(error) = self.browser.wait().await {
            tracing::debug!("browser wait failed: {}", error);
        }
        self.events.abort();
    }
}

#[async_trait]
impl DocumentEngine for ChromiumEngine {
    async fn open(&self) -> Result<Box<dyn PageSession>, EngineError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|error| EngineError::Session(error.to_string()))?;
        Ok(Box::new(ChromiumSession { page: Some(page) }))
    }
}

struct ChromiumSession {
    page: Option<Page>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, EngineError> {
        self.page
            .as_ref()
            .ok_or_else(|| EngineError::Session("session already closed".to_string()))
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), EngineError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|error| EngineError::Navigation(error.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|error| EngineError::Navigation(error.to_string()))?;
        if wait == WaitUntil::NetworkIdle {
            // wait_for_navigation resolves on the load event; late
            // XHR-driven renders need a settle window on top.
            tokio::time::sleep(NETWORK_SETTLE).await;
        }
        Ok(())
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), EngineError> {
        let token = BASE64.encode(format!(
            "{}:{}",
            credentials.username, credentials.password
        ));
        let headers = serde_json::json!({ "Authorization": format!("Basic {}", token) });
        self.page()?
            .execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
            .await
            .map_err(|error| EngineError::Session(error.to_string()))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, EngineError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(EngineError::Evaluate)?;
        let result = self
            .page()?
            .evaluate(params)
            .await
            .map_err(|error| EngineError::Evaluate(error.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> bool {
        let Ok(page) = self.page() else {
            return false;
        };
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn content(&mut self) -> Result<String, EngineError> {
        self.page()?
            .content()
            .await
            .map_err(|error| EngineError::Content(error.to_string()))
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(error) = page.close().await {
                tracing::debug!("page close failed: {}", error);
            }
        }
    }
}
