//! Capability interface for the navigable-document engine. The pipeline
//! only speaks these traits, so the browser backend stays swappable and the
//! core is testable against a scripted mock.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::EngineError;

pub mod chromium;
pub use chromium::ChromiumEngine;

/// How long to let a navigation settle before handing the document over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The load event fired.
    Load,
    /// The load event fired and the network went mostly idle.
    NetworkIdle,
}

/// One isolated, script-capable loaded page instance. Exclusively owned by
/// the worker that opened it; must be closed on every exit path.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`. Errors carry a classifiable message.
    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<(), EngineError>;

    /// Apply HTTP Basic credentials to all subsequent requests.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), EngineError>;

    /// Execute a script against the live DOM and return its serialized
    /// result.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, EngineError>;

    /// Wait for a selector to appear. Returns false on timeout; never errors.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> bool;

    /// The rendered document HTML.
    async fn content(&mut self) -> Result<String, EngineError>;

    /// Release the session. Idempotent.
    async fn close(&mut self);
}

#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Open a fresh isolated session.
    async fn open(&self) -> Result<Box<dyn PageSession>, EngineError>;
}
