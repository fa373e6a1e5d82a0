use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SessionError;

/// Readiness gates a caller can wait on after dispatching a navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitGate {
    /// Document parsed (`readyState` interactive or complete).
    DomReady,
    /// Bare load event (`readyState` complete).
    Load,
    /// Load complete and no resource fetched for `window_ms`.
    NetworkQuiet { window_ms: u64 },
}

/// The minimal page capability surface the journey layers program against.
///
/// Every wait is bounded by an explicit deadline; implementations must never
/// block past it.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Dispatch a navigation. Readiness is a separate concern: pair with
    /// [`PagePort::wait`].
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    async fn wait(&self, gate: WaitGate, timeout: Duration) -> Result<(), SessionError>;

    /// Evaluate a script in the page, returning its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value, SessionError>;

    /// Click the first visible element matching `selector`, polling for it
    /// until `deadline`.
    async fn click(&self, selector: &str, deadline: Duration) -> Result<(), SessionError>;

    /// Focus the element matching `selector` and insert `text`.
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        deadline: Duration,
    ) -> Result<(), SessionError>;

    /// Dispatch a raw key press (e.g. `"Escape"`).
    async fn press_key(&self, key: &str) -> Result<(), SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    /// Capture a PNG of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, SessionError>;

    /// Dispose the underlying browsing target. Idempotent.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Produces isolated browsing sessions, one per journey.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self) -> Result<Arc<dyn PagePort>, SessionError>;
}
