//! Chromium-backed sessions: one isolated browser context + page target per
//! journey, all commands routed through the shared transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionErrorKind};
use crate::page::{PagePort, SessionFactory, WaitGate};
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Creates one fresh, isolated browsing session per journey against a shared
/// launched browser process.
pub struct ChromiumSessionFactory {
    cfg: SessionConfig,
    transport: Arc<dyn CdpTransport>,
    started: OnceCell<()>,
}

impl ChromiumSessionFactory {
    pub fn new(cfg: SessionConfig) -> Self {
        let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(cfg: SessionConfig, transport: Arc<dyn CdpTransport>) -> Self {
        Self {
            cfg,
            transport,
            started: OnceCell::new(),
        }
    }

    async fn ensure_started(&self) -> Result<(), SessionError> {
        self.started
            .get_or_try_init(|| async { self.transport.start().await })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn create_session(&self) -> Result<Arc<dyn PagePort>, SessionError> {
        self.ensure_started().await?;

        let context = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.createBrowserContext",
                json!({ "disposeOnDetach": true }),
            )
            .await?;
        let context_id = string_field(&context, "browserContextId")?;

        let target = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": context_id }),
            )
            .await?;
        let target_id = string_field(&target, "targetId")?;

        let attached = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;

        debug!(target: "cdp-session", %target_id, "browsing session created");

        Ok(Arc::new(ChromiumSession {
            transport: Arc::clone(&self.transport),
            cfg: self.cfg.clone(),
            target_id,
            context_id,
            session_id,
        }))
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, SessionError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            SessionError::new(SessionErrorKind::Internal)
                .with_hint(format!("cdp response missing '{field}'"))
        })
}

/// One exclusively-owned page target. All DOM work goes through
/// `Runtime.evaluate`; pointer and keyboard input through the Input domain.
pub struct ChromiumSession {
    transport: Arc<dyn CdpTransport>,
    cfg: SessionConfig,
    target_id: String,
    context_id: String,
    session_id: String,
}

impl ChromiumSession {
    async fn send(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        self.transport
            .send_command(
                CommandTarget::Session(self.session_id.clone()),
                method,
                params,
            )
            .await
    }

    async fn eval_value(&self, expression: &str) -> Result<Value, SessionError> {
        let response = self
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            return Err(SessionError::new(SessionErrorKind::Internal)
                .with_hint(format!("script raised exception: {details}")));
        }

        Ok(response
            .get("result")
            .and_then(|res| res.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Poll for a visible match of `selector`, scroll it into view, and
    /// return its center point.
    async fn locate_center(
        &self,
        selector: &str,
        deadline: Duration,
    ) -> Result<(f64, f64), SessionError> {
        let selector_literal = serde_json::to_string(selector).map_err(|err| {
            SessionError::new(SessionErrorKind::Internal).with_hint(err.to_string())
        })?;
        let expression = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) {{ return {{ status: 'not-found' }}; }}
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                if (style.display === 'none' || style.visibility === 'hidden'
                    || (rect.width <= 0 && rect.height <= 0)) {{
                    return {{ status: 'hidden' }};
                }}
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                const r = el.getBoundingClientRect();
                return {{ status: 'ok', x: r.left + r.width / 2, y: r.top + r.height / 2 }};
            }})()"#,
            selector = selector_literal,
        );

        let deadline_at = Instant::now() + deadline;
        loop {
            let value = self.eval_value(&expression).await?;
            let status = value
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            if status == "ok" {
                let x = value.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let y = value.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);
                return Ok((x, y));
            }
            if Instant::now() >= deadline_at {
                return Err(SessionError::new(SessionErrorKind::TargetNotFound)
                    .with_hint(format!("no visible element for selector '{selector}'")));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_ready_state(
        &self,
        accept_interactive: bool,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let deadline_at = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline_at {
                return Err(SessionError::new(SessionErrorKind::NavTimeout)
                    .with_hint("readyState gate timed out"));
            }
            let value = self.eval_value("document.readyState").await?;
            let ready = value
                .as_str()
                .map(|state| state == "complete" || (accept_interactive && state == "interactive"))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Quiet-window probe over the page's resource-timing buffer: the network
    /// is considered idle once the document is complete and no resource entry
    /// has finished within `window_ms`.
    async fn wait_for_network_quiet(
        &self,
        window_ms: u64,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let expression = r#"(() => {
            let last = 0;
            for (const entry of performance.getEntriesByType('resource')) {
                const end = entry.responseEnd || entry.startTime;
                if (end > last) { last = end; }
            }
            return { now: performance.now(), last, state: document.readyState };
        })()"#;

        let deadline_at = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline_at {
                return Err(SessionError::new(SessionErrorKind::NavTimeout)
                    .with_hint("network-quiet gate timed out"));
            }
            let value = self.eval_value(expression).await?;
            let complete = value
                .get("state")
                .and_then(|v| v.as_str())
                .map(|state| state == "complete")
                .unwrap_or(false);
            let now = value.get("now").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let last = value.get("last").and_then(|v| v.as_f64()).unwrap_or(0.0);
            if complete && now - last >= window_ms as f64 {
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PagePort for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let response = self.send("Page.navigate", json!({ "url": url })).await?;
        if let Some(text) = response.get("errorText").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                return Err(SessionError::new(SessionErrorKind::CdpIo)
                    .with_hint(format!("navigation failed: {text}")));
            }
        }
        Ok(())
    }

    async fn wait(&self, gate: WaitGate, timeout: Duration) -> Result<(), SessionError> {
        match gate {
            WaitGate::DomReady => self.wait_for_ready_state(true, timeout).await,
            WaitGate::Load => self.wait_for_ready_state(false, timeout).await,
            WaitGate::NetworkQuiet { window_ms } => {
                self.wait_for_network_quiet(window_ms, timeout).await
            }
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, SessionError> {
        self.eval_value(expression).await
    }

    async fn click(&self, selector: &str, deadline: Duration) -> Result<(), SessionError> {
        let (x, y) = self.locate_center(selector, deadline).await?;

        self.send(
            "Input.dispatchMouseEvent",
            json!({
                "type": "mousePressed",
                "x": x,
                "y": y,
                "button": "left",
                "buttons": 1,
                "clickCount": 1,
                "pointerType": "mouse",
            }),
        )
        .await?;
        self.send(
            "Input.dispatchMouseEvent",
            json!({
                "type": "mouseReleased",
                "x": x,
                "y": y,
                "button": "left",
                "buttons": 1,
                "clickCount": 1,
                "pointerType": "mouse",
            }),
        )
        .await?;
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        deadline: Duration,
    ) -> Result<(), SessionError> {
        let selector_literal = serde_json::to_string(selector).map_err(|err| {
            SessionError::new(SessionErrorKind::Internal).with_hint(err.to_string())
        })?;
        let focus_expression = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) {{ return {{ status: 'not-found' }}; }}
                if (typeof el.focus === 'function') {{ el.focus(); }}
                if (typeof el.select === 'function') {{ try {{ el.select(); }} catch (err) {{}} }}
                return {{ status: 'focused' }};
            }})()"#,
            selector = selector_literal,
        );

        let deadline_at = Instant::now() + deadline;
        loop {
            let value = self.eval_value(&focus_expression).await?;
            let status = value
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            match status {
                "focused" => break,
                "not-found" => {
                    if Instant::now() >= deadline_at {
                        return Err(SessionError::new(SessionErrorKind::TargetNotFound)
                            .with_hint(format!("selector '{selector}' not found before deadline")));
                    }
                    sleep(POLL_INTERVAL).await;
                }
                other => {
                    return Err(SessionError::new(SessionErrorKind::Internal)
                        .with_hint(format!("failed to focus '{selector}' (status: {other})")));
                }
            }
        }

        self.send("Input.insertText", json!({ "text": text })).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        let code = match key {
            "Escape" => 27,
            "Enter" => 13,
            "Tab" => 9,
            _ => 0,
        };
        self.send(
            "Input.dispatchKeyEvent",
            json!({
                "type": "rawKeyDown",
                "key": key,
                "windowsVirtualKeyCode": code,
                "nativeVirtualKeyCode": code,
            }),
        )
        .await?;
        self.send(
            "Input.dispatchKeyEvent",
            json!({
                "type": "keyUp",
                "key": key,
                "windowsVirtualKeyCode": code,
                "nativeVirtualKeyCode": code,
            }),
        )
        .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        let value = self.eval_value("window.location.href").await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                SessionError::new(SessionErrorKind::Internal)
                    .with_hint("location.href did not return a string")
            })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        let response = self
            .send("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = response
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SessionError::new(SessionErrorKind::Internal).with_hint("missing screenshot data")
            })?;
        Base64
            .decode(data)
            .map_err(|err| SessionError::new(SessionErrorKind::Internal).with_hint(err.to_string()))
    }

    async fn close(&self) -> Result<(), SessionError> {
        let result = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await;
        if let Err(err) = &result {
            warn!(target: "cdp-session", ?err, "target close failed");
        }

        // Context disposal also drops cookies and storage for the journey.
        let disposed = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.disposeBrowserContext",
                json!({ "browserContextId": self.context_id }),
            )
            .await;
        if let Err(err) = disposed {
            debug!(target: "cdp-session", ?err, "browser context disposal failed");
        }

        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingTransport {
        fn respond(method: &str) -> Value {
            match method {
                "Target.createBrowserContext" => json!({ "browserContextId": "ctx-1" }),
                "Target.createTarget" => json!({ "targetId": "target-1" }),
                "Target.attachToTarget" => json!({ "sessionId": "session-1" }),
                "Runtime.evaluate" => json!({ "result": { "value": "complete" } }),
                "Page.captureScreenshot" => json!({ "data": Base64.encode(b"png-bytes") }),
                _ => json!({}),
            }
        }
    }

    #[async_trait]
    impl CdpTransport for RecordingTransport {
        async fn start(&self) -> Result<(), SessionError> {
            // Mirrors the real transport's startup, which auto-attaches to
            // new targets before any session is created.
            self.calls
                .lock()
                .push(("browser".to_string(), "Target.setAutoAttach".to_string()));
            Ok(())
        }

        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            _params: Value,
        ) -> Result<Value, SessionError> {
            let routed = match target {
                CommandTarget::Browser => "browser".to_string(),
                CommandTarget::Session(id) => id,
            };
            self.calls.lock().push((routed, method.to_string()));
            Ok(Self::respond(method))
        }
    }

    fn factory() -> (ChromiumSessionFactory, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let factory = ChromiumSessionFactory::with_transport(
            SessionConfig::default(),
            transport.clone() as Arc<dyn CdpTransport>,
        );
        (factory, transport)
    }

    #[tokio::test]
    async fn create_session_builds_isolated_context_and_target() {
        let (factory, transport) = factory();
        let _session = factory.create_session().await.unwrap();

        let calls = transport.calls.lock();
        let methods: Vec<&str> = calls.iter().map(|(_, m)| m.as_str()).collect();
        assert_eq!(
            methods,
            vec![
                "Target.setAutoAttach",
                "Target.createBrowserContext",
                "Target.createTarget",
                "Target.attachToTarget",
            ]
        );
    }

    #[tokio::test]
    async fn session_commands_are_routed_to_the_attached_session() {
        let (factory, transport) = factory();
        let session = factory.create_session().await.unwrap();
        session.navigate("https://shop.example").await.unwrap();
        session.press_key("Escape").await.unwrap();

        let calls = transport.calls.lock();
        let nav = calls.iter().find(|(_, m)| m == "Page.navigate").unwrap();
        assert_eq!(nav.0, "session-1");
        let keys: Vec<_> = calls
            .iter()
            .filter(|(_, m)| m == "Input.dispatchKeyEvent")
            .collect();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn screenshot_decodes_base64_payload() {
        let (factory, _) = factory();
        let session = factory.create_session().await.unwrap();
        let bytes = session.screenshot().await.unwrap();
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn close_disposes_target_and_context() {
        let (factory, transport) = factory();
        let session = factory.create_session().await.unwrap();
        session.close().await.unwrap();

        let calls = transport.calls.lock();
        assert!(calls.iter().any(|(_, m)| m == "Target.closeTarget"));
        assert!(calls.iter().any(|(_, m)| m == "Target.disposeBrowserContext"));
    }
}
