//! Command transport over a raw Chromium DevTools websocket.
//!
//! A single background loop owns the websocket: commands arrive over an mpsc
//! channel, responses are matched back to callers through a `CallId` map.
//! Incoming protocol events are drained and dropped; the session layer polls
//! page state through `Runtime.evaluate` instead of consuming the event
//! stream.

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, MethodId, Message, Response};
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionErrorKind};

/// Addressing for one CDP command.
#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

/// Minimal command surface the session layer needs from a transport.
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), SessionError>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, SessionError>;
}

/// Transport that fails every command; used when no browser is reachable.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl CdpTransport for NoopTransport {
    async fn start(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, SessionError> {
        Err(SessionError::new(SessionErrorKind::Internal)
            .with_hint(format!("transport not available for method {method}")))
    }
}

struct ControlMessage {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value, SessionError>>,
}

/// Owns one launched (or attached) Chromium and its websocket loop.
pub struct ChromiumTransport {
    cfg: SessionConfig,
    state: OnceCell<Arc<RuntimeState>>,
}

impl ChromiumTransport {
    pub fn new(cfg: SessionConfig) -> Self {
        Self {
            cfg,
            state: OnceCell::new(),
        }
    }

    async fn runtime(&self) -> Result<&Arc<RuntimeState>, SessionError> {
        self.state
            .get_or_try_init(|| async { RuntimeState::start(self.cfg.clone()).await.map(Arc::new) })
            .await
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), SessionError> {
        let runtime = self.runtime().await?;
        let deadline = Duration::from_millis(self.cfg.default_deadline_ms);

        runtime
            .send_internal(
                CommandTarget::Browser,
                "Target.setAutoAttach",
                serde_json::json!({
                    "autoAttach": true,
                    "waitForDebuggerOnStart": false,
                    "flatten": true,
                }),
                deadline,
            )
            .await?;
        Ok(())
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, SessionError> {
        let runtime = self.runtime().await?;
        runtime
            .send_internal(
                target,
                method,
                params,
                Duration::from_millis(self.cfg.default_deadline_ms),
            )
            .await
    }
}

struct RuntimeState {
    command_tx: mpsc::Sender<ControlMessage>,
    loop_task: JoinHandle<()>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl RuntimeState {
    async fn start(cfg: SessionConfig) -> Result<Self, SessionError> {
        let (child, ws_url) = if let Some(url) = cfg.websocket_url.clone() {
            (None, url)
        } else {
            let browser_cfg = browser_config(&cfg)?;
            launch_browser(browser_cfg).await?
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| SessionError::new(SessionErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(128);
        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = alive.clone();

        let loop_task = tokio::spawn(async move {
            let result = run_loop(conn, command_rx).await;
            loop_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-session", ?err, "transport loop terminated with error");
            }
        });

        info!(target: "cdp-session", url = %ws_url, "chromium connection established");

        Ok(Self {
            command_tx,
            loop_task,
            child: Mutex::new(child),
            alive,
        })
    }

    async fn send_internal(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, SessionError> {
        if !self.alive.load(Ordering::Relaxed) {
            return Err(SessionError::new(SessionErrorKind::CdpIo)
                .with_hint("transport loop is no longer running"));
        }

        let (resp_tx, resp_rx) = oneshot::channel();
        let message = ControlMessage {
            target,
            method: method.to_string(),
            params,
            responder: resp_tx,
        };

        self.command_tx
            .send(message)
            .await
            .map_err(|err| SessionError::new(SessionErrorKind::CdpIo).with_hint(err.to_string()))?;

        match timeout(deadline, resp_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::new(SessionErrorKind::CdpIo)
                .with_hint("command response channel closed")),
            Err(_) => {
                Err(SessionError::new(SessionErrorKind::NavTimeout).with_hint("command timed out"))
            }
        }
    }
}

impl Drop for RuntimeState {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();

        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut child) = guard.take() {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "cdp-session", ?err, "failed to kill chromium child");
                        }
                    });
                } else {
                    debug!(target: "cdp-session", "no tokio runtime available to kill chromium child");
                }
            }
        }
    }
}

async fn run_loop(
    mut conn: Connection<CdpEventMessage>,
    mut command_rx: mpsc::Receiver<ControlMessage>,
) -> Result<(), SessionError> {
    let mut inflight: HashMap<CallId, oneshot::Sender<Result<Value, SessionError>>> =
        HashMap::new();

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                submit(&mut conn, cmd, &mut inflight)?;
            }
            message = conn.next() => {
                match message {
                    Some(Ok(Message::Response(resp))) => {
                        let entry = inflight.remove(&resp.id);
                        let result = extract_payload(resp);
                        if let Some(sender) = entry {
                            let _ = sender.send(result);
                        }
                    }
                    // Protocol events are not consumed by this engine.
                    Some(Ok(Message::Event(_))) => {}
                    Some(Err(err)) => {
                        let mapped = map_cdp_error(err);
                        for (_, sender) in inflight.drain() {
                            let _ = sender.send(Err(mapped.clone()));
                        }
                        return Err(mapped);
                    }
                    None => {
                        let err = SessionError::new(SessionErrorKind::CdpIo)
                            .with_hint("cdp connection closed");
                        for (_, sender) in inflight.drain() {
                            let _ = sender.send(Err(err.clone()));
                        }
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn submit(
    conn: &mut Connection<CdpEventMessage>,
    cmd: ControlMessage,
    inflight: &mut HashMap<CallId, oneshot::Sender<Result<Value, SessionError>>>,
) -> Result<(), SessionError> {
    let session = match cmd.target {
        CommandTarget::Browser => None,
        CommandTarget::Session(session_id) => Some(CdpSessionId::from(session_id)),
    };

    let method_id: MethodId = cmd.method.clone().into();
    match conn.submit_command(method_id, session, cmd.params) {
        Ok(call_id) => {
            inflight.insert(call_id, cmd.responder);
            Ok(())
        }
        Err(err) => {
            let mapped = SessionError::new(SessionErrorKind::CdpIo).with_hint(err.to_string());
            let _ = cmd.responder.send(Err(mapped.clone()));
            Err(mapped)
        }
    }
}

fn extract_payload(resp: Response) -> Result<Value, SessionError> {
    if let Some(result) = resp.result {
        Ok(result)
    } else if let Some(error) = resp.error {
        let retriable = error.code >= 500;
        Err(SessionError::new(SessionErrorKind::CdpIo)
            .with_hint(format!("cdp error {}: {}", error.code, error.message))
            .retriable(retriable))
    } else {
        Err(SessionError::new(SessionErrorKind::Internal).with_hint("empty cdp response"))
    }
}

fn map_cdp_error(err: CdpError) -> SessionError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => SessionError::new(SessionErrorKind::NavTimeout)
            .with_hint(hint)
            .retriable(true),
        CdpError::JavascriptException(_) | CdpError::Serde(_) => {
            SessionError::new(SessionErrorKind::Internal).with_hint(hint)
        }
        _ => SessionError::new(SessionErrorKind::CdpIo)
            .with_hint(hint)
            .retriable(true),
    }
}

fn browser_config(cfg: &SessionConfig) -> Result<BrowserConfig, SessionError> {
    if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
        return Err(SessionError::new(SessionErrorKind::CdpIo).with_hint(format!(
            "chrome executable not found at {} (set FUNNELPROBE_CHROME)",
            cfg.executable.display()
        )));
    }

    let profile_dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        let cwd = std::env::current_dir().map_err(|err| {
            SessionError::new(SessionErrorKind::Internal)
                .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
        })?;
        cwd.join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&profile_dir).map_err(|err| {
        SessionError::new(SessionErrorKind::Internal)
            .with_hint(format!("failed to ensure user-data-dir: {err}"))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(Duration::from_secs(20));

    if !cfg.headless {
        builder = builder.with_head();
    }

    if std::env::var("FUNNELPROBE_DISABLE_SANDBOX")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(false)
    {
        builder = builder.no_sandbox();
    }

    let mut args = vec![
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-breakpad",
        "--disable-client-side-phishing-detection",
        "--disable-default-apps",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-hang-monitor",
        "--disable-popup-blocking",
        "--disable-prompt-on-repost",
        "--disable-sync",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--remote-allow-origins=*",
        "--use-mock-keychain",
    ];
    if cfg.headless {
        args.push("--headless=new");
        args.push("--hide-scrollbars");
        args.push("--mute-audio");
    }
    builder = builder.args(args);

    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder = builder.user_data_dir(profile_dir);

    builder.build().map_err(|err| {
        SessionError::new(SessionErrorKind::Internal).with_hint(format!("browser config error: {err}"))
    })
}

async fn launch_browser(config: BrowserConfig) -> Result<(Option<Child>, String), SessionError> {
    let mut child = config.launch().map_err(|err| {
        SessionError::new(SessionErrorKind::Internal)
            .with_hint(format!("failed to launch chromium: {err}"))
    })?;

    let ws_url = extract_ws_url(&mut child).await?;
    Ok((Some(child), ws_url))
}

/// Extract the DevTools websocket URL from Chromium's stderr output.
async fn extract_ws_url(child: &mut Child) -> Result<String, SessionError> {
    let stderr = child.stderr.take().ok_or_else(|| {
        SessionError::new(SessionErrorKind::Internal)
            .with_hint("chromium process missing stderr handle")
    })?;
    let mut lines = BufReader::new(stderr).lines();

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| {
                SessionError::new(SessionErrorKind::CdpIo).with_hint(err.to_string())
            })?;
            if let Some((_, ws)) = line.rsplit_once("listening on ") {
                let ws = ws.trim();
                if ws.starts_with("ws") && ws.contains("devtools/browser") {
                    return Ok(ws.to_string());
                }
            }
        }
        Err(SessionError::new(SessionErrorKind::CdpIo)
            .with_hint("chromium exited before exposing devtools websocket url"))
    };

    timeout(Duration::from_secs(20), reader).await.map_err(|_| {
        SessionError::new(SessionErrorKind::NavTimeout)
            .with_hint("timed out waiting for chromium devtools websocket url")
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_transport_rejects_commands() {
        let transport = NoopTransport;
        transport.start().await.unwrap();
        let err = transport
            .send_command(CommandTarget::Browser, "Page.navigate", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind, SessionErrorKind::Internal);
        assert!(err.hint.unwrap().contains("Page.navigate"));
    }
}
