//! Programmable page double for exercising the journey layers without a
//! browser.
//!
//! Tests script per-operation outcomes (navigation failures, wait-gate
//! timeouts, evaluate responses keyed by expression substrings) and inspect a
//! call journal afterwards.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{SessionError, SessionErrorKind};
use crate::page::{PagePort, WaitGate};

struct EvalRoute {
    pattern: String,
    once: VecDeque<Value>,
    sticky: Option<Value>,
}

struct RedirectRoute {
    pattern: String,
    url: String,
}

#[derive(Default)]
struct State {
    url: String,
    nav_results: VecDeque<Result<(), SessionError>>,
    wait_results: VecDeque<Result<(), SessionError>>,
    eval_routes: Vec<EvalRoute>,
    click_failures: Vec<String>,
    redirects: Vec<RedirectRoute>,
    screenshot: Vec<u8>,
    journal: Vec<String>,
    closed: bool,
}

/// Scripted [`PagePort`] implementation.
pub struct ScriptedPage {
    state: Mutex<State>,
}

impl ScriptedPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                url: url.into(),
                screenshot: b"scripted-png".to_vec(),
                ..State::default()
            }),
        }
    }

    /// Queue the outcome of the next `navigate` call. With an empty queue,
    /// navigations succeed.
    pub fn queue_navigation(&self, result: Result<(), SessionError>) {
        self.state.lock().nav_results.push_back(result);
    }

    /// Queue the outcome of the next `wait` call. With an empty queue, waits
    /// succeed.
    pub fn queue_wait(&self, result: Result<(), SessionError>) {
        self.state.lock().wait_results.push_back(result);
    }

    /// Every `evaluate` whose expression contains `pattern` returns `value`.
    pub fn on_eval(&self, pattern: impl Into<String>, value: Value) {
        let pattern = pattern.into();
        let mut state = self.state.lock();
        if let Some(route) = state.eval_routes.iter_mut().find(|r| r.pattern == pattern) {
            route.sticky = Some(value);
        } else {
            state.eval_routes.push(EvalRoute {
                pattern,
                once: VecDeque::new(),
                sticky: Some(value),
            });
        }
    }

    /// The next `evaluate` whose expression contains `pattern` returns
    /// `value` once; later matches fall back to any sticky value.
    pub fn on_eval_once(&self, pattern: impl Into<String>, value: Value) {
        let pattern = pattern.into();
        let mut state = self.state.lock();
        if let Some(route) = state.eval_routes.iter_mut().find(|r| r.pattern == pattern) {
            route.once.push_back(value);
        } else {
            state.eval_routes.push(EvalRoute {
                pattern,
                once: VecDeque::from([value]),
                sticky: None,
            });
        }
    }

    /// Clicks on selectors containing `pattern` fail with `TargetNotFound`.
    pub fn fail_clicks_matching(&self, pattern: impl Into<String>) {
        self.state.lock().click_failures.push(pattern.into());
    }

    /// Clicks on selectors containing `pattern` move the page to `url`,
    /// simulating a navigation side effect.
    pub fn redirect_on_click(&self, pattern: impl Into<String>, url: impl Into<String>) {
        self.state.lock().redirects.push(RedirectRoute {
            pattern: pattern.into(),
            url: url.into(),
        });
    }

    pub fn set_screenshot(&self, bytes: Vec<u8>) {
        self.state.lock().screenshot = bytes;
    }

    pub fn set_current_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    pub fn closed(&self) -> bool {
        self.state.lock().closed
    }

    fn record(&self, entry: String) {
        self.state.lock().journal.push(entry);
    }
}

#[async_trait]
impl PagePort for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.record(format!("navigate:{url}"));
        let mut state = self.state.lock();
        let result = state.nav_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.url = url.to_string();
        }
        result
    }

    async fn wait(&self, gate: WaitGate, _timeout: Duration) -> Result<(), SessionError> {
        self.record(format!("wait:{gate:?}"));
        self.state.lock().wait_results.pop_front().unwrap_or(Ok(()))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, SessionError> {
        let preview: String = expression.chars().take(48).collect();
        self.record(format!("eval:{preview}"));

        let mut state = self.state.lock();
        for route in state.eval_routes.iter_mut() {
            if expression.contains(&route.pattern) {
                if let Some(value) = route.once.pop_front() {
                    return Ok(value);
                }
                if let Some(value) = &route.sticky {
                    return Ok(value.clone());
                }
            }
        }
        Ok(Value::Null)
    }

    async fn click(&self, selector: &str, _deadline: Duration) -> Result<(), SessionError> {
        self.record(format!("click:{selector}"));
        let mut state = self.state.lock();
        if state
            .click_failures
            .iter()
            .any(|pattern| selector.contains(pattern.as_str()))
        {
            return Err(SessionError::new(SessionErrorKind::TargetNotFound)
                .with_hint(format!("no visible element for selector '{selector}'")));
        }
        let redirect = state
            .redirects
            .iter()
            .find(|route| selector.contains(route.pattern.as_str()))
            .map(|route| route.url.clone());
        if let Some(url) = redirect {
            state.url = url;
        }
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        _deadline: Duration,
    ) -> Result<(), SessionError> {
        self.record(format!("type:{selector}={text}"));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        self.record(format!("key:{key}"));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.state.lock().url.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.record("screenshot".to_string());
        Ok(self.state.lock().screenshot.clone())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.record("close".to_string());
        self.state.lock().closed = true;
        Ok(())
    }
}
