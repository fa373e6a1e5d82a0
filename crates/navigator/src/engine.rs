use std::time::Duration;

use cdp_session::{PagePort, WaitGate};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::dismiss::{default_dismiss_strategies, dismiss_interstitials};

/// Speed profile scaling the deliberate pauses between interactions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    Fast,
    #[default]
    Normal,
    Careful,
}

impl Pacing {
    pub fn settle(&self, base: Duration) -> Duration {
        match self {
            Pacing::Fast => base / 2,
            Pacing::Normal => base,
            Pacing::Careful => base * 2,
        }
    }
}

/// Timeouts for the three-tier load wait cascade.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NavTimeouts {
    /// Primary tier: network idle.
    pub network_idle_ms: u64,
    /// Quiet window required by the network-idle gate.
    pub quiet_window_ms: u64,
    /// Shorter tier shared by the DOM-ready and bare-load gates.
    pub fallback_ms: u64,
}

impl Default for NavTimeouts {
    fn default() -> Self {
        Self {
            network_idle_ms: 12_000,
            quiet_window_ms: 500,
            fallback_ms: 6_000,
        }
    }
}

const SETTLE_BASE: Duration = Duration::from_millis(800);

/// Load `url` with the full wait cascade. Returns whether any readiness gate
/// was reached; failure is non-fatal and left to the caller to interpret.
pub async fn safe_navigate(page: &dyn PagePort, url: &str, timeouts: &NavTimeouts) -> bool {
    if let Err(err) = page.navigate(url).await {
        warn!(target: "navigator", %url, %err, "navigation dispatch failed");
        return false;
    }

    let cascade = [
        (
            WaitGate::NetworkQuiet {
                window_ms: timeouts.quiet_window_ms,
            },
            timeouts.network_idle_ms,
        ),
        (WaitGate::DomReady, timeouts.fallback_ms),
        (WaitGate::Load, timeouts.fallback_ms),
    ];

    for (gate, timeout_ms) in cascade {
        match page.wait(gate, Duration::from_millis(timeout_ms)).await {
            Ok(()) => {
                debug!(target: "navigator", %url, ?gate, "load gate reached");
                return true;
            }
            Err(err) => {
                debug!(target: "navigator", %url, ?gate, %err, "load gate missed, falling through");
            }
        }
    }

    warn!(target: "navigator", %url, "all load gates exhausted");
    false
}

/// Settle, trigger lazily-loaded content with a bottom-then-top scroll pass,
/// and clear any dismissible interstitial.
pub async fn post_load_pass(page: &dyn PagePort, pacing: Pacing) {
    sleep(pacing.settle(SETTLE_BASE)).await;

    scroll_pass(page, pacing).await;

    match dismiss_interstitials(page, &default_dismiss_strategies()).await {
        Some(technique) => {
            debug!(target: "navigator", technique, "interstitial dismissed");
        }
        None => {
            debug!(target: "navigator", "no dismissible interstitial");
        }
    }
}

async fn scroll_pass(page: &dyn PagePort, pacing: Pacing) {
    let to_bottom = "window.scrollTo({ top: document.body ? document.body.scrollHeight : 0, behavior: 'instant' })";
    let to_top = "window.scrollTo({ top: 0, behavior: 'instant' })";

    if let Err(err) = page.evaluate(to_bottom).await {
        debug!(target: "navigator", %err, "scroll-to-bottom failed");
        return;
    }
    sleep(pacing.settle(SETTLE_BASE) / 2).await;
    if let Err(err) = page.evaluate(to_top).await {
        debug!(target: "navigator", %err, "scroll-to-top failed");
    }
    sleep(pacing.settle(Duration::from_millis(200))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use cdp_session::{SessionError, SessionErrorKind};

    fn timeout_err() -> SessionError {
        SessionError::new(SessionErrorKind::NavTimeout)
    }

    #[tokio::test]
    async fn bare_load_gate_rescues_navigation() {
        let page = ScriptedPage::new("about:blank");
        page.queue_wait(Err(timeout_err()));
        page.queue_wait(Err(timeout_err()));
        page.queue_wait(Ok(()));

        let ok = safe_navigate(&page, "https://shop.example", &NavTimeouts::default()).await;
        assert!(ok);

        let waits: Vec<String> = page
            .journal()
            .into_iter()
            .filter(|entry| entry.starts_with("wait:"))
            .collect();
        assert_eq!(waits.len(), 3);
        assert!(waits[0].contains("NetworkQuiet"));
        assert!(waits[1].contains("DomReady"));
        assert!(waits[2].contains("Load"));
    }

    #[tokio::test]
    async fn exhausted_cascade_reports_failure() {
        let page = ScriptedPage::new("about:blank");
        for _ in 0..3 {
            page.queue_wait(Err(timeout_err()));
        }
        let ok = safe_navigate(&page, "https://shop.example", &NavTimeouts::default()).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn first_gate_success_skips_the_rest() {
        let page = ScriptedPage::new("about:blank");
        let ok = safe_navigate(&page, "https://shop.example", &NavTimeouts::default()).await;
        assert!(ok);
        let waits: Vec<String> = page
            .journal()
            .into_iter()
            .filter(|entry| entry.starts_with("wait:"))
            .collect();
        assert_eq!(waits.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_failure_skips_the_cascade() {
        let page = ScriptedPage::new("about:blank");
        page.queue_navigation(Err(SessionError::new(SessionErrorKind::CdpIo)));
        let ok = safe_navigate(&page, "https://shop.example", &NavTimeouts::default()).await;
        assert!(!ok);
        assert!(!page.journal().iter().any(|entry| entry.starts_with("wait:")));
    }

    #[tokio::test]
    async fn post_load_pass_scrolls_both_ways() {
        let page = ScriptedPage::new("https://shop.example");
        post_load_pass(&page, Pacing::Fast).await;
        let evals: Vec<String> = page
            .journal()
            .into_iter()
            .filter(|entry| entry.starts_with("eval:"))
            .collect();
        assert!(evals.iter().any(|entry| entry.contains("scrollHeight")));
        assert!(evals.iter().any(|entry| entry.contains("top: 0")));
    }

    #[test]
    fn pacing_scales_settle_pauses() {
        let base = Duration::from_millis(800);
        assert_eq!(Pacing::Fast.settle(base), Duration::from_millis(400));
        assert_eq!(Pacing::Normal.settle(base), base);
        assert_eq!(Pacing::Careful.settle(base), Duration::from_millis(1600));
    }
}
