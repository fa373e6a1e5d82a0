//! Checkout entry. Success is strictly an observed URL change from the
//! pre-attempt URL; anything else falls through to the next technique.

use std::time::Duration;

use cdp_session::PagePort;
use navigator::{safe_navigate, NavTimeouts, Pacing};
use platform_probe::SelectorBundle;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use super::{click_any, find_buttons_by_text, find_by_css};
use crate::error::StageError;

pub const CHECKOUT_TEXTS: &[&str] = &[
    "checkout",
    "check out",
    "proceed to checkout",
    "go to checkout",
    "secure checkout",
];

const CLICK_TIMEOUT: Duration = Duration::from_millis(1_200);

/// Drive checkout initiation: drawer-first when a drawer is already open,
/// then platform checkout controls, a canonical URL, and generic text.
pub async fn enter_checkout(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
    base: &Url,
    timeouts: &NavTimeouts,
    pacing: Pacing,
    drawer_open: bool,
) -> Result<String, StageError> {
    let pre = normalize(&page.current_url().await.unwrap_or_default());

    // An open drawer usually carries its own checkout control; starting there
    // avoids a redundant cart navigation.
    if drawer_open {
        if let Some(url) = attempt_controls(page, bundle, &pre, pacing, "drawer").await {
            return Ok(url);
        }
    }

    if let Some(url) = attempt_controls(page, bundle, &pre, pacing, "platform").await {
        return Ok(url);
    }

    if let Ok(url) = base.join("/checkout") {
        if safe_navigate(page, url.as_str(), timeouts).await {
            if let Some(changed) = url_changed(page, &pre).await {
                debug!(target: "journey-engine", technique = "canonical_url", "checkout entered");
                return Ok(changed);
            }
        }
    }

    let by_text = find_buttons_by_text(page, CHECKOUT_TEXTS, false, 3).await?;
    if !by_text.is_empty() && click_any(page, &by_text, CLICK_TIMEOUT).await {
        sleep(pacing.settle(Duration::from_millis(900))).await;
        if let Some(changed) = url_changed(page, &pre).await {
            debug!(target: "journey-engine", technique = "generic_text", "checkout entered");
            return Ok(changed);
        }
    }

    Err(StageError::CheckoutEntryFailed)
}

async fn attempt_controls(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
    pre: &str,
    pacing: Pacing,
    technique: &'static str,
) -> Option<String> {
    let candidates = find_by_css(page, &bundle.checkout_button, 2).await.ok()?;
    if candidates.is_empty() || !click_any(page, &candidates, CLICK_TIMEOUT).await {
        return None;
    }
    sleep(pacing.settle(Duration::from_millis(900))).await;
    let changed = url_changed(page, pre).await;
    if changed.is_some() {
        debug!(target: "journey-engine", technique, "checkout entered");
    }
    changed
}

async fn url_changed(page: &dyn PagePort, pre: &str) -> Option<String> {
    let current = page.current_url().await.ok()?;
    (normalize(&current) != pre).then_some(current)
}

fn normalize(url: &str) -> String {
    url.split('#').next().unwrap_or(url).trim_end_matches('/').to_string()
}
