//! Interstitial (cookie banner / locale prompt / signup modal) dismissal.
//!
//! An ordered table of `{technique, pattern}` strategies is tried in
//! sequence; the first technique that actuates a control ends the pass.
//! Finding nothing to dismiss is a normal outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cdp_session::{PagePort, SessionError};
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

const DISMISS_ATTR: &str = "data-funnelprobe-dismiss";

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_token() -> String {
    format!("dismiss-{}", TOKEN_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// One dismissal technique with its pattern payload.
#[derive(Clone, Debug)]
pub enum DismissTechnique {
    /// Button/link text equals one of the targets (case-insensitive, trimmed).
    ExactText(&'static [&'static str]),
    /// Button/link text contains one of the targets.
    FuzzyText(&'static [&'static str]),
    /// First visible match among CSS selector patterns.
    CssPattern(&'static [&'static str]),
    /// Fuzzy text match inside same-origin iframes (consent managers).
    IframeText(&'static [&'static str]),
    EscapeKey,
    BackdropClick,
}

impl DismissTechnique {
    pub fn label(&self) -> &'static str {
        match self {
            DismissTechnique::ExactText(_) => "exact_text",
            DismissTechnique::FuzzyText(_) => "fuzzy_text",
            DismissTechnique::CssPattern(_) => "css_pattern",
            DismissTechnique::IframeText(_) => "iframe_text",
            DismissTechnique::EscapeKey => "escape_key",
            DismissTechnique::BackdropClick => "backdrop_click",
        }
    }
}

/// A technique plus the visibility timeout it is allowed.
#[derive(Clone, Debug)]
pub struct DismissStrategy {
    pub technique: DismissTechnique,
    pub timeout_ms: u64,
}

const EXACT_TEXTS: &[&str] = &[
    "accept",
    "accept all",
    "accept all cookies",
    "accept cookies",
    "i agree",
    "agree",
    "allow all",
    "got it",
    "ok",
    "okay",
    "continue",
    "close",
    "no thanks",
    "no, thanks",
    "stay on this site",
];

const FUZZY_TEXTS: &[&str] = &[
    "accept",
    "agree",
    "allow",
    "got it",
    "continue to site",
    "no thanks",
    "dismiss",
];

const CSS_PATTERNS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    ".cc-allow",
    ".cc-dismiss",
    "[id*='cookie'] button[id*='accept']",
    "[class*='cookie'] button[class*='accept']",
    "[class*='consent'] button[class*='accept']",
    "[class*='newsletter'] [class*='close']",
    "[class*='modal'] [class*='close']",
    "[class*='popup'] [class*='close']",
    "[aria-label='Close']",
    "[aria-label='close']",
    "button.close",
];

const IFRAME_TEXTS: &[&str] = &["accept", "agree", "allow all", "got it"];

/// The built-in dismissal order. Layer timeouts stay inside the 0.3–1.5 s
/// visibility band.
pub fn default_dismiss_strategies() -> Vec<DismissStrategy> {
    vec![
        DismissStrategy {
            technique: DismissTechnique::ExactText(EXACT_TEXTS),
            timeout_ms: 1_000,
        },
        DismissStrategy {
            technique: DismissTechnique::FuzzyText(FUZZY_TEXTS),
            timeout_ms: 800,
        },
        DismissStrategy {
            technique: DismissTechnique::CssPattern(CSS_PATTERNS),
            timeout_ms: 800,
        },
        DismissStrategy {
            technique: DismissTechnique::IframeText(IFRAME_TEXTS),
            timeout_ms: 1_500,
        },
        DismissStrategy {
            technique: DismissTechnique::EscapeKey,
            timeout_ms: 300,
        },
        DismissStrategy {
            technique: DismissTechnique::BackdropClick,
            timeout_ms: 500,
        },
    ]
}

/// Run the strategy table against the page. Returns the label of the first
/// technique that actuated a control, `None` when nothing was dismissible.
pub async fn dismiss_interstitials(
    page: &dyn PagePort,
    strategies: &[DismissStrategy],
) -> Option<&'static str> {
    for strategy in strategies {
        let label = strategy.technique.label();
        match try_technique(page, strategy).await {
            Ok(true) => {
                sleep(Duration::from_millis(250)).await;
                return Some(label);
            }
            Ok(false) => {}
            Err(err) => {
                debug!(target: "navigator", technique = label, %err, "dismiss technique errored");
            }
        }
    }
    None
}

async fn try_technique(
    page: &dyn PagePort,
    strategy: &DismissStrategy,
) -> Result<bool, SessionError> {
    let timeout = Duration::from_millis(strategy.timeout_ms);
    match &strategy.technique {
        DismissTechnique::ExactText(texts) => {
            click_tagged(page, &text_finder_script(texts, true)?, timeout).await
        }
        DismissTechnique::FuzzyText(texts) => {
            click_tagged(page, &text_finder_script(texts, false)?, timeout).await
        }
        DismissTechnique::CssPattern(selectors) => {
            click_tagged(page, &css_finder_script(selectors)?, timeout).await
        }
        DismissTechnique::IframeText(texts) => {
            let value = page.evaluate(&iframe_click_script(texts)?).await?;
            Ok(status_of(&value) == "clicked")
        }
        DismissTechnique::EscapeKey => {
            if !overlay_visible(page).await? {
                return Ok(false);
            }
            page.press_key("Escape").await?;
            Ok(true)
        }
        DismissTechnique::BackdropClick => {
            let value = page.evaluate(BACKDROP_CLICK_SCRIPT).await?;
            Ok(status_of(&value) == "clicked")
        }
    }
}

/// Evaluate a finder script that tags its match, then click the tagged
/// element through the input pipeline.
async fn click_tagged(
    page: &dyn PagePort,
    script: &str,
    timeout: Duration,
) -> Result<bool, SessionError> {
    let value = page.evaluate(script).await?;
    if status_of(&value) != "ok" {
        return Ok(false);
    }
    let selector = match value.get("selector").and_then(|v| v.as_str()) {
        Some(selector) => selector.to_string(),
        None => return Ok(false),
    };
    page.click(&selector, timeout).await?;
    Ok(true)
}

fn status_of(value: &Value) -> &str {
    value.get("status").and_then(|v| v.as_str()).unwrap_or("")
}

fn js_string_array(items: &[&str]) -> Result<String, SessionError> {
    serde_json::to_string(items).map_err(|err| {
        SessionError::new(cdp_session::SessionErrorKind::Internal).with_hint(err.to_string())
    })
}

fn text_finder_script(texts: &[&str], exact: bool) -> Result<String, SessionError> {
    let token = next_token();
    Ok(format!(
        r#"(() => {{
            const targets = {targets};
            const exact = {exact};
            const attr = '{attr}';
            const token = '{token}';
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            const candidates = Array.from(document.querySelectorAll(
                'button, a, [role="button"], input[type="button"], input[type="submit"]'));
            const match = candidates.find(el => {{
                if (!isVisible(el)) return false;
                const value = ((el.innerText || el.textContent || el.value || '') + '')
                    .trim().toLowerCase();
                if (!value || value.length > 60) return false;
                return exact ? targets.includes(value)
                             : targets.some(t => value.includes(t));
            }});
            if (!match) {{ return {{ status: 'not-found' }}; }}
            match.setAttribute(attr, token);
            return {{ status: 'ok', selector: '[' + attr + '="' + token + '"]' }};
        }})()"#,
        targets = js_string_array(texts)?,
        exact = if exact { "true" } else { "false" },
        attr = DISMISS_ATTR,
        token = token,
    ))
}

fn css_finder_script(selectors: &[&str]) -> Result<String, SessionError> {
    let token = next_token();
    Ok(format!(
        r#"(() => {{
            const selectors = {selectors};
            const attr = '{attr}';
            const token = '{token}';
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            for (const sel of selectors) {{
                let el = null;
                try {{
                    el = Array.from(document.querySelectorAll(sel)).find(isVisible) || null;
                }} catch (err) {{
                    continue;
                }}
                if (el) {{
                    el.setAttribute(attr, token);
                    return {{ status: 'ok', selector: '[' + attr + '="' + token + '"]' }};
                }}
            }}
            return {{ status: 'not-found' }};
        }})()"#,
        selectors = js_string_array(selectors)?,
        attr = DISMISS_ATTR,
        token = token,
    ))
}

/// Cross-document tagging cannot reach the top-level click pipeline, so
/// same-origin iframe matches are clicked in place.
fn iframe_click_script(texts: &[&str]) -> Result<String, SessionError> {
    Ok(format!(
        r#"(() => {{
            const targets = {targets};
            for (const frame of Array.from(document.querySelectorAll('iframe'))) {{
                let doc = null;
                try {{ doc = frame.contentDocument; }} catch (err) {{ continue; }}
                if (!doc) continue;
                const candidates = Array.from(doc.querySelectorAll('button, a, [role="button"]'));
                const match = candidates.find(el => {{
                    const value = ((el.innerText || el.textContent || '') + '').trim().toLowerCase();
                    return value && value.length <= 60 && targets.some(t => value.includes(t));
                }});
                if (match) {{
                    match.click();
                    return {{ status: 'clicked' }};
                }}
            }}
            return {{ status: 'not-found' }};
        }})()"#,
        targets = js_string_array(texts)?,
    ))
}

const BACKDROP_CLICK_SCRIPT: &str = r#"(() => {
    const candidates = Array.from(document.querySelectorAll(
        '[class*="overlay"], [class*="backdrop"], [class*="modal-bg"], [class*="modal__bg"]'));
    const backdrop = candidates.find(el => {
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        if (style.position !== 'fixed' && style.position !== 'absolute') return false;
        const rect = el.getBoundingClientRect();
        return rect.width >= window.innerWidth * 0.5 && rect.height >= window.innerHeight * 0.5;
    });
    if (!backdrop) { return { status: 'not-found' }; }
    backdrop.click();
    return { status: 'clicked' };
})()"#;

const OVERLAY_PROBE_SCRIPT: &str = r#"(() => {
    const candidates = Array.from(document.querySelectorAll(
        '[class*="modal"], [class*="popup"], [class*="overlay"], [role="dialog"]'));
    const open = candidates.some(el => {
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    });
    return { open };
})()"#;

async fn overlay_visible(page: &dyn PagePort) -> Result<bool, SessionError> {
    let value = page.evaluate(OVERLAY_PROBE_SCRIPT).await?;
    Ok(value.get("open").and_then(|v| v.as_bool()).unwrap_or(false))
}
