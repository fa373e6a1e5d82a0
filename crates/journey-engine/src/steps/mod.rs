//! Interaction heuristics for each funnel phase, expressed as ordered
//! strategy cascades over the fingerprint's selector bundle plus generic
//! fallbacks. All DOM work funnels through finder scripts that tag their
//! matches, so the actual actuation always goes through the input pipeline.

pub mod add_to_cart;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod discovery;
pub mod payment;
pub mod variant;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cdp_session::{PagePort, SessionError, SessionErrorKind};
use serde_json::Value;
use tracing::debug;

pub(crate) const ANCHOR_ATTR: &str = "data-funnelprobe-anchor";

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_token() -> String {
    format!("fp-{}", TOKEN_SEQ.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn js_array<S: AsRef<str>>(items: &[S]) -> Result<String, SessionError> {
    let owned: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    serde_json::to_string(&owned)
        .map_err(|err| SessionError::new(SessionErrorKind::Internal).with_hint(err.to_string()))
}

pub(crate) fn selectors_of(value: &Value) -> Vec<String> {
    if value.get("status").and_then(|v| v.as_str()) != Some("ok") {
        return Vec::new();
    }
    value
        .get("selectors")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Find visible matches of the given CSS selectors, tag up to `limit`, and
/// return their tagged selectors in document order.
pub(crate) async fn find_by_css<S: AsRef<str>>(
    page: &dyn PagePort,
    selectors: &[S],
    limit: usize,
) -> Result<Vec<String>, SessionError> {
    let token = next_token();
    let script = format!(
        r#"(() => {{
            const selectors = {selectors};
            const attr = '{attr}';
            const token = '{token}';
            const limit = {limit};
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            const tagged = [];
            for (const sel of selectors) {{
                let nodes = [];
                try {{ nodes = Array.from(document.querySelectorAll(sel)); }} catch (err) {{ continue; }}
                for (const el of nodes) {{
                    if (!isVisible(el)) continue;
                    const mark = token + '-' + tagged.length;
                    el.setAttribute(attr, mark);
                    tagged.push('[' + attr + '="' + mark + '"]');
                    if (tagged.length >= limit) {{ break; }}
                }}
                if (tagged.length >= limit) {{ break; }}
            }}
            if (!tagged.length) {{ return {{ status: 'not-found' }}; }}
            return {{ status: 'ok', selectors: tagged }};
        }})()"#,
        selectors = js_array(selectors)?,
        attr = ANCHOR_ATTR,
        token = token,
        limit = limit,
    );

    let value = page.evaluate(&script).await?;
    Ok(selectors_of(&value))
}

/// Find visible button-like controls by label text.
pub(crate) async fn find_buttons_by_text(
    page: &dyn PagePort,
    texts: &[&str],
    exact: bool,
    limit: usize,
) -> Result<Vec<String>, SessionError> {
    let token = next_token();
    let script = format!(
        r#"(() => {{
            const targets = {targets};
            const exact = {exact};
            const attr = '{attr}';
            const token = '{token}';
            const limit = {limit};
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            const tagged = [];
            const candidates = Array.from(document.querySelectorAll(
                'button, a, [role="button"], input[type="submit"], input[type="button"]'));
            for (const el of candidates) {{
                if (!isVisible(el)) continue;
                const label = ((el.innerText || el.textContent || el.value || '') + '')
                    .replace(/\s+/g, ' ').trim().toLowerCase();
                if (!label || label.length > 60) continue;
                const hit = exact ? targets.includes(label)
                                  : targets.some(t => label.includes(t));
                if (!hit) continue;
                const mark = token + '-' + tagged.length;
                el.setAttribute(attr, mark);
                tagged.push('[' + attr + '="' + mark + '"]');
                if (tagged.length >= limit) break;
            }}
            if (!tagged.length) {{ return {{ status: 'not-found' }}; }}
            return {{ status: 'ok', selectors: tagged }};
        }})()"#,
        targets = js_array(texts)?,
        exact = if exact { "true" } else { "false" },
        attr = ANCHOR_ATTR,
        token = token,
        limit = limit,
    );

    let value = page.evaluate(&script).await?;
    Ok(selectors_of(&value))
}

/// Click candidates in order until one lands. Returns whether any click
/// succeeded.
pub(crate) async fn click_any(
    page: &dyn PagePort,
    candidates: &[String],
    timeout: Duration,
) -> bool {
    for selector in candidates {
        match page.click(selector, timeout).await {
            Ok(()) => return true,
            Err(err) => {
                debug!(target: "journey-engine", %selector, %err, "candidate click failed");
            }
        }
    }
    false
}
