//! Add-to-cart cascade: platform form submit, button-text match, CSS-class
//! match, full-button fuzzy scan, and a last-resort primary-button heuristic.

use std::time::Duration;

use cdp_session::{PagePort, SessionError};
use platform_probe::SelectorBundle;
use tracing::debug;

use super::{click_any, find_buttons_by_text, find_by_css, js_array, selectors_of, ANCHOR_ATTR};
use crate::error::StageError;

pub const BUTTON_TEXTS: &[&str] = &["add to cart", "add to bag", "add to basket"];

const CLICK_TIMEOUT: Duration = Duration::from_millis(1_200);
/// Visible candidates tried per layer.
const CANDIDATES_PER_LAYER: usize = 3;

/// Drive the cascade until a click lands. Returns the winning layer's label;
/// only a fully exhausted cascade is a stage failure.
pub async fn add_to_cart(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
) -> Result<&'static str, StageError> {
    if try_platform_form(page, bundle).await? {
        return Ok("platform_form");
    }

    let by_text = find_buttons_by_text(page, BUTTON_TEXTS, false, CANDIDATES_PER_LAYER).await?;
    if click_any(page, &by_text, CLICK_TIMEOUT).await {
        return Ok("button_text");
    }

    let by_class = find_by_css(page, &bundle.add_to_cart, CANDIDATES_PER_LAYER).await?;
    if click_any(page, &by_class, CLICK_TIMEOUT).await {
        return Ok("css_class");
    }

    let fuzzy = fuzzy_scan(page).await?;
    if click_any(page, &fuzzy, CLICK_TIMEOUT).await {
        return Ok("fuzzy_scan");
    }

    let primary = primary_heuristic(page).await?;
    if click_any(page, &primary, CLICK_TIMEOUT).await {
        return Ok("primary_heuristic");
    }

    Err(StageError::AddToCartExhausted)
}

/// Locate the product form and tag its submit control.
async fn try_platform_form(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
) -> Result<bool, SessionError> {
    let token = super::next_token();
    let script = format!(
        r#"(() => {{
            const forms = {forms};
            const attr = '{attr}';
            const token = '{token}';
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            const tagged = [];
            for (const sel of forms) {{
                let form = null;
                try {{ form = document.querySelector(sel); }} catch (err) {{ continue; }}
                if (!form) continue;
                const controls = Array.from(form.querySelectorAll(
                    'button[type="submit"], input[type="submit"], button[name="add"], button:not([type])'));
                for (const control of controls) {{
                    if (!isVisible(control) || control.disabled) continue;
                    const mark = token + '-' + tagged.length;
                    control.setAttribute(attr, mark);
                    tagged.push('[' + attr + '="' + mark + '"]');
                    if (tagged.length >= 2) break;
                }}
                if (tagged.length) break;
            }}
            if (!tagged.length) {{ return {{ status: 'not-found' }}; }}
            return {{ status: 'ok', selectors: tagged }};
        }})()"#,
        forms = js_array(&bundle.product_form)?,
        attr = ANCHOR_ATTR,
        token = token,
    );

    let value = page.evaluate(&script).await?;
    let candidates = selectors_of(&value);
    if candidates.is_empty() {
        return Ok(false);
    }
    Ok(click_any(page, &candidates, CLICK_TIMEOUT).await)
}

/// Enumerate every visible button and fuzzy-match cart-ish wording.
async fn fuzzy_scan(page: &dyn PagePort) -> Result<Vec<String>, SessionError> {
    let token = super::next_token();
    let script = format!(
        r#"(() => {{
            const attr = '{attr}';
            const token = '{token}';
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            const tagged = [];
            const buttons = Array.from(document.querySelectorAll(
                'button, input[type="submit"], [role="button"]')).slice(0, 60);
            for (const el of buttons) {{
                if (!isVisible(el) || el.disabled) continue;
                const label = ((el.innerText || el.textContent || el.value || '') + '')
                    .replace(/\s+/g, ' ').trim().toLowerCase();
                if (!label || label.length > 60) continue;
                if (!label.includes('add')) continue;
                if (!(label.includes('cart') || label.includes('bag') || label.includes('basket'))) continue;
                const mark = token + '-' + tagged.length;
                el.setAttribute(attr, mark);
                tagged.push('[' + attr + '="' + mark + '"]');
                if (tagged.length >= 3) break;
            }}
            if (!tagged.length) {{ return {{ status: 'not-found' }}; }}
            return {{ status: 'ok', selectors: tagged }};
        }})()"#,
        attr = ANCHOR_ATTR,
        token = token,
    );

    let value = page.evaluate(&script).await?;
    Ok(selectors_of(&value))
}

/// Last resort: the largest, primary-looking button near the product content.
async fn primary_heuristic(page: &dyn PagePort) -> Result<Vec<String>, SessionError> {
    let token = super::next_token();
    let script = format!(
        r#"(() => {{
            const attr = '{attr}';
            const token = '{token}';
            const primaryRe = /(primary|btn--full|product|submit|buy)/i;
            const isVisible = (el) => {{
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }};
            const scope = document.querySelector('main, [role="main"], .product, #MainContent')
                || document.body;
            if (!scope) {{ return {{ status: 'not-found' }}; }}
            let best = null;
            let bestScore = 0;
            for (const el of Array.from(scope.querySelectorAll('button, input[type="submit"]')).slice(0, 60)) {{
                if (!isVisible(el) || el.disabled) continue;
                const rect = el.getBoundingClientRect();
                let score = rect.width * rect.height;
                if (primaryRe.test(el.getAttribute('class') || '')) {{ score *= 2; }}
                if (score > bestScore) {{ best = el; bestScore = score; }}
            }}
            if (!best) {{ return {{ status: 'not-found' }}; }}
            best.setAttribute(attr, token);
            return {{ status: 'ok', selectors: ['[' + attr + '="' + token + '"]'] }};
        }})()"#,
        attr = ANCHOR_ATTR,
        token = token,
    );

    let value = page.evaluate(&script).await?;
    Ok(selectors_of(&value))
}
