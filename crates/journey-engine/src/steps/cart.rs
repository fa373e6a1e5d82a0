//! Cart resolution: distinguish a dedicated cart page from a drawer-only
//! experience. Drawer-only is a legitimate outcome, never a failure.

use std::time::Duration;

use cdp_session::{PagePort, SessionError};
use navigator::{safe_navigate, NavTimeouts};
use platform_probe::SelectorBundle;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use super::{click_any, find_buttons_by_text, find_by_css};
use crate::error::StageError;

/// Canonical cart paths, most reliable first.
pub const PRIMARY_CART_PATHS: &[&str] = &["/cart"];
/// Later guesses once the canonical path and a view-cart control both failed.
pub const ALTERNATE_CART_PATHS: &[&str] = &["/basket", "/bag", "/shopping-cart", "/checkout/cart"];

pub const VIEW_CART_TEXTS: &[&str] = &["view cart", "view bag", "view basket", "go to cart"];

/// How the site exposes its cart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartExperience {
    Page { url: String },
    DrawerOnly,
}

const CART_PAGE_PROBE: &str = r#"(() => {
    const text = ((document.body ? document.body.innerText : '') + '').toLowerCase();
    const container = !!document.querySelector(
        'form[action*="/cart"], .cart__items, [class*="cart-item"], .woocommerce-cart-form, #cart-page');
    const is_cart = container
        || /subtotal|your cart|shopping cart|basket total|order summary/.test(text);
    return { is_cart };
})()"#;

/// Resolve the cart: canonical paths by direct navigation, then a view-cart
/// control, then alternate path guesses; everything failing means the
/// experience is drawer-only and the drawer is re-opened for capture.
pub async fn resolve_cart(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
    base: &Url,
    timeouts: &NavTimeouts,
) -> Result<CartExperience, StageError> {
    for path in PRIMARY_CART_PATHS {
        if let Some(url) = try_cart_path(page, base, path, timeouts).await {
            return Ok(CartExperience::Page { url });
        }
    }

    if try_view_cart_control(page, bundle).await? {
        sleep(Duration::from_millis(600)).await;
        if is_cart_page(page).await? {
            let url = page.current_url().await.unwrap_or_default();
            return Ok(CartExperience::Page { url });
        }
    }

    for path in ALTERNATE_CART_PATHS {
        if let Some(url) = try_cart_path(page, base, path, timeouts).await {
            return Ok(CartExperience::Page { url });
        }
    }

    debug!(target: "journey-engine", "no cart page; treating experience as drawer-only");
    let _ = open_drawer(page, bundle).await;
    Ok(CartExperience::DrawerOnly)
}

async fn try_cart_path(
    page: &dyn PagePort,
    base: &Url,
    path: &str,
    timeouts: &NavTimeouts,
) -> Option<String> {
    let url = base.join(path).ok()?;
    if !safe_navigate(page, url.as_str(), timeouts).await {
        return None;
    }
    match is_cart_page(page).await {
        Ok(true) => Some(page.current_url().await.unwrap_or_else(|_| url.to_string())),
        _ => None,
    }
}

async fn try_view_cart_control(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
) -> Result<bool, SessionError> {
    let mut candidates = find_by_css(page, &bundle.view_cart, 2).await?;
    if candidates.is_empty() {
        candidates = find_buttons_by_text(page, VIEW_CART_TEXTS, false, 2).await?;
    }
    if candidates.is_empty() {
        return Ok(false);
    }
    Ok(click_any(page, &candidates, Duration::from_millis(1_000)).await)
}

async fn is_cart_page(page: &dyn PagePort) -> Result<bool, SessionError> {
    let value = page.evaluate(CART_PAGE_PROBE).await?;
    Ok(value.get("is_cart").and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Whether the cart drawer overlay is currently visible.
pub async fn drawer_visible(page: &dyn PagePort, bundle: &SelectorBundle) -> bool {
    let script = match drawer_probe_script(bundle) {
        Ok(script) => script,
        Err(_) => return false,
    };
    match page.evaluate(&script).await {
        Ok(value) => value.get("open").and_then(|v| v.as_bool()).unwrap_or(false),
        Err(_) => false,
    }
}

fn drawer_probe_script(bundle: &SelectorBundle) -> Result<String, SessionError> {
    Ok(format!(
        r#"(() => {{
            const selectors = {selectors};
            for (const sel of selectors) {{
                let el = null;
                try {{ el = document.querySelector(sel); }} catch (err) {{ continue; }}
                if (!el) continue;
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') continue;
                const rect = el.getBoundingClientRect();
                if (rect.width > 0 && rect.height > 0) {{ return {{ open: true }}; }}
            }}
            return {{ open: false }};
        }})()"#,
        selectors = super::js_array(&bundle.cart_drawer)?,
    ))
}

/// Re-open the drawer via the cart icon. Best-effort.
pub async fn open_drawer(page: &dyn PagePort, bundle: &SelectorBundle) -> bool {
    let candidates = match find_by_css(page, &bundle.cart_icon, 2).await {
        Ok(candidates) => candidates,
        Err(_) => return false,
    };
    if candidates.is_empty() || !click_any(page, &candidates, Duration::from_millis(1_000)).await {
        return false;
    }
    sleep(Duration::from_millis(500)).await;
    drawer_visible(page, bundle).await
}
