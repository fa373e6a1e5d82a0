//! Variant selection ahead of add-to-cart. A product without variants is a
//! normal outcome, not a failure.

use std::time::Duration;

use cdp_session::{PagePort, SessionError};
use platform_probe::SelectorBundle;
use serde_json::Value;
use tracing::debug;

use super::{click_any, find_by_css, js_array};

const FIRE_EVENTS: &str = r#"const fire = (el) => {
                el.dispatchEvent(new Event('input', { bubbles: true }));
                el.dispatchEvent(new Event('change', { bubbles: true }));
            };"#;

fn applied(value: &Value) -> bool {
    value.get("applied").and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Try, in priority order: platform selectors, generic radio groups,
/// dropdown selects, swatch buttons. First applied selection wins.
pub async fn select_variant(
    page: &dyn PagePort,
    bundle: &SelectorBundle,
) -> Result<Option<&'static str>, SessionError> {
    if applied(&page.evaluate(&platform_script(bundle)?).await?) {
        debug!(target: "journey-engine", technique = "platform", "variant applied");
        return Ok(Some("platform"));
    }

    if applied(&page.evaluate(RADIO_GROUP_SCRIPT).await?) {
        debug!(target: "journey-engine", technique = "radio_group", "variant applied");
        return Ok(Some("radio_group"));
    }

    if applied(&page.evaluate(DROPDOWN_SCRIPT).await?) {
        debug!(target: "journey-engine", technique = "dropdown", "variant applied");
        return Ok(Some("dropdown"));
    }

    let swatches = find_by_css(
        page,
        &[".swatch label", ".swatch__button", "[class*='swatch'] button"],
        2,
    )
    .await?;
    if !swatches.is_empty() && click_any(page, &swatches, Duration::from_millis(800)).await {
        debug!(target: "journey-engine", technique = "swatch", "variant applied");
        return Ok(Some("swatch"));
    }

    Ok(None)
}

fn platform_script(bundle: &SelectorBundle) -> Result<String, SessionError> {
    Ok(format!(
        r#"(() => {{
            const selectors = {selectors};
            const placeholder = /^(select|choose|pick|-+|\s*$)/i;
            {fire}
            for (const sel of selectors) {{
                let nodes = [];
                try {{ nodes = Array.from(document.querySelectorAll(sel)); }} catch (err) {{ continue; }}
                for (const el of nodes) {{
                    if (el.disabled) continue;
                    if (el.tagName === 'SELECT') {{
                        const option = Array.from(el.options).find(o =>
                            !o.disabled && o.value && !placeholder.test(o.text.trim()));
                        if (!option) continue;
                        el.value = option.value;
                        fire(el);
                        return {{ applied: true }};
                    }}
                    if (el.type === 'radio') {{
                        if (el.checked) {{ return {{ applied: true }}; }}
                        el.checked = true;
                        fire(el);
                        return {{ applied: true }};
                    }}
                }}
            }}
            return {{ applied: false }};
        }})()"#,
        selectors = js_array(&bundle.variant_picker)?,
        fire = FIRE_EVENTS,
    ))
}

const RADIO_GROUP_SCRIPT: &str = r#"(() => {
    const groupRe = /(size|colou?r|option|variant|style|material)/i;
    const fire = (el) => {
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    };
    for (const input of Array.from(document.querySelectorAll('input[type="radio"]'))) {
        if (input.disabled) continue;
        const ident = (input.name || '') + ' ' + (input.id || '');
        if (!groupRe.test(ident)) continue;
        if (input.checked) { return { applied: true }; }
        input.checked = true;
        fire(input);
        return { applied: true };
    }
    return { applied: false };
})()"#;

const DROPDOWN_SCRIPT: &str = r#"(() => {
    const groupRe = /(size|colou?r|option|variant|style)/i;
    const placeholder = /^(select|choose|pick|-+|\s*$)/i;
    const fire = (el) => {
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    };
    for (const select of Array.from(document.querySelectorAll('select'))) {
        if (select.disabled) continue;
        const ident = (select.name || '') + ' ' + (select.id || '');
        const inProductForm = !!select.closest('form[action*="/cart/add"], form.cart, .product-form');
        if (!groupRe.test(ident) && !inProductForm) continue;
        const option = Array.from(select.options).find(o =>
            !o.disabled && o.value && !placeholder.test(o.text.trim()));
        if (!option) continue;
        select.value = option.value;
        fire(select);
        return { applied: true };
    }
    return { applied: false };
})()"#;

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use serde_json::json;

    #[tokio::test]
    async fn no_variants_is_not_an_error() {
        let page = ScriptedPage::new("https://shop.example/products/tee");
        let outcome = select_variant(&page, &SelectorBundle::generic())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn platform_selectors_take_priority() {
        let page = ScriptedPage::new("https://shop.example/products/tee");
        // Platform script embeds the bundle's variant selectors.
        page.on_eval("variant-radios", json!({ "applied": true }));
        let outcome = select_variant(&page, &SelectorBundle::generic())
            .await
            .unwrap();
        assert_eq!(outcome, Some("platform"));
    }

    #[tokio::test]
    async fn radio_heuristic_is_the_second_tier() {
        let page = ScriptedPage::new("https://shop.example/products/tee");
        page.on_eval("groupRe", json!({ "applied": true }));
        let outcome = select_variant(&page, &SelectorBundle::generic())
            .await
            .unwrap();
        assert_eq!(outcome, Some("radio_group"));
    }

    #[tokio::test]
    async fn swatch_click_is_the_last_tier() {
        let page = ScriptedPage::new("https://shop.example/products/tee");
        page.on_eval(
            "swatch",
            json!({ "status": "ok", "selectors": [".swatch label"] }),
        );
        let outcome = select_variant(&page, &SelectorBundle::generic())
            .await
            .unwrap();
        assert_eq!(outcome, Some("swatch"));
    }
}
