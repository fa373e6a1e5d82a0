//! Contact/shipping fill: detect the destination country, pick the canned
//! profile, fill fields by fuzzy name/id matching, and advance. Everything
//! here is best-effort and never validated against server acceptance.

use std::time::Duration;

use cdp_session::{PagePort, SessionError};
use tokio::time::sleep;
use tracing::debug;

use super::{click_any, find_buttons_by_text, js_array};
use crate::profiles::AddressProfile;

pub const CONTINUE_TEXTS: &[&str] = &["continue to shipping", "continue", "next"];
pub const PAYMENT_CONTINUE_TEXTS: &[&str] = &["continue to payment", "continue", "next"];

const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("GB", "United Kingdom"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("CA", "Canada"),
    ("AU", "Australia"),
];

/// Normalize a country selector value (code or display name) to an ISO code.
pub fn normalize_country(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() == 2 {
        return Some(trimmed.to_uppercase());
    }
    let lowered = trimmed.to_lowercase();
    COUNTRY_NAMES
        .iter()
        .find(|(_, name)| name.to_lowercase() == lowered)
        .map(|(code, _)| (*code).to_string())
}

fn country_name(code: &str) -> &'static str {
    COUNTRY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("United States")
}

const COUNTRY_PROBE: &str = r#"(() => {
    const select = document.querySelector(
        'select[name*="country" i], select[id*="country" i], select[autocomplete*="country"]');
    if (!select) { return { found: false }; }
    const option = select.selectedOptions && select.selectedOptions[0];
    const code = (option && (option.getAttribute('data-code') || option.value)) || select.value || '';
    return { found: true, code: (code + '').trim() };
})()"#;

/// Read the destination country from a country selector, if one exists.
pub async fn detect_country(page: &dyn PagePort) -> Option<String> {
    let value = page.evaluate(COUNTRY_PROBE).await.ok()?;
    if !value.get("found").and_then(|v| v.as_bool()).unwrap_or(false) {
        return None;
    }
    value
        .get("code")
        .and_then(|v| v.as_str())
        .and_then(normalize_country)
}

/// Fill contact and shipping-address fields from the profile. Returns how
/// many fields were written.
pub async fn fill_contact(
    page: &dyn PagePort,
    profile: &AddressProfile,
) -> Result<usize, SessionError> {
    let values = [
        profile.email,
        profile.first_name,
        profile.last_name,
        profile.address1,
        profile.city,
        profile.postal_code,
        profile.phone,
        profile.region,
        profile.country,
        country_name(profile.country),
    ];
    let script = format!(
        r#"(() => {{
            const v = {values};
            const values = {{
                email: v[0], first_name: v[1], last_name: v[2], address1: v[3],
                city: v[4], postal: v[5], phone: v[6], region: v[7],
                country_code: v[8], country_name: v[9],
            }};
            const matchers = [
                ['country', /country/i],
                ['email', /e-?mail/i],
                ['first_name', /first.?name|given.?name/i],
                ['last_name', /last.?name|family.?name|surname/i],
                ['address1', /address.?(1|line.?1)|street|^address$|shipping.?address/i],
                ['city', /city|town|locality/i],
                ['postal', /zip|postal|postcode/i],
                ['phone', /phone|mobile|\btel\b/i],
                ['region', /state|province|region|county/i],
            ];
            const fire = (el) => {{
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }};
            let filled = 0;
            const fields = Array.from(document.querySelectorAll('input, select')).slice(0, 120);
            for (const field of fields) {{
                if (field.type === 'hidden' || field.disabled || field.readOnly) continue;
                const ident = [field.name, field.id, field.getAttribute('autocomplete'),
                               field.placeholder, field.getAttribute('aria-label')].join(' ');
                const entry = matchers.find(([, re]) => re.test(ident));
                if (!entry) continue;
                const key = entry[0];
                if (field.tagName === 'SELECT') {{
                    const wanted = key === 'country'
                        ? [values.country_code, values.country_name]
                        : [values[key]];
                    const option = Array.from(field.options).find(o =>
                        wanted.some(w => w && (o.value === w
                            || o.text.trim().toLowerCase() === (w + '').toLowerCase())));
                    if (!option || field.value === option.value) continue;
                    field.value = option.value;
                }} else {{
                    const value = key === 'country' ? values.country_name : values[key];
                    if (!value || field.value) continue;
                    field.value = value;
                }}
                fire(field);
                filled += 1;
            }}
            return {{ filled }};
        }})()"#,
        values = js_array(&values)?,
    );

    let value = page.evaluate(&script).await?;
    let filled = value
        .get("filled")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;
    debug!(target: "journey-engine", filled, "contact fields written");
    Ok(filled)
}

/// Click a "continue"-type control if one exists.
pub async fn advance(page: &dyn PagePort, texts: &[&str]) -> Result<bool, SessionError> {
    let candidates = find_buttons_by_text(page, texts, false, 2).await?;
    if candidates.is_empty() {
        return Ok(false);
    }
    let clicked = click_any(page, &candidates, Duration::from_millis(1_200)).await;
    if clicked {
        sleep(Duration::from_millis(800)).await;
    }
    Ok(clicked)
}

const SHIPPING_METHOD_SCRIPT: &str = r#"(() => {
    const fire = (el) => {
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
    };
    const radios = Array.from(document.querySelectorAll(
        'input[type="radio"][name*="shipping" i], input[type="radio"][name*="delivery" i], ' +
        '[class*="shipping-method"] input[type="radio"]'));
    const enabled = radios.filter(r => !r.disabled);
    if (!enabled.length) { return { selected: false }; }
    if (enabled.some(r => r.checked)) { return { selected: true }; }
    enabled[0].checked = true;
    fire(enabled[0]);
    return { selected: true };
})()"#;

/// Ensure some shipping rate is selected; sites usually pre-check the first.
pub async fn select_shipping_method(page: &dyn PagePort) -> Result<bool, SessionError> {
    let value = page.evaluate(SHIPPING_METHOD_SCRIPT).await?;
    Ok(value
        .get("selected")
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}
