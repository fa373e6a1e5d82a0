//! Payment-entry fill, for capture realism only.
//!
//! Hard invariant, independent of anything the site renders: this step never
//! activates a control. It writes card-like fields in the same document and
//! stops; there is no click path here at all.

use cdp_session::{PagePort, SessionError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::js_array;

/// Synthetic card data used purely to make the payment form render as it
/// would mid-entry. The industry-standard test number never authorizes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardProfile {
    pub number: String,
    pub name: String,
    pub expiry: String,
    pub cvc: String,
}

impl Default for CardProfile {
    fn default() -> Self {
        Self {
            number: "4242 4242 4242 4242".to_string(),
            name: "Avery Collins".to_string(),
            expiry: "12 / 28".to_string(),
            cvc: "123".to_string(),
        }
    }
}

/// Fill card-like fields reachable in the top document. Hosted payment
/// iframes are out of reach by design; their absence from the fill count is
/// expected. Returns how many fields were written.
pub async fn fill_payment(
    page: &dyn PagePort,
    card: &CardProfile,
) -> Result<usize, SessionError> {
    let values = [
        card.number.as_str(),
        card.name.as_str(),
        card.expiry.as_str(),
        card.cvc.as_str(),
    ];
    let script = format!(
        r#"(() => {{
            const v = {values};
            const values = {{ number: v[0], holder: v[1], expiry: v[2], cvc: v[3] }};
            const matchers = [
                ['number', /card.?(number|no)\b|cc-?number|ccnum|\bpan\b/i],
                ['holder', /name.?on.?card|cc-?name|card.?holder|holder.?name/i],
                ['expiry', /expir|cc-?exp|mm.?\/?.?yy/i],
                ['cvc', /cvc|cvv|security.?code|\bcsc\b/i],
            ];
            const fire = (el) => {{
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }};
            let filled = 0;
            const fields = Array.from(document.querySelectorAll('input')).slice(0, 80);
            for (const field of fields) {{
                if (field.type === 'hidden' || field.disabled || field.readOnly) continue;
                const ident = [field.name, field.id, field.getAttribute('autocomplete'),
                               field.placeholder, field.getAttribute('aria-label')].join(' ');
                const entry = matchers.find(([, re]) => re.test(ident));
                if (!entry) continue;
                if (field.value) continue;
                field.value = values[entry[0]];
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
    debug!(target: "journey-engine", filled, "payment fields written, no submission");
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use serde_json::json;

    #[tokio::test]
    async fn fill_never_clicks_anything() {
        let page = ScriptedPage::new("https://shop.example/checkout/payment");
        page.on_eval("cc-?number", json!({ "filled": 3 }));

        let filled = fill_payment(&page, &CardProfile::default()).await.unwrap();
        assert_eq!(filled, 3);

        let journal = page.journal();
        assert!(journal.iter().all(|entry| !entry.starts_with("click:")));
        assert!(journal.iter().all(|entry| !entry.starts_with("key:")));
    }

    #[tokio::test]
    async fn hosted_fields_out_of_reach_still_succeed() {
        let page = ScriptedPage::new("https://shop.example/checkout/payment");
        page.on_eval("cc-?number", json!({ "filled": 0 }));
        let filled = fill_payment(&page, &CardProfile::default()).await.unwrap();
        assert_eq!(filled, 0);
    }
}
