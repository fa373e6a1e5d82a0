//! Product discovery: find a representative, non-gift product to push through
//! the funnel, preferring anything the site labels as a best seller.

use cdp_session::PagePort;
use serde::Deserialize;
use tracing::debug;

use crate::error::StageError;

/// Link text or path fragments that disqualify a candidate. Gift cards skip
/// shipping and would derail every later stage.
pub const GIFT_KEYWORDS: &[&str] = &[
    "gift card",
    "giftcard",
    "gift-card",
    "e-gift",
    "egift",
    "gift voucher",
    "carte cadeau",
];

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductCandidate {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub best_seller: bool,
}

const CANDIDATES_SCRIPT: &str = r#"(() => {
    const sellRe = /(best[ -]?sell|best-selling|most popular|top rated)/i;
    const seen = new Set();
    const out = [];
    for (const a of Array.from(document.querySelectorAll('a[href]'))) {
        let href = '';
        try { href = new URL(a.getAttribute('href'), location.href).href; } catch (err) { continue; }
        if (!/\/(products?|item|p)\//i.test(href)) continue;
        if (seen.has(href)) continue;
        seen.add(href);
        const text = ((a.innerText || a.textContent || '') + '')
            .replace(/\s+/g, ' ').trim().slice(0, 120);
        let heading = '';
        const section = a.closest('section, [class*="collection"], [class*="featured"]');
        if (section) {
            const h = section.querySelector('h1, h2, h3, .section-title, .section__title');
            heading = h ? ((h.innerText || '') + '') : '';
        }
        const best_seller = sellRe.test(text) || sellRe.test(heading)
            || sellRe.test((a.getAttribute('class') || ''));
        out.push({ href, text, best_seller });
        if (out.length >= 80) break;
    }
    return out;
})()"#;

/// Pick the winning candidate: gift-card entries are excluded outright, a
/// best-seller-labelled survivor is preferred, otherwise the first survivor
/// wins.
pub fn pick_candidate(candidates: &[ProductCandidate]) -> Option<&ProductCandidate> {
    let survivors: Vec<&ProductCandidate> =
        candidates.iter().filter(|c| !is_gift(c)).collect();
    survivors
        .iter()
        .find(|c| c.best_seller)
        .copied()
        .or_else(|| survivors.first().copied())
}

fn is_gift(candidate: &ProductCandidate) -> bool {
    let text = candidate.text.to_lowercase();
    let href = candidate.href.to_lowercase();
    GIFT_KEYWORDS
        .iter()
        .any(|keyword| text.contains(keyword) || href.contains(keyword))
}

/// Scan the current page for product links and choose one.
pub async fn discover_product(page: &dyn PagePort) -> Result<String, StageError> {
    let value = page.evaluate(CANDIDATES_SCRIPT).await?;
    let candidates: Vec<ProductCandidate> = serde_json::from_value(value).unwrap_or_default();
    debug!(target: "journey-engine", count = candidates.len(), "product candidates gathered");

    pick_candidate(&candidates)
        .map(|candidate| candidate.href.clone())
        .ok_or(StageError::NoProductFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use serde_json::json;

    fn gift(href: &str) -> ProductCandidate {
        ProductCandidate {
            href: href.to_string(),
            text: "Holiday Gift Card".to_string(),
            best_seller: false,
        }
    }

    fn product(href: &str, best_seller: bool) -> ProductCandidate {
        ProductCandidate {
            href: href.to_string(),
            text: "Linen Shirt".to_string(),
            best_seller,
        }
    }

    #[test]
    fn all_gift_candidates_yield_nothing() {
        let candidates = vec![
            gift("https://shop.example/products/gift-card"),
            gift("https://shop.example/products/egift"),
        ];
        assert!(pick_candidate(&candidates).is_none());
    }

    #[test]
    fn one_non_gift_entry_is_selected_wherever_it_sits() {
        for position in 0..3 {
            let mut candidates = vec![
                gift("https://shop.example/products/gift-card"),
                gift("https://shop.example/products/gift-voucher"),
            ];
            candidates.insert(position, product("https://shop.example/products/shirt", false));
            let picked = pick_candidate(&candidates).expect("non-gift entry must win");
            assert_eq!(picked.href, "https://shop.example/products/shirt");
        }
    }

    #[test]
    fn gift_card_paths_are_excluded_by_href_alone() {
        let mut sneaky = product("https://shop.example/products/gift-card-100", false);
        sneaky.text = "The perfect present".to_string();
        let candidates = vec![sneaky, product("https://shop.example/products/tee", false)];
        let picked = pick_candidate(&candidates).unwrap();
        assert_eq!(picked.href, "https://shop.example/products/tee");
    }

    #[test]
    fn best_seller_label_wins_over_position() {
        let candidates = vec![
            product("https://shop.example/products/tee", false),
            product("https://shop.example/products/hoodie", true),
        ];
        let picked = pick_candidate(&candidates).unwrap();
        assert_eq!(picked.href, "https://shop.example/products/hoodie");
    }

    #[tokio::test]
    async fn discovery_fails_stage_locally_without_candidates() {
        let page = ScriptedPage::new("https://shop.example");
        page.on_eval("best_seller", json!([]));
        let err = discover_product(&page).await.unwrap_err();
        assert!(matches!(err, StageError::NoProductFound));
    }

    #[tokio::test]
    async fn discovery_returns_the_chosen_href() {
        let page = ScriptedPage::new("https://shop.example");
        page.on_eval(
            "best_seller",
            json!([
                { "href": "https://shop.example/products/gift-card", "text": "Gift Card", "best_seller": true },
                { "href": "https://shop.example/products/shirt", "text": "Shirt", "best_seller": false },
            ]),
        );
        let href = discover_product(&page).await.unwrap();
        assert_eq!(href, "https://shop.example/products/shirt");
    }
}
