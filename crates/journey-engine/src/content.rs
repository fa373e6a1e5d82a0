//! Page-content extraction feeding the detection pipeline.

use cdp_session::PagePort;
use feature_detectors::StageContent;
use tracing::debug;

const EXTRACT_SCRIPT: &str = r#"(() => {
    const cap = (value, limit) => ((value || '') + '').replace(/\s+/g, ' ').trim().slice(0, limit);
    const isVisible = (el) => {
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    };

    const text = cap(document.body ? document.body.innerText : '', 20000);

    const buttons = Array.from(document.querySelectorAll(
            'button, [role="button"], input[type="submit"], input[type="button"], a.btn, a.button'))
        .filter(isVisible)
        .map(el => cap(el.innerText || el.textContent || el.value, 80))
        .filter(Boolean)
        .slice(0, 40);

    const hintRe = /(recommend|upsell|cross-?sell|related|complementary|also-bought|trust|badge|secure|protect)/i;
    const dom_hints = [];
    for (const el of Array.from(document.querySelectorAll('section, aside, div')).slice(0, 2000)) {
        const ident = ((el.getAttribute('class') || '') + ' ' + (el.id || '')).trim();
        if (ident && hintRe.test(ident)) {
            const token = cap(ident, 80);
            if (!dom_hints.includes(token)) { dom_hints.push(token); }
            if (dom_hints.length >= 15) break;
        }
    }

    const iframe_hosts = Array.from(document.querySelectorAll('iframe[src]'))
        .map(frame => { try { return new URL(frame.src, location.href).host; } catch (err) { return ''; } })
        .filter(Boolean)
        .slice(0, 20);

    const image_alts = Array.from(document.querySelectorAll('img[alt]'))
        .map(img => cap(img.alt, 60))
        .filter(Boolean)
        .slice(0, 40);

    return { text, buttons, dom_hints, iframe_hosts, image_alts };
})()"#;

/// Pull visible text, controls, and structural hints out of the live page.
/// Extraction failures degrade to empty content.
pub async fn extract_stage_content(page: &dyn PagePort) -> StageContent {
    match page.evaluate(EXTRACT_SCRIPT).await {
        Ok(value) => match serde_json::from_value::<StageContent>(value) {
            Ok(content) => content,
            Err(err) => {
                debug!(target: "journey-engine", %err, "content payload did not parse");
                StageContent::default()
            }
        },
        Err(err) => {
            debug!(target: "journey-engine", %err, "content extraction failed");
            StageContent::default()
        }
    }
}

/// Short text excerpts carried on the stage result for reviewers.
pub fn snippets_from(content: &StageContent, limit: usize) -> Vec<String> {
    content
        .text
        .split(['.', '!', '\n'])
        .map(str::trim)
        .filter(|line| line.len() >= 12)
        .take(limit)
        .map(|line| line.chars().take(120).collect())
        .collect()
}

const CHALLENGE_HOSTS: &[&str] = &["recaptcha", "hcaptcha", "challenges.cloudflare.com", "arkoselabs"];

/// CAPTCHA / verification walls make a checkout stage fail gracefully rather
/// than be worked around.
pub fn has_identity_challenge(content: &StageContent) -> bool {
    if content
        .iframe_hosts
        .iter()
        .any(|host| CHALLENGE_HOSTS.iter().any(|marker| host.contains(marker)))
    {
        return true;
    }
    let lowered = content.text.to_lowercase();
    lowered.contains("verify you are human") || lowered.contains("unusual traffic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use serde_json::json;

    #[tokio::test]
    async fn extraction_parses_the_payload() {
        let page = ScriptedPage::new("https://shop.example");
        page.on_eval(
            "dom_hints",
            json!({
                "text": "Free shipping on orders over $50. Shop bestsellers now.",
                "buttons": ["Add to cart"],
                "dom_hints": ["section.related-products"],
                "iframe_hosts": [],
                "image_alts": ["Visa"],
            }),
        );
        let content = extract_stage_content(&page).await;
        assert!(content.text.contains("Free shipping"));
        assert_eq!(content.buttons, vec!["Add to cart".to_string()]);
    }

    #[tokio::test]
    async fn extraction_degrades_to_empty_content() {
        let page = ScriptedPage::new("https://shop.example");
        page.on_eval("dom_hints", json!(42));
        let content = extract_stage_content(&page).await;
        assert!(content.text.is_empty());
    }

    #[test]
    fn snippets_skip_short_fragments() {
        let content = StageContent::from_text(
            "Hi. Welcome to our store, home of linen basics. Free returns within 30 days. Ok.",
        );
        let snippets = snippets_from(&content, 5);
        assert_eq!(snippets.len(), 2);
        assert!(snippets[0].contains("linen basics"));
    }

    #[test]
    fn challenge_detection_reads_iframe_hosts_and_copy() {
        let mut content = StageContent::from_text("Checkout");
        assert!(!has_identity_challenge(&content));
        content.iframe_hosts = vec!["www.recaptcha.net".to_string()];
        assert!(has_identity_challenge(&content));

        let wall = StageContent::from_text("Please verify you are human to continue.");
        assert!(has_identity_challenge(&wall));
    }
}
