use cdp_session::{PagePort, SessionError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::selectors::SelectorBundle;

/// Commerce platforms this engine can recognize.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Shopify,
    WooCommerce,
    BigCommerce,
    Magento,
    Squarespace,
    Wix,
    SalesforceCommerce,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::WooCommerce => "woocommerce",
            Platform::BigCommerce => "bigcommerce",
            Platform::Magento => "magento",
            Platform::Squarespace => "squarespace",
            Platform::Wix => "wix",
            Platform::SalesforceCommerce => "salesforce_commerce",
            Platform::Unknown => "unknown",
        }
    }
}

/// Confidence assigned when an injected runtime marker identifies the
/// platform outright.
pub const RUNTIME_MARKER_CONFIDENCE: f64 = 100.0;
/// Weight per markup/script indicator hit.
pub const INDICATOR_HIT_WEIGHT: f64 = 15.0;
/// Ceiling for scan-based confidence.
pub const SCAN_CONFIDENCE_CAP: f64 = 90.0;
/// Indicator hits required before the scan recognizes a platform.
pub const MIN_INDICATOR_HITS: usize = 2;

/// Identity of a target storefront, computed once per journey.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformFingerprint {
    pub platform: Platform,
    pub recognized: bool,
    pub theme: Option<String>,
    /// 0–100 scale.
    pub confidence: f64,
    pub selectors: SelectorBundle,
}

impl PlatformFingerprint {
    pub fn unknown() -> Self {
        Self {
            platform: Platform::Unknown,
            recognized: false,
            theme: None,
            confidence: 0.0,
            selectors: SelectorBundle::generic(),
        }
    }
}

/// Raw signals pulled out of the live page in one evaluate call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlatformSignals {
    #[serde(default)]
    pub shopify_runtime: bool,
    #[serde(default)]
    pub shopify_theme_name: Option<String>,
    #[serde(default)]
    pub woocommerce_runtime: bool,
    #[serde(default)]
    pub magento_runtime: bool,
    #[serde(default)]
    pub squarespace_runtime: bool,
    #[serde(default)]
    pub wix_runtime: bool,
    #[serde(default)]
    pub html_sample: String,
    #[serde(default)]
    pub script_srcs: Vec<String>,
    #[serde(default)]
    pub link_hrefs: Vec<String>,
    #[serde(default)]
    pub body_classes: String,
}

const SIGNALS_SCRIPT: &str = r#"(() => {
    const srcs = Array.from(document.querySelectorAll('script[src]'))
        .map(s => s.src).slice(0, 60);
    const links = Array.from(document.querySelectorAll('link[href]'))
        .map(l => l.href).slice(0, 60);
    const html = document.documentElement
        ? document.documentElement.outerHTML.slice(0, 40000) : '';
    const shopify = typeof window.Shopify !== 'undefined' && window.Shopify !== null;
    return {
        shopify_runtime: shopify,
        shopify_theme_name: shopify && window.Shopify.theme
            ? (window.Shopify.theme.name || null) : null,
        woocommerce_runtime: typeof window.wc_add_to_cart_params !== 'undefined'
            || (document.body ? document.body.className : '').indexOf('woocommerce') !== -1,
        magento_runtime: typeof window.Mage !== 'undefined'
            || !!document.querySelector('script[type="text/x-magento-init"]'),
        squarespace_runtime: !!(window.Static && window.Static.SQUARESPACE_CONTEXT),
        wix_runtime: typeof window.wixBiSession !== 'undefined',
        html_sample: html,
        script_srcs: srcs,
        link_hrefs: links,
        body_classes: document.body ? document.body.className : '',
    };
})()"#;

/// Ordered substring indicators scanned out of markup and asset URLs.
const INDICATORS: &[(Platform, &[&str])] = &[
    (
        Platform::Shopify,
        &[
            "cdn.shopify.com",
            "shopify.theme",
            "/cdn/shop/",
            "shopify-section",
            "myshopify.com",
            "shopify-features",
        ],
    ),
    (
        Platform::WooCommerce,
        &[
            "/wp-content/plugins/woocommerce",
            "woocommerce",
            "wc-ajax",
            "wc_add_to_cart",
            "wp-json/wc",
        ],
    ),
    (
        Platform::BigCommerce,
        &[
            "cdn11.bigcommerce.com",
            "bigcommerce.com",
            "stencil-utils",
            "data-stencil",
        ],
    ),
    (
        Platform::Magento,
        &[
            "mage/cookies",
            "magento_",
            "text/x-magento-init",
            "/static/frontend/",
            "mage-init",
        ],
    ),
    (
        Platform::Squarespace,
        &[
            "squarespace.com",
            "static1.squarespace",
            "sqs-block",
            "squarespace-commerce",
        ],
    ),
    (
        Platform::Wix,
        &[
            "static.parastorage.com",
            "wixstatic.com",
            "wix-code",
            "_wixcss",
        ],
    ),
    (
        Platform::SalesforceCommerce,
        &["demandware.static", "demandware.store", "dwanalytics"],
    ),
];

/// Theme-name patterns matched against runtime theme names and asset text for
/// recognized platforms.
const THEME_PATTERNS: &[(Platform, &str, &[&str])] = &[
    (Platform::Shopify, "dawn", &["dawn"]),
    (Platform::Shopify, "debut", &["debut"]),
    (Platform::Shopify, "brooklyn", &["brooklyn"]),
    (Platform::Shopify, "narrative", &["narrative"]),
    (Platform::Shopify, "supply", &["supply"]),
    (Platform::Shopify, "venture", &["venture"]),
    (Platform::Shopify, "impulse", &["impulse"]),
    (Platform::Shopify, "prestige", &["prestige"]),
    (Platform::Shopify, "turbo", &["turbo"]),
    (Platform::Shopify, "motion", &["motion"]),
    (Platform::Shopify, "empire", &["empire"]),
    (Platform::Shopify, "warehouse", &["warehouse"]),
    (Platform::Shopify, "streamline", &["streamline"]),
    (Platform::WooCommerce, "storefront", &["storefront"]),
    (Platform::WooCommerce, "flatsome", &["flatsome"]),
    (Platform::WooCommerce, "astra", &["astra"]),
    (Platform::BigCommerce, "cornerstone", &["cornerstone"]),
];

/// Compute the fingerprint for the current page. Never fails: signal
/// collection errors degrade to the unknown fingerprint.
pub async fn fingerprint(page: &dyn PagePort) -> PlatformFingerprint {
    let signals = match collect_signals(page).await {
        Ok(signals) => signals,
        Err(err) => {
            warn!(target: "platform-probe", %err, "signal collection failed");
            return PlatformFingerprint::unknown();
        }
    };
    let fingerprint = fingerprint_from_signals(&signals);
    debug!(
        target: "platform-probe",
        platform = fingerprint.platform.as_str(),
        theme = fingerprint.theme.as_deref().unwrap_or("generic"),
        confidence = fingerprint.confidence,
        "fingerprint resolved"
    );
    fingerprint
}

async fn collect_signals(page: &dyn PagePort) -> Result<PlatformSignals, SessionError> {
    let value = page.evaluate(SIGNALS_SCRIPT).await?;
    serde_json::from_value(value).map_err(|err| {
        SessionError::new(cdp_session::SessionErrorKind::Internal)
            .with_hint(format!("signal payload did not parse: {err}"))
    })
}

/// Pure fingerprint resolution, separated for testability.
pub fn fingerprint_from_signals(signals: &PlatformSignals) -> PlatformFingerprint {
    // Tier 1: injected runtime configuration objects.
    if let Some(platform) = runtime_marker(signals) {
        let theme = resolve_theme(platform, signals);
        return PlatformFingerprint {
            platform,
            recognized: true,
            selectors: SelectorBundle::for_platform(platform, theme.as_deref()),
            theme,
            confidence: RUNTIME_MARKER_CONFIDENCE,
        };
    }

    // Tier 2: markup and asset-url indicator scan.
    let haystack = scan_haystack(signals);
    let mut best: Option<(Platform, usize)> = None;
    for (platform, needles) in INDICATORS {
        let hits = needles
            .iter()
            .filter(|needle| haystack.contains(*needle))
            .count();
        if hits >= MIN_INDICATOR_HITS && best.map(|(_, n)| hits > n).unwrap_or(true) {
            best = Some((*platform, hits));
        }
    }

    match best {
        Some((platform, hits)) => {
            let confidence = (INDICATOR_HIT_WEIGHT * hits as f64).min(SCAN_CONFIDENCE_CAP);
            let theme = resolve_theme(platform, signals);
            PlatformFingerprint {
                platform,
                recognized: true,
                selectors: SelectorBundle::for_platform(platform, theme.as_deref()),
                theme,
                confidence,
            }
        }
        None => PlatformFingerprint::unknown(),
    }
}

fn runtime_marker(signals: &PlatformSignals) -> Option<Platform> {
    if signals.shopify_runtime {
        Some(Platform::Shopify)
    } else if signals.woocommerce_runtime {
        Some(Platform::WooCommerce)
    } else if signals.magento_runtime {
        Some(Platform::Magento)
    } else if signals.squarespace_runtime {
        Some(Platform::Squarespace)
    } else if signals.wix_runtime {
        Some(Platform::Wix)
    } else {
        None
    }
}

fn scan_haystack(signals: &PlatformSignals) -> String {
    let mut haystack = String::with_capacity(
        signals.html_sample.len() + signals.body_classes.len() + 1024,
    );
    haystack.push_str(&signals.html_sample.to_lowercase());
    haystack.push(' ');
    haystack.push_str(&signals.body_classes.to_lowercase());
    for src in &signals.script_srcs {
        haystack.push(' ');
        haystack.push_str(&src.to_lowercase());
    }
    for href in &signals.link_hrefs {
        haystack.push(' ');
        haystack.push_str(&href.to_lowercase());
    }
    haystack
}

/// Tier 3: theme selection for recognized platforms. The runtime theme name
/// is authoritative; asset text is the fallback. No match means the generic
/// theme.
fn resolve_theme(platform: Platform, signals: &PlatformSignals) -> Option<String> {
    let runtime_name = signals
        .shopify_theme_name
        .as_deref()
        .map(|name| name.to_lowercase());

    if let Some(name) = &runtime_name {
        for (theme_platform, theme, patterns) in THEME_PATTERNS {
            if *theme_platform == platform && patterns.iter().any(|p| name.contains(p)) {
                return Some((*theme).to_string());
            }
        }
    }

    let haystack = scan_haystack(signals);
    for (theme_platform, theme, patterns) in THEME_PATTERNS {
        if *theme_platform != platform {
            continue;
        }
        if patterns
            .iter()
            .any(|pattern| haystack.contains(&format!("{pattern}-theme")) || haystack.contains(&format!("theme-{pattern}")))
        {
            return Some((*theme).to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use serde_json::json;

    #[test]
    fn runtime_marker_is_authoritative() {
        let signals = PlatformSignals {
            shopify_runtime: true,
            shopify_theme_name: Some("Dawn 12.0".to_string()),
            ..PlatformSignals::default()
        };
        let fingerprint = fingerprint_from_signals(&signals);
        assert_eq!(fingerprint.platform, Platform::Shopify);
        assert!(fingerprint.recognized);
        assert_eq!(fingerprint.confidence, RUNTIME_MARKER_CONFIDENCE);
        assert_eq!(fingerprint.theme.as_deref(), Some("dawn"));
    }

    #[test]
    fn scan_requires_two_indicator_hits() {
        let one_hit = PlatformSignals {
            script_srcs: vec!["https://cdn.shopify.com/app.js".to_string()],
            ..PlatformSignals::default()
        };
        let fingerprint = fingerprint_from_signals(&one_hit);
        assert_eq!(fingerprint.platform, Platform::Unknown);
        assert!(!fingerprint.recognized);

        let two_hits = PlatformSignals {
            script_srcs: vec!["https://cdn.shopify.com/app.js".to_string()],
            html_sample: "<div class=\"shopify-section\"></div>".to_string(),
            ..PlatformSignals::default()
        };
        let fingerprint = fingerprint_from_signals(&two_hits);
        assert_eq!(fingerprint.platform, Platform::Shopify);
        assert_eq!(fingerprint.confidence, 30.0);
    }

    #[test]
    fn scan_confidence_is_capped() {
        let signals = PlatformSignals {
            html_sample: "cdn.shopify.com shopify.theme /cdn/shop/ shopify-section \
                          myshopify.com shopify-features"
                .to_string(),
            ..PlatformSignals::default()
        };
        let fingerprint = fingerprint_from_signals(&signals);
        assert_eq!(fingerprint.confidence, SCAN_CONFIDENCE_CAP);
    }

    #[test]
    fn woocommerce_scan_recognition() {
        let signals = PlatformSignals {
            script_srcs: vec![
                "https://shop.example/wp-content/plugins/woocommerce/assets/js/cart.js".to_string(),
            ],
            body_classes: "woocommerce-page archive".to_string(),
            ..PlatformSignals::default()
        };
        let fingerprint = fingerprint_from_signals(&signals);
        assert_eq!(fingerprint.platform, Platform::WooCommerce);
    }

    #[test]
    fn unknown_platform_gets_generic_bundle() {
        let fingerprint = fingerprint_from_signals(&PlatformSignals::default());
        assert_eq!(fingerprint.platform, Platform::Unknown);
        assert!(fingerprint.theme.is_none());
        assert!(!fingerprint.selectors.add_to_cart.is_empty());
    }

    #[tokio::test]
    async fn live_fingerprint_degrades_to_unknown_on_bad_payload() {
        let page = ScriptedPage::new("https://shop.example");
        page.on_eval("shopify_runtime", json!("not-an-object"));
        let fingerprint = fingerprint(&page).await;
        assert_eq!(fingerprint.platform, Platform::Unknown);
    }

    #[tokio::test]
    async fn live_fingerprint_parses_signals() {
        let page = ScriptedPage::new("https://shop.example");
        page.on_eval(
            "shopify_runtime",
            json!({
                "shopify_runtime": true,
                "shopify_theme_name": "Impulse",
                "script_srcs": [],
                "link_hrefs": [],
            }),
        );
        let fingerprint = fingerprint(&page).await;
        assert_eq!(fingerprint.platform, Platform::Shopify);
        assert_eq!(fingerprint.theme.as_deref(), Some("impulse"));
    }
}
