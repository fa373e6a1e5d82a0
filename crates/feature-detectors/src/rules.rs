//! Fixed pattern sets per feature, compiled once.

use funnelprobe_core_types::MAX_EVIDENCE_CHARS;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("detector rule pattern must compile")
        })
        .collect()
}

pub static DELIVERY_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bget it by\b",
        r"\barrives? (?:by|on|between)\b",
        r"\bdeliver(?:y|ed) (?:by|on|between)\b",
        r"\bestimated delivery\b",
        r"\border within\b.{0,40}\b(?:receive|get|delivery)\b",
        r"\bships? (?:within|in) \d+",
        r"\bfree delivery by\b",
        r"\bdispatched (?:by|within)\b",
    ])
});

pub static UPSELL_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bfrequently bought together\b",
        r"\byou may also like\b",
        r"\byou might also like\b",
        r"\bcustomers also (?:bought|viewed|loved)\b",
        r"\bcomplete the look\b",
        r"\bpairs well with\b",
        r"\bgoes great with\b",
        r"\brecommended for you\b",
        r"\bbundle (?:and|&) save\b",
        r"\badd (?:a|the) matching\b",
    ])
});

pub static FREE_SHIPPING_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bfree (?:standard )?shipping (?:on (?:all )?orders? )?(?:over|above|from) \$?£?€?\s?\d+",
        r"\bspend \$?£?€?\s?\d+.{0,40}\bfree shipping\b",
        r"\b(?:you(?:'| a)re )?\$?£?€?\s?\d+(?:\.\d{2})? (?:more |away |left ).{0,40}\bfree shipping\b",
        r"\bunlock free shipping\b",
        r"\bfree shipping unlocked\b",
        r"\bqualifies? for free shipping\b",
        r"\baway from free shipping\b",
    ])
});

pub static PROTECTION_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bshipping protection\b",
        r"\bpackage protection\b",
        r"\bshipping insurance\b",
        r"\border protection\b",
        r"\bprotect (?:my|your) (?:order|package|shipment)\b",
        r"\bgreen shipping protection\b",
        r"\broute package protection\b",
        r"\b(?:navidium|corso|seel)\b",
    ])
});

pub static TRUST_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bmoney[- ]back guarantee\b",
        r"\bsecure (?:checkout|payments?|transactions?)\b",
        r"\bssl (?:secured?|encrypted)\b",
        r"\b100% secure\b",
        r"\bsatisfaction guaranteed\b",
        r"\bnorton secured\b",
        r"\bmcafee secure\b",
        r"\btrusted (?:store|shop|by)\b",
        r"\bverified (?:reviews|buyer)\b",
        r"\b\d+[- ]day (?:returns?|money[- ]back|guarantee)\b",
        r"\brisk[- ]free\b",
    ])
});

/// DOM class/id tokens that mark recommendation modules.
pub const UPSELL_DOM_TOKENS: &[&str] = &[
    "recommend",
    "upsell",
    "cross-sell",
    "crosssell",
    "related-products",
    "complementary",
    "also-bought",
];

/// DOM tokens and image-alt keywords that mark trust/badge furniture.
pub const TRUST_DOM_TOKENS: &[&str] = &["trust-badge", "trust__badge", "badge-secure", "payment-icons"];

pub const TRUST_ALT_KEYWORDS: &[&str] = &[
    "visa",
    "mastercard",
    "amex",
    "american express",
    "paypal",
    "apple pay",
    "norton",
    "mcafee",
    "secure",
    "guarantee",
];

/// Scan `text` with a rule set and collect evidence windows around matches.
pub fn scan(text: &str, rules: &[Regex]) -> Vec<String> {
    let mut evidence = Vec::new();
    for rule in rules {
        for found in rule.find_iter(text).take(2) {
            evidence.push(evidence_window(text, found.start(), found.end()));
            if evidence.len() >= 6 {
                return evidence;
            }
        }
    }
    evidence
}

/// Excerpt up to [`MAX_EVIDENCE_CHARS`] characters centered on a match,
/// snapped to char boundaries.
fn evidence_window(text: &str, start: usize, end: usize) -> String {
    let match_len = end.saturating_sub(start);
    let pad = MAX_EVIDENCE_CHARS.saturating_sub(match_len.min(MAX_EVIDENCE_CHARS)) / 2;

    let mut lo = start.saturating_sub(pad);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + pad).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }

    text[lo..hi].split_whitespace().collect::<Vec<_>>().join(" ")
}
