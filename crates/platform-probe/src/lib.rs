//! Storefront fingerprinting.
//!
//! Identifies the commerce platform (and, where possible, the theme) of a
//! target site and resolves the selector-strategy bundle interaction steps
//! prefer. Recognition is an optimization only: every consumer must also
//! operate on the generic bundle.

mod fingerprint;
mod selectors;

pub use fingerprint::{
    fingerprint, fingerprint_from_signals, Platform, PlatformFingerprint, PlatformSignals,
    INDICATOR_HIT_WEIGHT, MIN_INDICATOR_HITS, RUNTIME_MARKER_CONFIDENCE, SCAN_CONFIDENCE_CAP,
};
pub use selectors::SelectorBundle;
