//! Two-tier merchandising-feature detection.
//!
//! Five detectors run per captured stage: fixed pattern rules first, and for
//! upsell and trust-badge only, a bounded external text classifier when the
//! rules find nothing. Detector failures never propagate; the worst outcome
//! is a low-confidence negative.

mod classifier;
mod content;
mod detectors;
mod rules;

pub use classifier::{
    parse_verdict, ClassifierConfig, ClassifierVerdict, ClassifyError, HttpClassifier,
    TextClassifier,
};
pub use content::StageContent;
pub use detectors::{
    DetectorConfidence, DetectorSet, CLASSIFIER_MISS_CONFIDENCE, DELIVERY_RULE_CONFIDENCE,
    FREE_SHIPPING_RULE_CONFIDENCE, PROTECTION_RULE_CONFIDENCE, RULE_MISS_CONFIDENCE,
    TRUST_RULE_CONFIDENCE, UPSELL_RULE_CONFIDENCE,
};
