//! Shared primitives for the funnelprobe audit engine.
//!
//! Everything a journey produces flows through the types in this crate: the
//! ordered stage enum, per-stage results, and the evidence-backed detection
//! shape that export and UI consumers depend on bit-exactly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one audit journey.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JourneyId(pub Uuid);

impl JourneyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JourneyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JourneyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One discrete phase of the funnel traversal.
///
/// The serialized identifiers are a wire contract; renaming a variant string
/// breaks downstream export consumers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    /// Synthetic aggregate prepended to the final list; never traversed.
    Summary,
    Homepage,
    ProductDiscovery,
    ProductPage,
    AddToCart,
    CartDrawer,
    CartPage,
    CheckoutEntry,
    ContactShipping,
    ShippingMethod,
    PaymentEntry,
}

impl FunnelStage {
    /// Real traversal states in strict order. `Summary` is excluded: it is
    /// assembled from already-captured results, not driven.
    pub const TRAVERSAL: [FunnelStage; 10] = [
        FunnelStage::Homepage,
        FunnelStage::ProductDiscovery,
        FunnelStage::ProductPage,
        FunnelStage::AddToCart,
        FunnelStage::CartDrawer,
        FunnelStage::CartPage,
        FunnelStage::CheckoutEntry,
        FunnelStage::ContactShipping,
        FunnelStage::ShippingMethod,
        FunnelStage::PaymentEntry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::Summary => "summary",
            FunnelStage::Homepage => "homepage",
            FunnelStage::ProductDiscovery => "product_discovery",
            FunnelStage::ProductPage => "product_page",
            FunnelStage::AddToCart => "add_to_cart",
            FunnelStage::CartDrawer => "cart_drawer",
            FunnelStage::CartPage => "cart_page",
            FunnelStage::CheckoutEntry => "checkout_entry",
            FunnelStage::ContactShipping => "contact_shipping",
            FunnelStage::ShippingMethod => "shipping_method",
            FunnelStage::PaymentEntry => "payment_entry",
        }
    }

    /// Position within the traversal order, `None` for the synthetic summary.
    pub fn traversal_index(&self) -> Option<usize> {
        Self::TRAVERSAL.iter().position(|stage| stage == self)
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merchandising features the detection pipeline looks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    DeliveryPromise,
    Upsell,
    FreeShippingThreshold,
    ShippingProtection,
    TrustBadge,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 5] = [
        FeatureKind::DeliveryPromise,
        FeatureKind::Upsell,
        FeatureKind::FreeShippingThreshold,
        FeatureKind::ShippingProtection,
        FeatureKind::TrustBadge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::DeliveryPromise => "delivery_promise",
            FeatureKind::Upsell => "upsell",
            FeatureKind::FreeShippingThreshold => "free_shipping_threshold",
            FeatureKind::ShippingProtection => "shipping_protection",
            FeatureKind::TrustBadge => "trust_badge",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bound on evidence snippets carried by one detection.
pub const MAX_EVIDENCE: usize = 3;

/// Upper bound on the length of a single evidence snippet, in characters.
pub const MAX_EVIDENCE_CHARS: usize = 100;

/// Outcome of one feature detector on one captured stage.
///
/// Invariant enforced by [`Detection::normalized`]: a positive result always
/// carries at least one evidence snippet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub present: bool,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

impl Detection {
    pub fn negative(confidence: f64) -> Self {
        Self {
            present: false,
            confidence,
            evidence: Vec::new(),
        }
        .normalized()
    }

    pub fn positive(confidence: f64, evidence: impl IntoIterator<Item = String>) -> Self {
        let mut detection = Self {
            present: true,
            confidence,
            evidence: Vec::new(),
        };
        for snippet in evidence {
            detection.push_evidence(&snippet);
        }
        detection.normalized()
    }

    /// Append one evidence snippet, deduplicated and truncated to
    /// [`MAX_EVIDENCE_CHARS`]. Snippets past [`MAX_EVIDENCE`] are dropped.
    pub fn push_evidence(&mut self, snippet: &str) {
        if self.evidence.len() >= MAX_EVIDENCE {
            return;
        }
        let cleaned = truncate_chars(snippet.split_whitespace().collect::<Vec<_>>().join(" "));
        if cleaned.is_empty() || self.evidence.iter().any(|existing| existing == &cleaned) {
            return;
        }
        self.evidence.push(cleaned);
    }

    /// Enforce the detection invariants before the value leaves the pipeline:
    /// confidence clamped to `[0, 1]`, and a positive with no surviving
    /// evidence downgraded to a negative.
    pub fn normalized(mut self) -> Self {
        if !self.confidence.is_finite() {
            self.confidence = 0.0;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.evidence.truncate(MAX_EVIDENCE);
        if self.present && self.evidence.is_empty() {
            self.present = false;
        }
        if !self.present {
            self.evidence.clear();
        }
        self
    }
}

fn truncate_chars(snippet: String) -> String {
    if snippet.chars().count() <= MAX_EVIDENCE_CHARS {
        return snippet;
    }
    snippet.chars().take(MAX_EVIDENCE_CHARS).collect()
}

/// One detection per merchandising feature for a captured stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionSet {
    pub delivery_promise: Detection,
    pub upsell: Detection,
    pub free_shipping_threshold: Detection,
    pub shipping_protection: Detection,
    pub trust_badge: Detection,
}

impl DetectionSet {
    pub fn all_negative() -> Self {
        Self {
            delivery_promise: Detection::negative(0.0),
            upsell: Detection::negative(0.0),
            free_shipping_threshold: Detection::negative(0.0),
            shipping_protection: Detection::negative(0.0),
            trust_badge: Detection::negative(0.0),
        }
    }

    pub fn get(&self, kind: FeatureKind) -> &Detection {
        match kind {
            FeatureKind::DeliveryPromise => &self.delivery_promise,
            FeatureKind::Upsell => &self.upsell,
            FeatureKind::FreeShippingThreshold => &self.free_shipping_threshold,
            FeatureKind::ShippingProtection => &self.shipping_protection,
            FeatureKind::TrustBadge => &self.trust_badge,
        }
    }

    pub fn set(&mut self, kind: FeatureKind, detection: Detection) {
        match kind {
            FeatureKind::DeliveryPromise => self.delivery_promise = detection,
            FeatureKind::Upsell => self.upsell = detection,
            FeatureKind::FreeShippingThreshold => self.free_shipping_threshold = detection,
            FeatureKind::ShippingProtection => self.shipping_protection = detection,
            FeatureKind::TrustBadge => self.trust_badge = detection,
        }
    }

    pub fn normalized(mut self) -> Self {
        for kind in FeatureKind::ALL {
            let normalized = self.get(kind).clone().normalized();
            self.set(kind, normalized);
        }
        self
    }

    pub fn positives(&self) -> usize {
        FeatureKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).present)
            .count()
    }
}

/// Result for one successfully attempted stage. Immutable once appended to a
/// journey; the orchestrator never reorders or rewrites entries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: FunnelStage,
    pub url: String,
    /// Opaque reference handed back by the artifact sink, if a capture landed.
    pub screenshot: Option<String>,
    pub notes: Vec<String>,
    pub detections: Option<DetectionSet>,
    pub snippets: Vec<String>,
}

impl StageResult {
    pub fn new(stage: FunnelStage, url: impl Into<String>) -> Self {
        Self {
            stage,
            url: url.into(),
            screenshot: None,
            notes: Vec::new(),
            detections: None,
            snippets: Vec::new(),
        }
    }
}

/// Terminal status of one journey.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One audit attempt against one target site.
///
/// Exclusively owned by the orchestrator while running; handed out as an
/// immutable result once terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Journey {
    pub id: JourneyId,
    pub target: String,
    pub status: JourneyStatus,
    pub error: Option<String>,
    pub stages: Vec<StageResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Journey {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: JourneyId::new(),
            target: target.into(),
            status: JourneyStatus::Pending,
            error: None,
            stages: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = JourneyStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JourneyStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

/// Snapshot of the concurrency governor, surfaced to the external job layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyStatus {
    pub active: usize,
    pub max: usize,
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_identifiers_are_stable() {
        let encoded = serde_json::to_string(&FunnelStage::CartDrawer).unwrap();
        assert_eq!(encoded, "\"cart_drawer\"");
        let encoded = serde_json::to_string(&FunnelStage::Summary).unwrap();
        assert_eq!(encoded, "\"summary\"");
        assert_eq!(FunnelStage::PaymentEntry.as_str(), "payment_entry");
    }

    #[test]
    fn traversal_order_is_fixed_and_excludes_summary() {
        assert_eq!(FunnelStage::TRAVERSAL.len(), 10);
        assert_eq!(FunnelStage::TRAVERSAL[0], FunnelStage::Homepage);
        assert_eq!(FunnelStage::TRAVERSAL[9], FunnelStage::PaymentEntry);
        assert!(FunnelStage::Summary.traversal_index().is_none());
        assert_eq!(FunnelStage::CheckoutEntry.traversal_index(), Some(6));
    }

    #[test]
    fn positive_without_evidence_is_downgraded() {
        let detection = Detection {
            present: true,
            confidence: 0.92,
            evidence: Vec::new(),
        }
        .normalized();
        assert!(!detection.present);
        assert!(detection.evidence.is_empty());
    }

    #[test]
    fn evidence_is_capped_deduplicated_and_truncated() {
        let mut detection = Detection {
            present: true,
            confidence: 0.9,
            evidence: Vec::new(),
        };
        let long = "x".repeat(500);
        detection.push_evidence(&long);
        detection.push_evidence(&long);
        detection.push_evidence("free shipping over $50");
        detection.push_evidence("free   shipping over $50");
        detection.push_evidence("arrives by friday");
        detection.push_evidence("one too many");

        assert_eq!(detection.evidence.len(), MAX_EVIDENCE);
        assert_eq!(detection.evidence[0].chars().count(), MAX_EVIDENCE_CHARS);
        assert_eq!(detection.evidence[1], "free shipping over $50");
    }

    #[test]
    fn confidence_is_clamped() {
        let detection = Detection::positive(7.5, ["proof".to_string()]);
        assert_eq!(detection.confidence, 1.0);
        let detection = Detection::negative(-0.2);
        assert_eq!(detection.confidence, 0.0);
        let detection = Detection::positive(f64::NAN, ["proof".to_string()]);
        assert!(detection.present);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn journey_transitions_stamp_finish_time() {
        let mut journey = Journey::new("https://shop.example");
        assert_eq!(journey.status, JourneyStatus::Pending);
        journey.fail("homepage unreachable");
        assert_eq!(journey.status, JourneyStatus::Failed);
        assert!(journey.finished_at.is_some());
        assert_eq!(journey.error.as_deref(), Some("homepage unreachable"));
    }

    #[test]
    fn detection_set_counts_positives() {
        let mut set = DetectionSet::all_negative();
        set.trust_badge = Detection::positive(0.95, ["secure checkout".to_string()]);
        assert_eq!(set.positives(), 1);
        assert!(set.get(FeatureKind::TrustBadge).present);
        assert!(!set.get(FeatureKind::Upsell).present);
    }
}
