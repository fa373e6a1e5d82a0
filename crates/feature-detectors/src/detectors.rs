use std::sync::Arc;

use funnelprobe_core_types::{Detection, DetectionSet, FeatureKind, FunnelStage};
use tracing::debug;

use crate::classifier::{ClassifyError, TextClassifier};
use crate::content::StageContent;
use crate::rules::{
    scan, DELIVERY_RULES, FREE_SHIPPING_RULES, PROTECTION_RULES, TRUST_ALT_KEYWORDS,
    TRUST_DOM_TOKENS, TRUST_RULES, UPSELL_DOM_TOKENS, UPSELL_RULES,
};

// Rule confidences are empirical values carried over from production tuning;
// they are intentionally named constants rather than a derived scale.
pub const DELIVERY_RULE_CONFIDENCE: f64 = 0.92;
pub const UPSELL_RULE_CONFIDENCE: f64 = 0.90;
pub const FREE_SHIPPING_RULE_CONFIDENCE: f64 = 0.93;
pub const PROTECTION_RULE_CONFIDENCE: f64 = 0.88;
pub const TRUST_RULE_CONFIDENCE: f64 = 0.95;
/// Negative confidence when no rule matched and no fallback ran.
pub const RULE_MISS_CONFIDENCE: f64 = 0.25;
/// Negative confidence after a failed or unusable classifier call.
pub const CLASSIFIER_MISS_CONFIDENCE: f64 = 0.15;

/// Per-feature rule confidences, overridable as one block.
#[derive(Clone, Copy, Debug)]
pub struct DetectorConfidence {
    pub delivery: f64,
    pub upsell: f64,
    pub free_shipping: f64,
    pub protection: f64,
    pub trust: f64,
}

impl Default for DetectorConfidence {
    fn default() -> Self {
        Self {
            delivery: DELIVERY_RULE_CONFIDENCE,
            upsell: UPSELL_RULE_CONFIDENCE,
            free_shipping: FREE_SHIPPING_RULE_CONFIDENCE,
            protection: PROTECTION_RULE_CONFIDENCE,
            trust: TRUST_RULE_CONFIDENCE,
        }
    }
}

/// The five-feature detection pipeline for one journey.
pub struct DetectorSet {
    classifier: Option<Arc<dyn TextClassifier>>,
    confidence: DetectorConfidence,
}

impl DetectorSet {
    /// Rules-only pipeline; the classifier fallback is skipped entirely.
    pub fn rules_only() -> Self {
        Self {
            classifier: None,
            confidence: DetectorConfidence::default(),
        }
    }

    pub fn with_classifier(classifier: Arc<dyn TextClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
            confidence: DetectorConfidence::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: DetectorConfidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Run every detector against one captured stage. Total: always returns a
    /// normalized set, never raises.
    pub async fn run(&self, stage: FunnelStage, content: &StageContent) -> DetectionSet {
        let mut set = DetectionSet::all_negative();

        set.delivery_promise = rule_detection(
            scan(&content.text, &DELIVERY_RULES),
            self.confidence.delivery,
        );

        set.free_shipping_threshold = rule_detection(
            scan(&banner_text(content), &FREE_SHIPPING_RULES),
            self.confidence.free_shipping,
        );

        set.shipping_protection = rule_detection(
            scan(&banner_text(content), &PROTECTION_RULES),
            self.confidence.protection,
        );

        set.upsell = self
            .two_tier(
                FeatureKind::Upsell,
                stage,
                content,
                upsell_rule_evidence(content),
                self.confidence.upsell,
            )
            .await;

        set.trust_badge = self
            .two_tier(
                FeatureKind::TrustBadge,
                stage,
                content,
                trust_rule_evidence(content),
                self.confidence.trust,
            )
            .await;

        set.normalized()
    }

    /// Rules first; classifier fallback only on a rules miss, degrading to a
    /// low-confidence negative on any failure.
    async fn two_tier(
        &self,
        kind: FeatureKind,
        stage: FunnelStage,
        content: &StageContent,
        rule_evidence: Vec<String>,
        rule_confidence: f64,
    ) -> Detection {
        if !rule_evidence.is_empty() {
            return Detection::positive(rule_confidence, rule_evidence);
        }

        let Some(classifier) = &self.classifier else {
            return Detection::negative(RULE_MISS_CONFIDENCE);
        };

        let prompt = build_prompt(kind, stage, content);
        match classifier.classify(&prompt).await {
            Ok(verdict) => {
                // normalized() downgrades an evidence-free positive.
                Detection {
                    present: verdict.present,
                    confidence: verdict.confidence,
                    evidence: verdict.evidence,
                }
                .normalized()
            }
            Err(err) => {
                log_degrade(kind, &err);
                Detection::negative(CLASSIFIER_MISS_CONFIDENCE)
            }
        }
    }
}

fn log_degrade(kind: FeatureKind, err: &ClassifyError) {
    debug!(
        target: "feature-detectors",
        feature = kind.as_str(),
        %err,
        "classifier fallback degraded to negative"
    );
}

fn rule_detection(evidence: Vec<String>, confidence: f64) -> Detection {
    if evidence.is_empty() {
        Detection::negative(RULE_MISS_CONFIDENCE)
    } else {
        Detection::positive(confidence, evidence)
    }
}

/// Free-shipping and protection copy often lives on controls rather than in
/// flowing text, so buttons are scanned too.
fn banner_text(content: &StageContent) -> String {
    let mut text = content.text.clone();
    for button in &content.buttons {
        text.push('\n');
        text.push_str(button);
    }
    text
}

fn upsell_rule_evidence(content: &StageContent) -> Vec<String> {
    let mut evidence = scan(&content.text, &UPSELL_RULES);
    for hint in &content.dom_hints {
        let lowered = hint.to_lowercase();
        if UPSELL_DOM_TOKENS.iter().any(|token| lowered.contains(token)) {
            evidence.push(format!("module: {hint}"));
        }
    }
    evidence
}

fn trust_rule_evidence(content: &StageContent) -> Vec<String> {
    let mut evidence = scan(&content.text, &TRUST_RULES);
    for alt in &content.image_alts {
        let lowered = alt.to_lowercase();
        if TRUST_ALT_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
        {
            evidence.push(alt.clone());
        }
    }
    for hint in &content.dom_hints {
        let lowered = hint.to_lowercase();
        if TRUST_DOM_TOKENS.iter().any(|token| lowered.contains(token)) {
            evidence.push(format!("module: {hint}"));
        }
    }
    evidence
}

fn build_prompt(kind: FeatureKind, stage: FunnelStage, content: &StageContent) -> String {
    let question = match kind {
        FeatureKind::Upsell => {
            "Does this page show an upsell or cross-sell module (recommendations, \
             frequently-bought-together, complete-the-look)?"
        }
        FeatureKind::TrustBadge => {
            "Does this page show trust badges (security seals, guarantees, payment marks \
             presented as reassurance)?"
        }
        _ => "Is the feature present?",
    };

    let text: String = content.text.chars().take(2_000).collect();
    let buttons = content.buttons.join(" | ");
    format!(
        "{question}\n\nStage: {stage}\n\nVisible buttons: {buttons}\n\nPage text:\n{text}",
        question = question,
        stage = stage.as_str(),
        buttons = buttons,
        text = text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierVerdict, ClassifyError};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct ScriptedClassifier {
        verdicts: Mutex<Vec<Result<ClassifierVerdict, ClassifyError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClassifier {
        fn new(verdicts: Vec<Result<ClassifierVerdict, ClassifyError>>) -> Arc<Self> {
            Arc::new(Self {
                verdicts: Mutex::new(verdicts),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl TextClassifier for ScriptedClassifier {
        async fn classify(&self, prompt: &str) -> Result<ClassifierVerdict, ClassifyError> {
            self.calls.lock().push(prompt.to_string());
            self.verdicts
                .lock()
                .pop()
                .unwrap_or_else(|| Err(ClassifyError::Http("script exhausted".to_string())))
        }
    }

    fn product_page_content() -> StageContent {
        StageContent::from_text(
            "Linen Shirt $68. Order within 3 hours and get it by Thursday. \
             Free shipping on orders over $100. You may also like: Linen Trousers. \
             Add Route Package Protection for $1.95. 30-day returns, secure checkout.",
        )
    }

    #[tokio::test]
    async fn rules_fire_across_all_five_features() {
        let set = DetectorSet::rules_only()
            .run(FunnelStage::ProductPage, &product_page_content())
            .await;

        assert!(set.delivery_promise.present);
        assert_eq!(set.delivery_promise.confidence, DELIVERY_RULE_CONFIDENCE);
        assert!(set.upsell.present);
        assert!(set.free_shipping_threshold.present);
        assert!(set.shipping_protection.present);
        assert!(set.trust_badge.present);

        for kind in FeatureKind::ALL {
            let detection = set.get(kind);
            assert!(detection.confidence >= 0.0 && detection.confidence <= 1.0);
            if detection.present {
                assert!(!detection.evidence.is_empty() && detection.evidence.len() <= 3);
            }
        }
    }

    #[tokio::test]
    async fn ambiguous_upsell_without_classifier_resolves_negative() {
        let content = StageContent::from_text("Handmade ceramics from our studio in Lisbon.");
        let set = DetectorSet::rules_only()
            .run(FunnelStage::ProductPage, &content)
            .await;

        assert!(!set.upsell.present);
        assert!(set.upsell.confidence <= 0.3);
        assert!(set.upsell.evidence.is_empty());
    }

    #[tokio::test]
    async fn classifier_is_skipped_when_rules_hit() {
        let classifier = ScriptedClassifier::new(vec![]);
        let detectors = DetectorSet::with_classifier(classifier.clone());
        let set = detectors
            .run(FunnelStage::ProductPage, &product_page_content())
            .await;

        assert!(set.upsell.present);
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn classifier_positive_without_evidence_is_downgraded() {
        let classifier = ScriptedClassifier::new(vec![
            Ok(ClassifierVerdict {
                present: true,
                confidence: 0.7,
                evidence: vec![],
            }),
            Ok(ClassifierVerdict {
                present: true,
                confidence: 0.7,
                evidence: vec![],
            }),
        ]);
        let detectors = DetectorSet::with_classifier(classifier);
        let content = StageContent::from_text("Plain page with nothing notable.");
        let set = detectors.run(FunnelStage::CartPage, &content).await;

        assert!(!set.upsell.present);
        assert!(!set.trust_badge.present);
    }

    #[tokio::test]
    async fn classifier_failure_degrades_silently() {
        let classifier = ScriptedClassifier::new(vec![
            Err(ClassifyError::Http("boom".to_string())),
            Err(ClassifyError::Contract("prose".to_string())),
        ]);
        let detectors = DetectorSet::with_classifier(classifier);
        let content = StageContent::from_text("Plain page with nothing notable.");
        let set = detectors.run(FunnelStage::CartPage, &content).await;

        assert!(!set.upsell.present);
        assert_eq!(set.upsell.confidence, CLASSIFIER_MISS_CONFIDENCE);
        assert!(!set.trust_badge.present);
    }

    #[tokio::test]
    async fn classifier_positive_with_evidence_survives() {
        let classifier = ScriptedClassifier::new(vec![
            Ok(ClassifierVerdict {
                present: false,
                confidence: 0.2,
                evidence: vec![],
            }),
            Ok(ClassifierVerdict {
                present: true,
                confidence: 0.74,
                evidence: vec!["shop the full look".to_string()],
            }),
        ]);
        let detectors = DetectorSet::with_classifier(classifier);
        let content = StageContent::from_text("Shop the full look below.");
        let set = detectors.run(FunnelStage::ProductPage, &content).await;

        assert!(set.upsell.present);
        assert_eq!(set.upsell.evidence, vec!["shop the full look".to_string()]);
        assert!(!set.trust_badge.present);
    }

    #[tokio::test]
    async fn dom_hints_count_as_structure_evidence() {
        let content = StageContent {
            text: "Some product copy.".to_string(),
            dom_hints: vec!["section.related-products".to_string()],
            image_alts: vec!["Visa".to_string()],
            ..StageContent::default()
        };
        let set = DetectorSet::rules_only()
            .run(FunnelStage::ProductPage, &content)
            .await;

        assert!(set.upsell.present);
        assert!(set.trust_badge.present);
        assert!(set.trust_badge.evidence.contains(&"Visa".to_string()));
    }
}
