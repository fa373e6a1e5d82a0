//! The journey state machine.
//!
//! Phases run in one fixed order with no back-transitions. Homepage failure
//! is fatal; every other stage failure is logged and the stage omitted. The
//! session and concurrency slot are released on every exit path.

use std::sync::Arc;
use std::time::Duration;

use cdp_session::{PagePort, SessionFactory};
use feature_detectors::DetectorSet;
use funnelprobe_core_types::{
    ConcurrencyStatus, FunnelStage, Journey, JourneyStatus, StageResult,
};
use navigator::{post_load_pass, safe_navigate, NavTimeouts, Pacing};
use platform_probe::{fingerprint, PlatformFingerprint};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::content::{extract_stage_content, has_identity_challenge, snippets_from};
use crate::error::{EngineError, StageError};
use crate::governor::SessionGovernor;
use crate::profiles::profile_for;
use crate::sink::ArtifactSink;
use crate::steps::cart::CartExperience;
use crate::steps::{add_to_cart, cart, checkout, contact, discovery, payment, variant};

pub use crate::steps::payment::CardProfile;

/// Tunables for one runner instance.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub max_sessions: usize,
    pub pacing: Pacing,
    pub nav: NavTimeouts,
    /// Used when no country selector is found and the caller passed none.
    pub default_country: String,
    pub card: CardProfile,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 3,
            pacing: Pacing::Normal,
            nav: NavTimeouts::default(),
            default_country: "US".to_string(),
            card: CardProfile::default(),
        }
    }
}

/// Per-journey traversal state. The fingerprint is computed once and cached
/// here for the journey's lifetime.
struct JourneyCtx {
    base: Url,
    fingerprint: PlatformFingerprint,
    product_url: Option<String>,
    on_product_page: bool,
    drawer_open: bool,
    drawer_captured: bool,
    checkout_url: Option<String>,
    homepage_screenshot: Option<String>,
}

/// Runs journeys against targets, bounded by the session governor.
pub struct JourneyRunner {
    sessions: Arc<dyn SessionFactory>,
    artifacts: Arc<dyn ArtifactSink>,
    detectors: DetectorSet,
    governor: Arc<SessionGovernor>,
    config: RunnerConfig,
}

impl JourneyRunner {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        artifacts: Arc<dyn ArtifactSink>,
        detectors: DetectorSet,
        config: RunnerConfig,
    ) -> Self {
        let governor = SessionGovernor::new(config.max_sessions);
        Self {
            sessions,
            artifacts,
            detectors,
            governor,
            config,
        }
    }

    pub fn concurrency_status(&self) -> ConcurrencyStatus {
        self.governor.status()
    }

    /// Run one complete journey. Returns after full traversal; the caller
    /// owns any progress bookkeeping.
    pub async fn run_journey(&self, target: &str, country: Option<&str>) -> Journey {
        let _permit = self.governor.acquire().await;

        let mut journey = Journey::new(target);
        journey.status = JourneyStatus::Running;
        info!(target: "journey-engine", journey = %journey.id, site = target, "journey started");

        let session = match self.sessions.create_session().await {
            Ok(session) => session,
            Err(err) => {
                let fatal = EngineError::SessionCreate(err);
                warn!(target: "journey-engine", journey = %journey.id, %fatal, "journey aborted");
                journey.fail(fatal.to_string());
                return journey;
            }
        };

        let outcome = self.drive(&mut journey, session.as_ref(), country).await;

        // Cleanup is unconditional; a close failure never affects the result.
        if let Err(err) = session.close().await {
            warn!(target: "journey-engine", journey = %journey.id, %err, "session close failed");
        }

        match outcome {
            Ok(()) => {
                journey.complete();
                info!(
                    target: "journey-engine",
                    journey = %journey.id,
                    stages = journey.stages.len(),
                    "journey completed"
                );
            }
            Err(fatal) => {
                journey.stages.clear();
                warn!(target: "journey-engine", journey = %journey.id, %fatal, "journey failed");
                journey.fail(fatal.to_string());
            }
        }
        journey
    }

    async fn drive(
        &self,
        journey: &mut Journey,
        page: &dyn PagePort,
        country: Option<&str>,
    ) -> Result<(), EngineError> {
        let target = journey.target.clone();

        if !safe_navigate(page, &target, &self.config.nav).await {
            return Err(EngineError::HomepageUnreachable(target));
        }
        post_load_pass(page, self.config.pacing).await;

        let landed = page.current_url().await.unwrap_or_else(|_| target.clone());
        let base = Url::parse(&landed)
            .or_else(|_| Url::parse(&target))
            .map_err(|_| EngineError::HomepageUnreachable(target.clone()))?;

        let mut ctx = JourneyCtx {
            base,
            fingerprint: fingerprint(page).await,
            product_url: None,
            on_product_page: false,
            drawer_open: false,
            drawer_captured: false,
            checkout_url: None,
            homepage_screenshot: None,
        };

        let mut homepage = self.capture_stage(page, FunnelStage::Homepage).await;
        homepage.notes.push(format!(
            "platform {} (confidence {:.0})",
            ctx.fingerprint.platform.as_str(),
            ctx.fingerprint.confidence
        ));
        ctx.homepage_screenshot = homepage.screenshot.clone();
        journey.stages.push(homepage);

        for stage in &FunnelStage::TRAVERSAL[1..] {
            match self.run_stage(*stage, page, &mut ctx, country).await {
                Ok(results) => {
                    for result in results {
                        journey.stages.push(result);
                    }
                }
                Err(err) => {
                    warn!(
                        target: "journey-engine",
                        journey = %journey.id,
                        stage = stage.as_str(),
                        %err,
                        "stage failed; omitted from results"
                    );
                }
            }
        }

        let summary = self.build_summary(journey, &ctx);
        journey.stages.insert(0, summary);
        Ok(())
    }

    /// One stage attempt. `Ok(vec![])` means the stage was skipped because a
    /// prerequisite never materialized; `Err` is a stage-local failure.
    async fn run_stage(
        &self,
        stage: FunnelStage,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
        country: Option<&str>,
    ) -> Result<Vec<StageResult>, StageError> {
        match stage {
            FunnelStage::ProductDiscovery => self.stage_discovery(page, ctx).await,
            FunnelStage::ProductPage => self.stage_product_page(page, ctx).await,
            FunnelStage::AddToCart => self.stage_add_to_cart(page, ctx).await,
            FunnelStage::CartDrawer => self.stage_cart_drawer(page, ctx).await,
            FunnelStage::CartPage => self.stage_cart_page(page, ctx).await,
            FunnelStage::CheckoutEntry => self.stage_checkout_entry(page, ctx).await,
            FunnelStage::ContactShipping => self.stage_contact(page, ctx, country).await,
            FunnelStage::ShippingMethod => self.stage_shipping_method(page, ctx).await,
            FunnelStage::PaymentEntry => self.stage_payment(page, ctx).await,
            // Driven outside the loop.
            FunnelStage::Homepage | FunnelStage::Summary => Ok(Vec::new()),
        }
    }

    async fn stage_discovery(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        let href = match discovery::discover_product(page).await {
            Ok(href) => href,
            Err(StageError::NoProductFound) => {
                // The homepage showed nothing product-shaped; one catalog
                // guess before giving the stage up.
                let catalog = ctx
                    .base
                    .join("/collections/all")
                    .map_err(|_| StageError::NoProductFound)?;
                if !safe_navigate(page, catalog.as_str(), &self.config.nav).await {
                    return Err(StageError::NoProductFound);
                }
                sleep(self.config.pacing.settle(Duration::from_millis(500))).await;
                discovery::discover_product(page).await?
            }
            Err(err) => return Err(err),
        };

        ctx.product_url = Some(href.clone());
        let mut result = self.capture_stage(page, FunnelStage::ProductDiscovery).await;
        result.notes.push(format!("selected product {href}"));
        Ok(vec![result])
    }

    async fn stage_product_page(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        let Some(url) = ctx.product_url.clone() else {
            return Ok(Vec::new());
        };
        if !safe_navigate(page, &url, &self.config.nav).await {
            return Err(StageError::NavigationFailed(url));
        }
        post_load_pass(page, self.config.pacing).await;
        ctx.on_product_page = true;
        Ok(vec![self.capture_stage(page, FunnelStage::ProductPage).await])
    }

    async fn stage_add_to_cart(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        if !ctx.on_product_page {
            return Ok(Vec::new());
        }

        if let Some(technique) = variant::select_variant(page, &ctx.fingerprint.selectors).await? {
            debug!(target: "journey-engine", technique, "variant selected");
        }

        let layer = add_to_cart::add_to_cart(page, &ctx.fingerprint.selectors).await?;
        sleep(self.config.pacing.settle(Duration::from_millis(700))).await;

        let mut result = self.capture_stage(page, FunnelStage::AddToCart).await;
        result.notes.push(format!("added via {layer}"));
        Ok(vec![result])
    }

    async fn stage_cart_drawer(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        if ctx.product_url.is_none() {
            return Ok(Vec::new());
        }
        if !cart::drawer_visible(page, &ctx.fingerprint.selectors).await {
            return Ok(Vec::new());
        }
        ctx.drawer_open = true;
        ctx.drawer_captured = true;
        let mut result = self.capture_stage(page, FunnelStage::CartDrawer).await;
        result.notes.push("cart drawer open".to_string());
        Ok(vec![result])
    }

    async fn stage_cart_page(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        if ctx.product_url.is_none() {
            return Ok(Vec::new());
        }
        match cart::resolve_cart(page, &ctx.fingerprint.selectors, &ctx.base, &self.config.nav)
            .await?
        {
            CartExperience::Page { url } => {
                ctx.drawer_open = false;
                let mut result = self.capture_stage(page, FunnelStage::CartPage).await;
                result.notes.push(format!("cart page at {url}"));
                Ok(vec![result])
            }
            CartExperience::DrawerOnly => {
                // Not a failure: the drawer is the cart. Capture it now if the
                // ephemeral pass after add-to-cart never saw it open.
                ctx.drawer_open = cart::drawer_visible(page, &ctx.fingerprint.selectors).await;
                if ctx.drawer_open && !ctx.drawer_captured {
                    ctx.drawer_captured = true;
                    let mut result = self.capture_stage(page, FunnelStage::CartDrawer).await;
                    result.notes.push("drawer-only cart".to_string());
                    return Ok(vec![result]);
                }
                Ok(Vec::new())
            }
        }
    }

    async fn stage_checkout_entry(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        if ctx.product_url.is_none() {
            return Ok(Vec::new());
        }
        let url = checkout::enter_checkout(
            page,
            &ctx.fingerprint.selectors,
            &ctx.base,
            &self.config.nav,
            self.config.pacing,
            ctx.drawer_open,
        )
        .await?;
        ctx.checkout_url = Some(url.clone());
        ctx.drawer_open = false;

        let mut result = self.capture_stage(page, FunnelStage::CheckoutEntry).await;
        result.notes.push(format!("checkout reached at {url}"));
        Ok(vec![result])
    }

    async fn stage_contact(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
        country: Option<&str>,
    ) -> Result<Vec<StageResult>, StageError> {
        if ctx.checkout_url.is_none() {
            return Ok(Vec::new());
        }
        let content = extract_stage_content(page).await;
        if has_identity_challenge(&content) {
            return Err(StageError::IdentityChallenge);
        }

        let detected = contact::detect_country(page).await;
        let code = country
            .map(str::to_string)
            .or(detected)
            .unwrap_or_else(|| self.config.default_country.clone());
        let profile = profile_for(&code);

        let filled = contact::fill_contact(page, profile).await?;
        let mut result = self.capture_stage(page, FunnelStage::ContactShipping).await;
        result
            .notes
            .push(format!("country {}, {filled} fields filled", profile.country));

        if contact::advance(page, contact::CONTINUE_TEXTS).await? {
            result.notes.push("advanced to shipping".to_string());
        }
        Ok(vec![result])
    }

    async fn stage_shipping_method(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        if ctx.checkout_url.is_none() {
            return Ok(Vec::new());
        }
        sleep(self.config.pacing.settle(Duration::from_millis(600))).await;

        let selected = contact::select_shipping_method(page).await?;
        let mut result = self.capture_stage(page, FunnelStage::ShippingMethod).await;
        if selected {
            result.notes.push("shipping method selected".to_string());
        }
        let _ = contact::advance(page, contact::PAYMENT_CONTINUE_TEXTS).await;
        Ok(vec![result])
    }

    async fn stage_payment(
        &self,
        page: &dyn PagePort,
        ctx: &mut JourneyCtx,
    ) -> Result<Vec<StageResult>, StageError> {
        if ctx.checkout_url.is_none() {
            return Ok(Vec::new());
        }
        let content = extract_stage_content(page).await;
        if has_identity_challenge(&content) {
            return Err(StageError::IdentityChallenge);
        }

        let filled = payment::fill_payment(page, &self.config.card).await?;
        sleep(self.config.pacing.settle(Duration::from_millis(400))).await;

        let mut result = self.capture_stage(page, FunnelStage::PaymentEntry).await;
        result
            .notes
            .push(format!("{filled} payment fields filled, submission never attempted"));
        Ok(vec![result])
    }

    async fn capture_stage(&self, page: &dyn PagePort, stage: FunnelStage) -> StageResult {
        let url = page.current_url().await.unwrap_or_default();
        let mut result = StageResult::new(stage, url);

        match page.screenshot().await {
            Ok(bytes) => match self.artifacts.persist(bytes).await {
                Ok(reference) => result.screenshot = Some(reference),
                Err(err) => result.notes.push(format!("capture not persisted: {err}")),
            },
            Err(err) => result.notes.push(format!("screenshot failed: {err}")),
        }

        let content = extract_stage_content(page).await;
        if has_identity_challenge(&content) {
            result.notes.push("identity challenge visible".to_string());
        }
        result.snippets = snippets_from(&content, 5);
        result.detections = Some(self.detectors.run(stage, &content).await);
        result
    }

    /// Synthetic aggregate stage, prepended to the final list. Reuses the
    /// homepage screenshot and carries no detections of its own.
    fn build_summary(&self, journey: &Journey, ctx: &JourneyCtx) -> StageResult {
        let mut summary = StageResult::new(FunnelStage::Summary, journey.target.clone());
        summary.screenshot = ctx.homepage_screenshot.clone();
        summary.notes.push(format!(
            "captured {} of {} stages",
            journey.stages.len(),
            FunnelStage::TRAVERSAL.len()
        ));
        summary.notes.push(format!(
            "platform {}",
            ctx.fingerprint.platform.as_str()
        ));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_session::scripted::ScriptedPage;
    use cdp_session::{SessionError, SessionErrorKind};
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedFactory {
        pages: Mutex<VecDeque<Arc<ScriptedPage>>>,
    }

    impl ScriptedFactory {
        fn single(page: Arc<ScriptedPage>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(VecDeque::from([page])),
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(VecDeque::new()),
            })
        }
    }

    #[async_trait]
    impl SessionFactory for ScriptedFactory {
        async fn create_session(&self) -> Result<Arc<dyn PagePort>, SessionError> {
            self.pages
                .lock()
                .pop_front()
                .map(|page| page as Arc<dyn PagePort>)
                .ok_or_else(|| {
                    SessionError::new(SessionErrorKind::Internal).with_hint("no session available")
                })
        }
    }

    fn runner(factory: Arc<ScriptedFactory>) -> JourneyRunner {
        JourneyRunner::new(
            factory,
            Arc::new(MemorySink::default()),
            DetectorSet::rules_only(),
            RunnerConfig {
                pacing: Pacing::Fast,
                ..RunnerConfig::default()
            },
        )
    }

    fn stage_names(journey: &Journey) -> Vec<&'static str> {
        journey.stages.iter().map(|s| s.stage.as_str()).collect()
    }

    /// Script a full storefront: discovery, add-to-cart, drawer, cart page,
    /// checkout, and checkout sub-phases all respond.
    fn script_happy_path(page: &ScriptedPage) {
        page.on_eval(
            "dom_hints",
            json!({
                "text": "Free shipping on orders over $50. Welcome to the linen shop, est. 2015.",
                "buttons": ["Add to cart"],
                "dom_hints": [],
                "iframe_hosts": [],
                "image_alts": [],
            }),
        );
        page.on_eval(
            "best_seller",
            json!([
                { "href": "https://shop.example/products/gift-card", "text": "Gift Card", "best_seller": false },
                { "href": "https://shop.example/products/linen-shirt", "text": "Linen Shirt", "best_seller": true },
            ]),
        );
        page.on_eval(
            "/cart/add",
            json!({ "status": "ok", "selectors": ["button.atc-tagged"] }),
        );
        page.on_eval("cart-drawer", json!({ "open": true }));
        page.on_eval("is_cart", json!({ "is_cart": true }));
        page.on_eval(
            "name='checkout'",
            json!({ "status": "ok", "selectors": ["button.co-tagged"] }),
        );
        page.redirect_on_click("co-tagged", "https://shop.example/checkouts/c/1");
        page.on_eval("selectedOptions", json!({ "found": true, "code": "GB" }));
        page.on_eval("first_name", json!({ "filled": 6 }));
        page.on_eval("shipping-method", json!({ "selected": true }));
        page.on_eval("cc-?number", json!({ "filled": 4 }));
    }

    #[tokio::test]
    async fn full_traversal_preserves_stage_order() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        script_happy_path(&page);
        let runner = runner(ScriptedFactory::single(page.clone()));

        let journey = runner.run_journey("https://shop.example", None).await;

        assert_eq!(journey.status, JourneyStatus::Completed);
        assert_eq!(
            stage_names(&journey),
            vec![
                "summary",
                "homepage",
                "product_discovery",
                "product_page",
                "add_to_cart",
                "cart_drawer",
                "cart_page",
                "checkout_entry",
                "contact_shipping",
                "shipping_method",
                "payment_entry",
            ]
        );
        assert!(page.closed());

        let summary = &journey.stages[0];
        assert!(summary.detections.is_none());
        assert_eq!(summary.screenshot, journey.stages[1].screenshot);

        let homepage = &journey.stages[1];
        let detections = homepage.detections.as_ref().unwrap();
        assert!(detections.free_shipping_threshold.present);

        let contact = journey
            .stages
            .iter()
            .find(|s| s.stage == FunnelStage::ContactShipping)
            .unwrap();
        assert!(contact.notes.iter().any(|note| note.contains("country GB")));
    }

    #[tokio::test]
    async fn homepage_failure_is_fatal_with_empty_stages() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        page.queue_navigation(Err(SessionError::new(SessionErrorKind::CdpIo)));
        let runner = runner(ScriptedFactory::single(page.clone()));

        let journey = runner.run_journey("https://dead.example", None).await;

        assert_eq!(journey.status, JourneyStatus::Failed);
        assert!(journey.stages.is_empty());
        assert!(journey.error.as_deref().unwrap().contains("homepage"));
        // Cleanup still ran.
        assert!(page.closed());
    }

    #[tokio::test]
    async fn discovery_failure_is_isolated_to_its_stage() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        page.on_eval(
            "dom_hints",
            json!({ "text": "A storefront with no product links anywhere on it." }),
        );
        page.on_eval("best_seller", json!([]));
        let runner = runner(ScriptedFactory::single(page.clone()));

        let journey = runner.run_journey("https://shop.example", None).await;

        assert_eq!(journey.status, JourneyStatus::Completed);
        assert_eq!(stage_names(&journey), vec!["summary", "homepage"]);
        assert!(journey.error.is_none());
        assert!(page.closed());
    }

    #[tokio::test]
    async fn gift_only_catalog_skips_downstream_stages() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        page.on_eval("dom_hints", json!({ "text": "Gift cards for every occasion." }));
        page.on_eval(
            "best_seller",
            json!([
                { "href": "https://shop.example/products/gift-card", "text": "Gift Card", "best_seller": true },
            ]),
        );
        let runner = runner(ScriptedFactory::single(page.clone()));

        let journey = runner.run_journey("https://shop.example", None).await;

        assert_eq!(journey.status, JourneyStatus::Completed);
        assert_eq!(stage_names(&journey), vec!["summary", "homepage"]);
    }

    #[tokio::test]
    async fn session_creation_failure_fails_the_journey() {
        let runner = runner(ScriptedFactory::empty());
        let journey = runner.run_journey("https://shop.example", None).await;

        assert_eq!(journey.status, JourneyStatus::Failed);
        assert!(journey.error.as_deref().unwrap().contains("session creation"));
        assert!(journey.stages.is_empty());
    }

    #[tokio::test]
    async fn drawer_only_cart_keeps_order_without_a_cart_page() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        script_happy_path(&page);
        // Override: no cart page anywhere, the drawer stays the cart.
        page.on_eval("is_cart", json!({ "is_cart": false }));

        let runner = runner(ScriptedFactory::single(page.clone()));
        let journey = runner.run_journey("https://shop.example", None).await;

        assert_eq!(journey.status, JourneyStatus::Completed);
        let names = stage_names(&journey);
        assert!(!names.contains(&"cart_page"));
        assert!(names.contains(&"cart_drawer"));
        let drawer_idx = names.iter().position(|n| *n == "cart_drawer").unwrap();
        let checkout_idx = names.iter().position(|n| *n == "checkout_entry").unwrap();
        assert!(drawer_idx < checkout_idx);
    }

    #[tokio::test]
    async fn country_override_beats_detection() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        script_happy_path(&page);
        let runner = runner(ScriptedFactory::single(page.clone()));

        let journey = runner.run_journey("https://shop.example", Some("DE")).await;
        let contact = journey
            .stages
            .iter()
            .find(|s| s.stage == FunnelStage::ContactShipping)
            .unwrap();
        assert!(contact.notes.iter().any(|note| note.contains("country DE")));
    }

    #[tokio::test]
    async fn payment_stage_fills_but_never_submits() {
        let page = Arc::new(ScriptedPage::new("about:blank"));
        script_happy_path(&page);
        let runner = runner(ScriptedFactory::single(page.clone()));

        let journey = runner.run_journey("https://shop.example", None).await;
        let payment = journey
            .stages
            .iter()
            .find(|s| s.stage == FunnelStage::PaymentEntry)
            .unwrap();
        assert!(payment
            .notes
            .iter()
            .any(|note| note.contains("submission never attempted")));

        // After checkout entry, the only clicks left belong to the contact /
        // shipping advance controls; none carry payment wording.
        let journal = page.journal();
        let checkout_click = journal
            .iter()
            .position(|entry| entry.contains("co-tagged"))
            .unwrap();
        for entry in &journal[checkout_click + 1..] {
            if entry.starts_with("click:") {
                assert!(
                    !entry.contains("pay"),
                    "payment-looking control clicked: {entry}"
                );
            }
        }
    }

    #[tokio::test]
    async fn governor_status_reflects_configuration() {
        let runner = runner(ScriptedFactory::empty());
        let status = runner.concurrency_status();
        assert_eq!(status.max, 3);
        assert_eq!(status.active, 0);
        assert_eq!(status.queued, 0);
    }
}
