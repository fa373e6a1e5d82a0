//! End-to-end journey flows over scripted sessions: the CLI-side sink and
//! report plumbed into the real runner, no browser involved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use cdp_session::scripted::ScriptedPage;
use cdp_session::{PagePort, SessionError, SessionErrorKind, SessionFactory};
use feature_detectors::DetectorSet;
use funnelprobe_cli::{report, FsArtifactSink};
use funnelprobe_core_types::{FunnelStage, JourneyStatus};
use journey_engine::{JourneyRunner, RunnerConfig};
use navigator::Pacing;

struct ScriptedFactory {
    pages: Mutex<VecDeque<Arc<ScriptedPage>>>,
}

impl ScriptedFactory {
    fn new(pages: impl IntoIterator<Item = Arc<ScriptedPage>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into_iter().collect()),
        })
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn create_session(&self) -> Result<Arc<dyn PagePort>, SessionError> {
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .map(|page| page as Arc<dyn PagePort>)
            .ok_or_else(|| {
                SessionError::new(SessionErrorKind::Internal).with_hint("no session available")
            })
    }
}

/// A storefront where every funnel phase responds.
fn script_full_storefront(page: &ScriptedPage) {
    page.on_eval(
        "dom_hints",
        json!({
            "text": "Order by 2pm for delivery by Friday. Free shipping on orders over $50.",
            "buttons": ["Add to cart"],
            "dom_hints": [],
            "iframe_hosts": [],
            "image_alts": [],
        }),
    );
    page.on_eval(
        "best_seller",
        json!([
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
    page.on_eval("selectedOptions", json!({ "found": false }));
    page.on_eval("first_name", json!({ "filled": 6 }));
    page.on_eval("shipping-method", json!({ "selected": true }));
    page.on_eval("cc-?number", json!({ "filled": 4 }));
}

fn runner_for(factory: Arc<ScriptedFactory>, max_sessions: usize) -> JourneyRunner {
    JourneyRunner::new(
        factory,
        Arc::new(journey_engine::MemorySink::default()),
        DetectorSet::rules_only(),
        RunnerConfig {
            max_sessions,
            pacing: Pacing::Fast,
            ..RunnerConfig::default()
        },
    )
}

#[tokio::test]
async fn full_funnel_audit_persists_captures_and_renders() {
    let page = Arc::new(ScriptedPage::new("about:blank"));
    script_full_storefront(&page);

    let artifacts = tempfile::tempdir().unwrap();
    let sink = FsArtifactSink::create(artifacts.path().to_path_buf())
        .await
        .unwrap();
    let run_dir = sink.run_dir().clone();

    let runner = JourneyRunner::new(
        ScriptedFactory::new([page.clone()]),
        Arc::new(sink),
        DetectorSet::rules_only(),
        RunnerConfig {
            pacing: Pacing::Fast,
            ..RunnerConfig::default()
        },
    );

    let journey = runner.run_journey("https://shop.example", None).await;

    assert_eq!(journey.status, JourneyStatus::Completed);
    let names: Vec<_> = journey.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(
        names,
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

    // Captures landed on disk and the stage results reference them.
    let persisted = std::fs::read_dir(&run_dir).unwrap().count();
    assert!(persisted >= 10);
    let homepage = &journey.stages[1];
    let reference = homepage.screenshot.as_deref().unwrap();
    assert!(reference.starts_with("file://"));
    assert!(std::path::Path::new(&reference["file://".len()..]).exists());

    let rendered = report::render(&journey);
    assert!(rendered.contains("status: completed"));
    assert!(rendered.contains("[payment_entry]"));
    assert!(rendered.contains("free_shipping_threshold"));
    assert!(rendered.contains("delivery_promise"));
}

#[tokio::test]
async fn homepage_failure_yields_failed_journey_with_empty_stages() {
    let page = Arc::new(ScriptedPage::new("about:blank"));
    page.queue_navigation(Err(SessionError::new(SessionErrorKind::CdpIo)));

    let runner = runner_for(ScriptedFactory::new([page.clone()]), 3);
    let journey = runner.run_journey("https://dead.example", None).await;

    assert_eq!(journey.status, JourneyStatus::Failed);
    assert!(journey.stages.is_empty());
    assert!(journey.error.is_some());
    assert!(page.closed());

    let rendered = report::render(&journey);
    assert!(rendered.contains("status: FAILED"));
    assert!(rendered.contains("error:"));
}

#[tokio::test]
async fn discovery_failure_degrades_to_homepage_and_summary() {
    let page = Arc::new(ScriptedPage::new("about:blank"));
    page.on_eval(
        "dom_hints",
        json!({ "text": "An editorial landing page with no products linked." }),
    );
    page.on_eval("best_seller", json!([]));

    let runner = runner_for(ScriptedFactory::new([page.clone()]), 3);
    let journey = runner.run_journey("https://shop.example", None).await;

    assert_eq!(journey.status, JourneyStatus::Completed);
    let names: Vec<_> = journey.stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(names, vec!["summary", "homepage"]);
    assert!(journey.error.is_none());

    let summary = &journey.stages[0];
    assert_eq!(summary.stage, FunnelStage::Summary);
    assert!(summary.detections.is_none());
}

#[tokio::test]
async fn single_slot_governor_serializes_parallel_journeys() {
    let first = Arc::new(ScriptedPage::new("about:blank"));
    let second = Arc::new(ScriptedPage::new("about:blank"));
    script_full_storefront(&first);
    script_full_storefront(&second);

    let runner = Arc::new(runner_for(
        ScriptedFactory::new([first.clone(), second.clone()]),
        1,
    ));

    let left = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run_journey("https://one.example", None).await })
    };
    let right = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run_journey("https://two.example", None).await })
    };

    let (left, right) = (left.await.unwrap(), right.await.unwrap());
    assert_eq!(left.status, JourneyStatus::Completed);
    assert_eq!(right.status, JourneyStatus::Completed);
    assert!(first.closed());
    assert!(second.closed());

    let status = runner.concurrency_status();
    assert_eq!(status.active, 0);
    assert_eq!(status.queued, 0);
    assert_eq!(status.max, 1);
}
