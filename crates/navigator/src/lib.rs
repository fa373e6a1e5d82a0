//! Resilient navigation for unknown storefronts.
//!
//! Page loads go through a cascading wait strategy (network idle, then DOM
//! ready, then the bare load event); a successful load is followed by a
//! settle pause, a lazy-content scroll pass, and an interstitial-dismissal
//! pass. Navigation failure is reported, never raised: the journey decides
//! what a failed load means.

pub mod dismiss;
mod engine;

pub use dismiss::{default_dismiss_strategies, dismiss_interstitials, DismissStrategy, DismissTechnique};
pub use engine::{post_load_pass, safe_navigate, NavTimeouts, Pacing};
