//! The journey state machine and its supporting layers.
//!
//! One journey drives one exclusively-owned browsing session through the
//! fixed funnel phase sequence, isolating per-stage failures, capturing
//! evidence at every reached phase, and releasing its concurrency slot and
//! session on every exit path.

pub mod content;
pub mod error;
pub mod governor;
pub mod profiles;
pub mod sink;
pub mod steps;

mod orchestrator;

pub use error::{EngineError, StageError};
pub use governor::{GovernorPermit, SessionGovernor};
pub use orchestrator::{CardProfile, JourneyRunner, RunnerConfig};
pub use profiles::{profile_for, AddressProfile};
pub use sink::{ArtifactSink, MemorySink, SinkError};
