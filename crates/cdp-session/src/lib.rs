//! Browsing sessions for funnelprobe, driven over the Chromium DevTools
//! Protocol.
//!
//! Each journey owns exactly one session for its lifetime. The [`page::PagePort`]
//! trait is the seam every upper layer programs against; the chromium-backed
//! implementation lives behind it, and [`scripted::ScriptedPage`] stands in for
//! it in tests.

pub mod config;
pub mod error;
pub mod page;
pub mod scripted;
pub mod transport;

mod chromium;

pub use chromium::ChromiumSessionFactory;
pub use config::SessionConfig;
pub use error::{SessionError, SessionErrorKind};
pub use page::{PagePort, SessionFactory, WaitGate};
