//! Artifact persistence port. The production sink lives outside the core;
//! the engine only needs `bytes in, opaque reference out`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("artifact sink failure: {0}")]
pub struct SinkError(pub String);

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist one captured image, returning an opaque reference.
    async fn persist(&self, bytes: Vec<u8>) -> Result<String, SinkError>;
}

/// Counting in-memory sink for tests and dry runs; bytes are dropped.
#[derive(Default)]
pub struct MemorySink {
    count: AtomicUsize,
}

impl MemorySink {
    pub fn persisted(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn persist(&self, _bytes: Vec<u8>) -> Result<String, SinkError> {
        let index = self.count.fetch_add(1, Ordering::Relaxed);
        Ok(format!("mem://capture-{index}"))
    }
}
