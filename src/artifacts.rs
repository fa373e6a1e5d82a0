//! Filesystem artifact sink.
//!
//! The production deployment persists captures through an external sink; this
//! built-in default writes them under a per-run directory so the CLI is
//! useful on its own.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use journey_engine::{ArtifactSink, SinkError};
use tracing::debug;

#[derive(Debug)]
pub struct FsArtifactSink {
    run_dir: PathBuf,
    counter: AtomicUsize,
}

impl FsArtifactSink {
    /// Create the sink and its run directory under `root`.
    pub async fn create(root: PathBuf) -> Result<Self, SinkError> {
        let run_dir = root.join(format!("run-{}", Utc::now().format("%Y%m%d-%H%M%S")));
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|err| SinkError(format!("create {}: {err}", run_dir.display())))?;
        Ok(Self {
            run_dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn run_dir(&self) -> &PathBuf {
        &self.run_dir
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn persist(&self, bytes: Vec<u8>) -> Result<String, SinkError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.run_dir.join(format!("capture-{index:04}.png"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|err| SinkError(format!("write {}: {err}", path.display())))?;
        debug!(target: "funnelprobe", path = %path.display(), bytes = bytes.len(), "capture persisted");
        Ok(format!("file://{}", path.display()))
    }
}
