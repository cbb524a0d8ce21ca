//! Completeness gate for received runs.
//!
//! Uploads of a run accumulate in `staging/`. Once the number of staged
//! artifacts reaches `hours x layers`, the whole run is promoted into
//! `storage/` and older runs of the model are removed from both
//! `storage/` and `staging/`. Checks are
//! serialized so a run is promoted exactly once.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::layout::StorageLayout;

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Still waiting for more uploads.
    Pending { staged: usize, expected: usize },
    /// The run was promoted; holds the promoted file names.
    Promoted(Vec<String>),
}

pub struct CompletenessGate {
    layout: Arc<StorageLayout>,
    lock: Mutex<()>,
}

impl CompletenessGate {
    pub fn new(layout: Arc<StorageLayout>) -> Self {
        Self {
            layout,
            lock: Mutex::new(()),
        }
    }

    /// Promote the run of `model` if `expected` artifacts are staged.
    pub async fn check(&self, model: &str, run: &str, expected: usize) -> Result<GateOutcome> {
        let _guard = self.lock.lock().await;

        let staged = self.layout.staged_count(model, run).await?;
        if staged < expected {
            debug!(model = %model, run = %run, staged, expected, "Waiting for more files");
            return Ok(GateOutcome::Pending { staged, expected });
        }

        let promoted = self.layout.promote_staged_run(model, run).await?;
        let removed = self.layout.delete_previous_runs(model, run, None).await?;
        let cleared = self.layout.clear_stale_staging(model, run).await?;
        info!(
            model = %model,
            run = %run,
            promoted = promoted.len(),
            removed,
            cleared,
            "Promoted complete run"
        );
        Ok(GateOutcome::Promoted(promoted))
    }
}
