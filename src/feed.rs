//! Change-feed intake from the storage layer's replication mechanism.
//!
//! The storage engine reports inserted/updated record ids in batches;
//! routing each batch through the materializer's dedup pass is what
//! converges state written by other devices. The consumer holds the
//! worker only while a batch is being applied — waiting for the next
//! batch happens outside the serialized loop.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use daybook_core::DaybookResult;

use crate::worker::MaterializerHandle;

/// One batch of touched record ids, keyed by entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub days: Vec<Uuid>,
    pub activities: Vec<Uuid>,
    pub tasks: Vec<Uuid>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty() && self.activities.is_empty() && self.tasks.is_empty()
    }
}

/// Long-lived consumer of replication batches.
///
/// Applies one batch at a time through the serialized worker and
/// forwards the affected dates for cache invalidation and notification
/// rescheduling.
pub struct ChangeFeed {
    handle: MaterializerHandle,
    batches: mpsc::Receiver<ChangeBatch>,
    affected: mpsc::Sender<BTreeSet<NaiveDate>>,
}

impl ChangeFeed {
    pub fn new(
        handle: MaterializerHandle,
        batches: mpsc::Receiver<ChangeBatch>,
        affected: mpsc::Sender<BTreeSet<NaiveDate>>,
    ) -> Self {
        ChangeFeed {
            handle,
            batches,
            affected,
        }
    }

    /// Process batches until the input channel closes.
    ///
    /// The first repository failure ends the loop and surfaces to the
    /// caller; retry and backoff are the supervisor's concern, not
    /// handled here.
    pub async fn run(mut self) -> DaybookResult<()> {
        while let Some(batch) = self.batches.recv().await {
            if batch.is_empty() {
                continue;
            }
            let affected = self.handle.apply_change_batch(batch).await?;
            if affected.is_empty() {
                continue;
            }
            debug!(dates = affected.len(), "change batch touched dates");
            if self.affected.send(affected).await.is_err() {
                info!("affected-dates receiver dropped, stopping change feed");
                break;
            }
        }
        Ok(())
    }
}
