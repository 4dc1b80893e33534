//! Ingest job execution.
//!
//! One [`IngestWorker`] runs per ingest-enabled instance. The job queue
//! calls [`IngestWorker::process`] with a source id; the worker runs the
//! adapter once and applies the checkpoint-guarded at-least-once write
//! protocol: events first, checkpoint only after every insert succeeded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::registry::SourceRegistry;
use super::writer::EventWriter;
use crate::domain::SourceId;
use crate::error::VigilError;
use crate::persistence::CheckpointStore;
use crate::queue::JobProcessor;

/// Executes adapter polls with single-flight per source.
pub struct IngestWorker {
    registry: Arc<SourceRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    writer: EventWriter,
    /// Sources with a poll currently executing on this worker.
    running: Mutex<HashSet<SourceId>>,
}

impl IngestWorker {
    /// Creates a worker over the given registry, checkpoint store, and
    /// event writer.
    #[must_use]
    pub fn new(
        registry: Arc<SourceRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        writer: EventWriter,
    ) -> Self {
        Self {
            registry,
            checkpoints,
            writer,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Wraps the worker into the queue's processor callback.
    #[must_use]
    pub fn processor(self: &Arc<Self>) -> JobProcessor {
        let worker = Arc::clone(self);
        Arc::new(move |source_id| {
            let worker = Arc::clone(&worker);
            Box::pin(async move { worker.process(source_id).await })
        })
    }

    /// Runs one poll job for `source_id`.
    ///
    /// Adapter and insert failures are absorbed here (logged, checkpoint
    /// left alone) so the queue's retry policy fires only on
    /// infrastructure errors, which do propagate.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError`] only for checkpoint-store I/O failures.
    pub async fn process(&self, source_id: SourceId) -> Result<(), VigilError> {
        let Some(adapter) = self.registry.get(source_id) else {
            tracing::warn!(source = %source_id, "job for unregistered source dropped");
            return Ok(());
        };

        if !self.try_acquire(source_id) {
            tracing::info!(source = %source_id, "poll already in flight, skipping fire");
            return Ok(());
        }
        let result = self.run_guarded(source_id, adapter.as_ref()).await;
        self.release(source_id);
        result
    }

    async fn run_guarded(
        &self,
        source_id: SourceId,
        adapter: &dyn super::adapter::SourceAdapter,
    ) -> Result<(), VigilError> {
        let checkpoint = self.checkpoints.get(source_id).await?;
        let prior_state = checkpoint.and_then(|row| row.state);

        let fetched_at = Utc::now();
        let run = adapter.run(prior_state.as_deref()).await;
        let emitted = run.events.len();

        let mut all_inserted = true;
        for draft in run.events {
            match self.writer.append(draft, source_id, fetched_at).await {
                Ok(event) => {
                    tracing::debug!(source = %source_id, event_id = %event.id, "event ingested");
                }
                Err(e) => {
                    all_inserted = false;
                    tracing::error!(source = %source_id, error = %e, "event insert failed");
                }
            }
        }

        if all_inserted {
            self.checkpoints
                .upsert(source_id, run.next_state.as_deref())
                .await?;
            if emitted > 0 {
                tracing::info!(source = %source_id, count = emitted, "poll complete");
            }
        } else {
            // Next run retries with the old state; the adapter's own dedup
            // keeps the already-inserted events from duplicating.
            tracing::warn!(source = %source_id, "insert failures, checkpoint not advanced");
        }

        Ok(())
    }

    fn try_acquire(&self, source_id: SourceId) -> bool {
        self.running
            .lock()
            .map(|mut running| running.insert(source_id))
            .unwrap_or(false)
    }

    fn release(&self, source_id: SourceId) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&source_id);
        }
    }
}
