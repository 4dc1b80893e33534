//! Repeatable-job installation at startup.

use super::registry::SourceRegistry;
use crate::domain::SourceId;
use crate::error::VigilError;
use crate::queue::JobQueue;

/// Stable job id for a source's poll job.
#[must_use]
pub fn job_id(source_id: SourceId) -> String {
    format!("ingest:{source_id}")
}

/// Registers one repeatable job per adapter.
///
/// Adapters with a non-positive interval are skipped with a warning.
/// Idempotent across restarts: the same job id overwrites its schedule.
///
/// # Errors
///
/// Returns [`VigilError::Queue`] when a registration fails.
pub async fn install_jobs(queue: &JobQueue, registry: &SourceRegistry) -> Result<(), VigilError> {
    for adapter in registry.list() {
        let source_id = adapter.source_id();
        let interval_secs = adapter.poll_interval_secs();
        if interval_secs == 0 {
            tracing::warn!(source = %source_id, "adapter has no poll interval, not scheduled");
            continue;
        }
        queue
            .register_repeatable(&job_id(source_id), source_id, interval_secs * 1000)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_stable_per_source() {
        assert_eq!(job_id(SourceId::Sms), "ingest:sms");
        assert_eq!(job_id(SourceId::Pews), "ingest:pews");
        assert_eq!(job_id(SourceId::WeatherAlert), "ingest:weather_alert");
    }
}
