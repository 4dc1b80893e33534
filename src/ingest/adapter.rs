//! The source adapter contract.
//!
//! An adapter owns everything source-specific: fetching, parsing,
//! deduplication, and the shape of its resumable state. The framework
//! hands it the prior checkpoint string and stores whatever state comes
//! back, without ever inspecting it.

use async_trait::async_trait;

use crate::domain::{NewEvent, SourceId};

/// Result of one adapter poll.
#[derive(Debug, Clone, Default)]
pub struct AdapterRun {
    /// Ordered event drafts; empty on no news or on transient failure.
    pub events: Vec<NewEvent>,
    /// Opaque state to persist when every emitted event inserts cleanly.
    pub next_state: Option<String>,
}

impl AdapterRun {
    /// A run that emitted nothing and keeps the prior state.
    #[must_use]
    pub fn unchanged(prior_state: Option<&str>) -> Self {
        Self {
            events: Vec::new(),
            next_state: prior_state.map(ToString::to_string),
        }
    }
}

/// A pollable upstream source.
///
/// Implementations must swallow transport and parse failures — `run`
/// returns [`AdapterRun::unchanged`] on anything transient and only
/// propagates programmer bugs by panicking. Every outbound request must
/// carry a bounded timeout.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The tag stamped on every event this adapter produces.
    fn source_id(&self) -> SourceId;

    /// Seconds between scheduled polls. Non-positive disables the source.
    fn poll_interval_secs(&self) -> u64;

    /// Polls the source once, given the stored checkpoint state (or
    /// `None` on the first ever run).
    async fn run(&self, prior_state: Option<&str>) -> AdapterRun;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_keeps_prior_state() {
        let run = AdapterRun::unchanged(Some("107"));
        assert!(run.events.is_empty());
        assert_eq!(run.next_state.as_deref(), Some("107"));

        let first = AdapterRun::unchanged(None);
        assert!(first.next_state.is_none());
    }
}
