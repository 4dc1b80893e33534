//! National forest-fire status API.
//!
//! The dashboard serves the currently tracked fires as JSON; each fire
//! reappears on every poll until it leaves the list, and its progress
//! code advances as suppression proceeds. The checkpoint is a seen-set
//! keyed by `(fire id, progress code)` with a 7-day TTL, so each progress
//! step of a fire alerts exactly once.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{EventKind, Level, NewEvent, SourceId};
use crate::ingest::adapter::{AdapterRun, SourceAdapter};
use crate::ingest::seen::SeenSet;
use crate::ingest::text::collapse_whitespace;
use crate::ingest::time::parse_kst_dash;

const API_URL: &str = "https://fd.forest.go.kr/ffas/pubConn/occur/getShowFireInfoList.do";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL_SECS: u64 = 300;

/// Fires linger on the dashboard for days; keep dedup entries a week.
const SEEN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Suppression progress, mapped from the upstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// `01` — reported, response starting.
    Reported,
    /// `02` — suppression in progress.
    InProgress,
    /// `03` — extinguished.
    Completed,
    /// Any other code. Treated as non-alerting.
    Unknown,
}

impl Progress {
    pub(crate) fn from_code(code: &str) -> Self {
        match code {
            "01" => Self::Reported,
            "02" => Self::InProgress,
            "03" => Self::Completed,
            _ => Self::Unknown,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Reported => "발생",
            Self::InProgress => "진화중",
            Self::Completed => "진화완료",
            Self::Unknown => "상황보고",
        }
    }

    /// Completed and unknown codes never boost severity; a repeat report
    /// for a finished fire is informational only.
    fn level(self) -> Level {
        match self {
            Self::Reported => Level::Moderate,
            Self::InProgress => Level::Severe,
            Self::Completed | Self::Unknown => Level::Info,
        }
    }
}

/// One fire entry in the dashboard response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FireItem {
    /// Stable fire identifier.
    #[serde(rename = "frfrInfoId")]
    pub id: String,
    /// Ignition point address.
    #[serde(rename = "frfrSttmnAddr", default)]
    pub address: Option<String>,
    /// Report time, `YYYY-MM-DD HH:MM:SS` KST.
    #[serde(rename = "frfrSttmnDt", default)]
    pub reported_at: Option<String>,
    /// Progress code.
    #[serde(rename = "frfrPrgrsStcd", default)]
    pub progress_code: String,
}

#[derive(Debug, Deserialize)]
struct FireResponse {
    #[serde(rename = "fireShowInfoList", default)]
    fires: Vec<FireItem>,
}

/// Adapter for the forest-fire dashboard.
pub struct ForestFireAdapter {
    client: reqwest::Client,
}

impl ForestFireAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch(&self) -> Result<Vec<FireItem>, reqwest::Error> {
        let response: FireResponse = self
            .client
            .get(API_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.fires)
    }
}

impl Default for ForestFireAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for ForestFireAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::ForestFire
    }

    fn poll_interval_secs(&self) -> u64 {
        POLL_INTERVAL_SECS
    }

    async fn run(&self, prior_state: Option<&str>) -> AdapterRun {
        let fires = match self.fetch().await {
            Ok(fires) => fires,
            Err(e) => {
                tracing::warn!(error = %e, "forest fire fetch failed");
                return AdapterRun::unchanged(prior_state);
            }
        };
        process_fires(&fires, prior_state, Utc::now())
    }
}

/// Emits one event per unseen `(fire, progress)` pair.
pub(crate) fn process_fires(
    fires: &[FireItem],
    prior_state: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> AdapterRun {
    let mut seen = SeenSet::from_state(prior_state);
    seen.prune(SEEN_TTL, now);

    let mut events = Vec::new();
    for fire in fires {
        if fire.id.is_empty() {
            tracing::warn!("fire entry without id skipped");
            continue;
        }
        let key = format!("{}:{}", fire.id, fire.progress_code);
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key, now);
        events.push(draft_from(fire));
    }

    AdapterRun {
        events,
        next_state: seen.to_state(),
    }
}

fn draft_from(fire: &FireItem) -> NewEvent {
    let progress = Progress::from_code(&fire.progress_code);
    let address = fire
        .address
        .as_deref()
        .map(collapse_whitespace)
        .filter(|address| !address.is_empty());

    let place = address.as_deref().unwrap_or("위치 미상");
    NewEvent {
        kind: EventKind::ForestFire,
        title: format!("{place} 산불 {}", progress.label()),
        body: None,
        occurred_at: fire.reported_at.as_deref().and_then(parse_kst_dash),
        region_text: address,
        level: progress.level(),
        payload: Some(json!({
            "fireId": fire.id.clone(),
            "progressCode": fire.progress_code.clone(),
        })),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn fire(id: &str, code: &str) -> FireItem {
        FireItem {
            id: id.to_string(),
            address: Some("경북 의성군 안평면".to_string()),
            reported_at: Some("2025-12-25 05:14:43".to_string()),
            progress_code: code.to_string(),
        }
    }

    #[test]
    fn new_fire_alerts_at_progress_level() {
        let fires = vec![fire("F1", "02")];
        let run = process_fires(&fires, None, Utc::now());
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].title, "경북 의성군 안평면 산불 진화중");
        assert_eq!(run.events[0].level, Level::Severe);
        assert_eq!(run.events[0].kind, EventKind::ForestFire);
    }

    #[test]
    fn same_fire_and_progress_alerts_once() {
        let now = Utc::now();
        let fires = vec![fire("F1", "02")];
        let first = process_fires(&fires, None, now);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let second = process_fires(&fires, Some(&state), now);
        assert!(second.events.is_empty());
    }

    #[test]
    fn progress_change_alerts_again() {
        let now = Utc::now();
        let first = process_fires(&[fire("F1", "02")], None, now);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let second = process_fires(&[fire("F1", "03")], Some(&state), now);
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].level, Level::Info);
        assert_eq!(second.events[0].title, "경북 의성군 안평면 산불 진화완료");
    }

    #[test]
    fn unknown_progress_code_is_non_boosting() {
        let run = process_fires(&[fire("F1", "99")], None, Utc::now());
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].level, Level::Info);
    }

    #[test]
    fn reported_time_converts_to_utc() {
        let run = process_fires(&[fire("F1", "01")], None, Utc::now());
        let Some(occurred_at) = run.events[0].occurred_at else {
            panic!("time should parse");
        };
        assert_eq!(occurred_at.to_rfc3339(), "2025-12-24T20:14:43+00:00");
    }

    #[test]
    fn missing_address_gets_placeholder_title() {
        let mut item = fire("F1", "01");
        item.address = None;
        let run = process_fires(&[item], None, Utc::now());
        assert_eq!(run.events[0].title, "위치 미상 산불 발생");
        assert!(run.events[0].region_text.is_none());
    }

    #[test]
    fn entries_without_id_are_skipped() {
        let mut item = fire("", "01");
        item.address = None;
        let run = process_fires(&[item], None, Utc::now());
        assert!(run.events.is_empty());
    }

    #[test]
    fn progress_code_table() {
        assert_eq!(Progress::from_code("01"), Progress::Reported);
        assert_eq!(Progress::from_code("02"), Progress::InProgress);
        assert_eq!(Progress::from_code("03"), Progress::Completed);
        assert_eq!(Progress::from_code("77"), Progress::Unknown);
    }
}
