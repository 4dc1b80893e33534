//! KMA domestic earthquake notice dashboard.
//!
//! The dashboard renders the latest micro-quake notice as a single HTML
//! block. The checkpoint stores the normalized text of the last emitted
//! block; a run emits only when the normalized text changed.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::domain::{EventKind, Level, NewEvent, SourceId};
use crate::ingest::adapter::{AdapterRun, SourceAdapter};
use crate::ingest::text::normalize_html;
use crate::ingest::time::parse_kst_slash;

const PAGE_URL: &str = "https://www.weather.go.kr/w/eqk-vol/search/korea.do";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL_SECS: u64 = 120;

/// The notice block inside the dashboard page.
static NOTICE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<p[^>]*>.*?</p>").expect("notice block regex should compile")
});

/// `2025/12/25 05:14:43 <region> (규모:1.5 / 깊이:8km)` after normalization.
static NOTICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})\s+(.+?)\s*\(\s*규모\s*:\s*([0-9.]+)\s*/\s*깊이\s*:\s*([0-9.]+)\s*km\s*\)",
    )
    .expect("notice regex should compile")
});

/// Adapter for the earthquake notice dashboard.
pub struct QuakeNoticeAdapter {
    client: reqwest::Client,
}

impl QuakeNoticeAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        self.client
            .get(PAGE_URL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl Default for QuakeNoticeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for QuakeNoticeAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::QuakeNotice
    }

    fn poll_interval_secs(&self) -> u64 {
        POLL_INTERVAL_SECS
    }

    async fn run(&self, prior_state: Option<&str>) -> AdapterRun {
        let html = match self.fetch().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(error = %e, "quake notice fetch failed");
                return AdapterRun::unchanged(prior_state);
            }
        };
        process_page(&html, prior_state)
    }
}

/// Snapshot-hash dedup: the normalized notice text is both the dedup key
/// and the stored state.
pub(crate) fn process_page(html: &str, prior_state: Option<&str>) -> AdapterRun {
    let Some(block) = NOTICE_BLOCK_RE.find(html) else {
        tracing::warn!("quake notice block not found in page");
        return AdapterRun::unchanged(prior_state);
    };

    let normalized = normalize_html(block.as_str());
    if prior_state == Some(normalized.as_str()) {
        return AdapterRun::unchanged(prior_state);
    }

    let Some(draft) = parse_notice(&normalized) else {
        tracing::warn!(text = %normalized, "unparseable quake notice skipped");
        return AdapterRun::unchanged(prior_state);
    };

    AdapterRun {
        events: vec![draft],
        next_state: Some(normalized),
    }
}

fn parse_notice(text: &str) -> Option<NewEvent> {
    let caps = NOTICE_RE.captures(text)?;
    let occurred_at = parse_kst_slash(&caps[1]);
    let region = caps[2].trim().to_string();
    let magnitude: f64 = caps[3].parse().ok()?;
    let depth_km: f64 = caps[4].parse().ok()?;

    Some(NewEvent {
        kind: EventKind::QuakeNotice,
        title: format!("{region} 규모 {magnitude:.1} 미소지진"),
        body: Some(text.to_string()),
        occurred_at,
        region_text: Some(region),
        level: level_for_magnitude(magnitude),
        payload: Some(json!({
            "magnitude": magnitude,
            "depthKm": depth_km,
        })),
    })
}

/// Notice-page quakes are mostly micro events; the scale caps at Severe.
fn level_for_magnitude(magnitude: f64) -> Level {
    if magnitude >= 4.0 {
        Level::Severe
    } else if magnitude >= 3.0 {
        Level::Moderate
    } else if magnitude >= 2.0 {
        Level::Minor
    } else {
        Level::Info
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const PAGE: &str =
        "<html><body><p>2025/12/25 05:14:43 경남 밀양시 동쪽 15km 지역 (규모:1.5 / 깊이:8km)</p></body></html>";

    #[test]
    fn first_run_emits_one_event() {
        let run = process_page(PAGE, None);
        assert_eq!(run.events.len(), 1);

        let event = &run.events[0];
        assert_eq!(event.title, "경남 밀양시 동쪽 15km 지역 규모 1.5 미소지진");
        assert_eq!(event.kind, EventKind::QuakeNotice);
        assert_eq!(event.level, Level::Info);
        let Some(occurred_at) = event.occurred_at else {
            panic!("time should parse");
        };
        assert_eq!(occurred_at.to_rfc3339(), "2025-12-24T20:14:43+00:00");
        let Some(payload) = event.payload.as_ref() else {
            panic!("payload should be set");
        };
        assert_eq!(payload["depthKm"].as_f64(), Some(8.0));
        assert_eq!(payload["magnitude"].as_f64(), Some(1.5));
    }

    #[test]
    fn identical_page_emits_nothing() {
        let first = process_page(PAGE, None);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let second = process_page(PAGE, Some(&state));
        assert!(second.events.is_empty());
        assert_eq!(second.next_state.as_deref(), Some(state.as_str()));
    }

    #[test]
    fn whitespace_variations_are_one_snapshot() {
        let reformatted =
            "<p> 2025/12/25  05:14:43 경남 밀양시 동쪽 15km 지역 (규모:1.5 / 깊이:8km) </p>";
        let first = process_page(PAGE, None);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let second = process_page(reformatted, Some(&state));
        assert!(second.events.is_empty());
    }

    #[test]
    fn changed_notice_emits_again() {
        let first = process_page(PAGE, None);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let updated =
            "<p>2025/12/25 09:02:11 충북 옥천군 북쪽 3km 지역 (규모:2.2 / 깊이:12km)</p>";
        let second = process_page(updated, Some(&state));
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].level, Level::Minor);
    }

    #[test]
    fn page_without_block_is_unchanged() {
        let run = process_page("<html><body>nothing here</body></html>", Some("old"));
        assert!(run.events.is_empty());
        assert_eq!(run.next_state.as_deref(), Some("old"));
    }

    #[test]
    fn garbled_notice_keeps_prior_state() {
        let run = process_page("<p>점검중입니다</p>", Some("old"));
        assert!(run.events.is_empty());
        assert_eq!(run.next_state.as_deref(), Some("old"));
    }

    #[test]
    fn magnitude_level_table() {
        assert_eq!(level_for_magnitude(1.9), Level::Info);
        assert_eq!(level_for_magnitude(2.0), Level::Minor);
        assert_eq!(level_for_magnitude(3.4), Level::Moderate);
        assert_eq!(level_for_magnitude(4.1), Level::Severe);
    }
}
