//! National disaster text-message feed.
//!
//! The feed is a JSON list of cell-broadcast messages, each carrying a
//! monotonically increasing serial. The checkpoint stores the highest
//! serial emitted so far; a run emits only strictly newer items.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::domain::{EventKind, Level, NewEvent, SourceId};
use crate::ingest::adapter::{AdapterRun, SourceAdapter};
use crate::ingest::text::collapse_whitespace;
use crate::ingest::time::parse_kst_slash;

const FEED_URL: &str =
    "https://www.safetydata.go.kr/V2/api/DSSP-IF-00247?pageNo=1&numOfRows=30";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL_SECS: u64 = 60;

/// One message as served by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsItem {
    /// Monotone serial.
    #[serde(rename = "md101_sn")]
    pub serial: u64,
    /// Message text.
    pub msg: String,
    /// Issue time, `YYYY/MM/DD HH:MM:SS` KST.
    #[serde(rename = "create_date", default)]
    pub created_at: Option<String>,
    /// Receiving region label.
    #[serde(rename = "location_name", default)]
    pub location: Option<String>,
    /// Emergency step label (위급재난 / 긴급재난 / 안전안내).
    #[serde(rename = "emrg_step_nm", default)]
    pub emergency_step: Option<String>,
}

/// Adapter for the disaster text-message feed.
pub struct SmsAdapter {
    client: reqwest::Client,
}

impl SmsAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch(&self) -> Result<Vec<SmsItem>, reqwest::Error> {
        self.client
            .get(FEED_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

impl Default for SmsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for SmsAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Sms
    }

    fn poll_interval_secs(&self) -> u64 {
        POLL_INTERVAL_SECS
    }

    async fn run(&self, prior_state: Option<&str>) -> AdapterRun {
        let items = match self.fetch().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "sms feed fetch failed");
                return AdapterRun::unchanged(prior_state);
            }
        };
        process_items(&items, prior_state)
    }
}

/// Watermark filter: emit items with `serial > stored watermark`, advance
/// the watermark to the highest serial seen.
pub(crate) fn process_items(items: &[SmsItem], prior_state: Option<&str>) -> AdapterRun {
    let watermark: u64 = prior_state.and_then(|raw| raw.parse().ok()).unwrap_or(0);

    let mut fresh: Vec<&SmsItem> = items.iter().filter(|item| item.serial > watermark).collect();
    fresh.sort_by_key(|item| item.serial);

    let next_watermark = fresh.last().map_or(watermark, |item| item.serial);
    let events = fresh.into_iter().map(draft_from).collect();

    AdapterRun {
        events,
        next_state: Some(next_watermark.to_string()),
    }
}

fn draft_from(item: &SmsItem) -> NewEvent {
    let title = collapse_whitespace(&item.msg);
    NewEvent {
        kind: classify_kind(&title),
        title,
        body: None,
        occurred_at: item.created_at.as_deref().and_then(parse_kst_slash),
        region_text: item.location.clone(),
        level: level_for_step(item.emergency_step.as_deref()),
        payload: Some(json!({
            "serial": item.serial,
            "emergencyStep": item.emergency_step.clone(),
        })),
    }
}

/// Keyword classification of the message text. First match wins; messages
/// with no recognizable keyword fall through to `Etc`.
fn classify_kind(message: &str) -> EventKind {
    const KEYWORDS: [(&str, EventKind); 14] = [
        ("지진해일", EventKind::Tsunami),
        ("지진", EventKind::Earthquake),
        ("호우", EventKind::HeavyRain),
        ("태풍", EventKind::Typhoon),
        ("산불", EventKind::ForestFire),
        ("화재", EventKind::Fire),
        ("홍수", EventKind::Flood),
        ("산사태", EventKind::Landslide),
        ("한파", EventKind::ColdWave),
        ("폭염", EventKind::HeatWave),
        ("대설", EventKind::HeavySnow),
        ("미세먼지", EventKind::AirQuality),
        ("실종", EventKind::MissingPerson),
        ("민방위", EventKind::CivilDefense),
    ];
    KEYWORDS
        .into_iter()
        .find(|(keyword, _)| message.contains(keyword))
        .map_or(EventKind::Etc, |(_, kind)| kind)
}

/// Emergency-step label to severity: 위급재난 ⇒ Critical, 긴급재난 ⇒
/// Severe, anything else (안전안내 and unknown) ⇒ Info.
fn level_for_step(step: Option<&str>) -> Level {
    match step {
        Some(step) if step.contains("위급") => Level::Critical,
        Some(step) if step.contains("긴급") => Level::Severe,
        _ => Level::Info,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn item(serial: u64, msg: &str) -> SmsItem {
        SmsItem {
            serial,
            msg: msg.to_string(),
            created_at: Some("2025/12/25 05:14:43".to_string()),
            location: Some("서울특별시".to_string()),
            emergency_step: Some("안전안내".to_string()),
        }
    }

    #[test]
    fn first_run_emits_all_and_sets_watermark() {
        let items = vec![item(100, "호우 주의"), item(101, "호우 경보")];
        let run = process_items(&items, None);
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.next_state.as_deref(), Some("101"));
    }

    #[test]
    fn second_run_emits_only_newer_serials() {
        let items = vec![item(101, "호우 경보"), item(102, "해제"), item(103, "추가")];
        let run = process_items(&items, Some("101"));
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.next_state.as_deref(), Some("103"));
    }

    #[test]
    fn unchanged_feed_emits_nothing_and_keeps_watermark() {
        let items = vec![item(100, "a"), item(101, "b")];
        let first = process_items(&items, None);
        let Some(state) = first.next_state else {
            panic!("watermark should be set");
        };
        let second = process_items(&items, Some(&state));
        assert!(second.events.is_empty());
        assert_eq!(second.next_state.as_deref(), Some("101"));
    }

    #[test]
    fn events_come_out_in_serial_order() {
        let items = vec![item(103, "c"), item(101, "a"), item(102, "b")];
        let run = process_items(&items, Some("100"));
        let serials: Vec<u64> = run
            .events
            .iter()
            .filter_map(|event| event.payload.as_ref())
            .filter_map(|payload| payload["serial"].as_u64())
            .collect();
        assert_eq!(serials, vec![101, 102, 103]);
    }

    #[test]
    fn malformed_watermark_replays_from_zero() {
        let items = vec![item(100, "a")];
        let run = process_items(&items, Some("not a number"));
        assert_eq!(run.events.len(), 1);
    }

    #[test]
    fn kind_classification_first_match_wins() {
        assert_eq!(classify_kind("동해안 지진해일 주의"), EventKind::Tsunami);
        assert_eq!(classify_kind("규모 3.1 지진 발생"), EventKind::Earthquake);
        assert_eq!(classify_kind("호우경보 발령"), EventKind::HeavyRain);
        assert_eq!(classify_kind("특별한 내용 없음"), EventKind::Etc);
    }

    #[test]
    fn level_follows_emergency_step() {
        assert_eq!(level_for_step(Some("위급재난문자")), Level::Critical);
        assert_eq!(level_for_step(Some("긴급재난문자")), Level::Severe);
        assert_eq!(level_for_step(Some("안전안내문자")), Level::Info);
        assert_eq!(level_for_step(None), Level::Info);
    }

    #[test]
    fn draft_normalizes_title_and_parses_time() {
        let noisy = item(1, "  산불  발생 \n 대피  바랍니다 ");
        let draft = draft_from(&noisy);
        assert_eq!(draft.title, "산불 발생 대피 바랍니다");
        assert_eq!(draft.kind, EventKind::ForestFire);
        let Some(occurred_at) = draft.occurred_at else {
            panic!("time should parse");
        };
        assert_eq!(occurred_at.to_rfc3339(), "2025-12-24T20:14:43+00:00");
    }
}
