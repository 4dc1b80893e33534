//! KMA weather-warning CSV API.
//!
//! The API serves one row per (region, warning type, level, command)
//! announcement. Rows repeat across polls while a warning stays active,
//! so the checkpoint carries a seen-set keyed by the full announcement
//! tuple, pruned with a 6-hour TTL.
//!
//! Requires `KMA_API_KEY`; without it the adapter stays registered but
//! every run returns empty (warned once).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::domain::{EventKind, Level, NewEvent, SourceId};
use crate::ingest::adapter::{AdapterRun, SourceAdapter};
use crate::ingest::seen::SeenSet;
use crate::ingest::time::parse_kst;

const API_URL: &str = "https://apihub.kma.go.kr/api/typ01/url/wrn_now_data.php?fe=f&disp=0";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL_SECS: u64 = 300;

/// Announcements older than this drop out of the seen-set.
const SEEN_TTL: Duration = Duration::from_secs(6 * 3600);

/// Minimum columns per data row: TM_FC, TM_EF, REG_ID, REG_NAME, WRN, LVL, CMD.
const MIN_COLUMNS: usize = 7;

/// One parsed announcement row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WarningRow {
    /// Announcement time, `YYYYMMDDHHMM` KST.
    pub announced_at: String,
    /// Effective time, `YYYYMMDDHHMM` KST.
    pub effective_at: String,
    /// Region code.
    pub region_id: String,
    /// Region display name.
    pub region_name: String,
    /// Warning type code (single letter).
    pub warning: String,
    /// Level code: 1 = advisory, 2 = warning.
    pub level_code: String,
    /// Command code: 1 = issued, 2 = lifted, 3 = modified.
    pub command: String,
}

impl WarningRow {
    /// Dedup key: the full announcement tuple.
    #[must_use]
    pub fn seen_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.region_id, self.warning, self.level_code, self.command, self.effective_at
        )
    }
}

/// Adapter for the weather-warning API.
pub struct WeatherAlertAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    missing_key_warned: AtomicBool,
}

impl WeatherAlertAdapter {
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            missing_key_warned: AtomicBool::new(false),
        }
    }

    async fn fetch(&self, api_key: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(format!("{API_URL}&authKey={api_key}"))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl SourceAdapter for WeatherAlertAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::WeatherAlert
    }

    fn poll_interval_secs(&self) -> u64 {
        POLL_INTERVAL_SECS
    }

    async fn run(&self, prior_state: Option<&str>) -> AdapterRun {
        let Some(api_key) = self.api_key.as_deref() else {
            if !self.missing_key_warned.swap(true, Ordering::Relaxed) {
                tracing::warn!("KMA_API_KEY not set, weather warnings disabled");
            }
            return AdapterRun::unchanged(prior_state);
        };

        let body = match self.fetch(api_key).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "weather warning fetch failed");
                return AdapterRun::unchanged(prior_state);
            }
        };
        process_csv(&body, prior_state, Utc::now())
    }
}

/// Parses the CSV body and emits unseen announcements.
pub(crate) fn process_csv(
    body: &str,
    prior_state: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> AdapterRun {
    let mut seen = SeenSet::from_state(prior_state);
    seen.prune(SEEN_TTL, now);

    let mut events = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(row) = parse_row(line) else {
            tracing::warn!(line, "malformed warning row skipped");
            continue;
        };
        if seen.contains(&row.seen_key()) {
            continue;
        }
        seen.insert(row.seen_key(), now);
        events.push(draft_from(&row));
    }

    AdapterRun {
        events,
        next_state: seen.to_state(),
    }
}

/// Splits one data row, trimming cells and dropping the trailing `=`
/// cells the API occasionally appends.
pub(crate) fn parse_row(line: &str) -> Option<WarningRow> {
    let mut cells: Vec<&str> = line.split(',').map(str::trim).collect();
    while cells.last().is_some_and(|cell| *cell == "=" || cell.is_empty()) {
        cells.pop();
    }
    if cells.len() < MIN_COLUMNS {
        return None;
    }

    Some(WarningRow {
        announced_at: cells[0].to_string(),
        effective_at: cells[1].to_string(),
        region_id: cells[2].to_string(),
        region_name: cells[3].to_string(),
        warning: cells[4].to_string(),
        level_code: cells[5].to_string(),
        command: cells[6].to_string(),
    })
}

fn draft_from(row: &WarningRow) -> NewEvent {
    let kind = kind_for_warning(&row.warning);
    let lifted = row.command == "2";
    let level = if lifted {
        Level::Info
    } else {
        level_for_code(&row.level_code)
    };

    let title = format!(
        "{} {}{} {}",
        row.region_name,
        warning_label(&row.warning),
        level_label(&row.level_code),
        command_label(&row.command),
    );

    NewEvent {
        kind,
        title,
        body: None,
        occurred_at: parse_kst(&row.effective_at, "%Y%m%d%H%M"),
        region_text: Some(row.region_name.clone()),
        level,
        payload: Some(json!({
            "regionId": row.region_id.clone(),
            "warning": row.warning.clone(),
            "levelCode": row.level_code.clone(),
            "command": row.command.clone(),
            "announcedAt": row.announced_at.clone(),
        })),
    }
}

/// Warning type code → event kind. Unknown codes land on `Etc`.
fn kind_for_warning(code: &str) -> EventKind {
    match code {
        "W" => EventKind::StrongWind,
        "R" => EventKind::HeavyRain,
        "C" => EventKind::ColdWave,
        "D" => EventKind::DryWeather,
        "O" => EventKind::StormSurge,
        "V" => EventKind::HighSeas,
        "T" => EventKind::Typhoon,
        "S" => EventKind::HeavySnow,
        "Y" => EventKind::YellowDust,
        "H" => EventKind::HeatWave,
        _ => EventKind::Etc,
    }
}

fn warning_label(code: &str) -> &'static str {
    match code {
        "W" => "강풍",
        "R" => "호우",
        "C" => "한파",
        "D" => "건조",
        "O" => "폭풍해일",
        "V" => "풍랑",
        "T" => "태풍",
        "S" => "대설",
        "Y" => "황사",
        "H" => "폭염",
        _ => "기상",
    }
}

/// Advisory (주의보) ⇒ Moderate, warning (경보) ⇒ Severe.
fn level_for_code(code: &str) -> Level {
    match code {
        "2" => Level::Severe,
        _ => Level::Moderate,
    }
}

fn level_label(code: &str) -> &'static str {
    match code {
        "2" => "경보",
        _ => "주의보",
    }
}

fn command_label(code: &str) -> &'static str {
    match code {
        "1" => "발표",
        "2" => "해제",
        "3" => "변경",
        _ => "통보",
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const BODY: &str = "\
# WRN NOW DATA
# TM_FC, TM_EF, REG_ID, REG_NAME, WRN, LVL, CMD
202512250500, 202512250600, L1010000, 서울, W, 1, 1, =
202512250500, 202512250600, L1090000, 강원북부산지, S, 2, 1, =
";

    #[test]
    fn parses_rows_and_trims_trailing_equals() {
        let Some(row) = parse_row("202512250500, 202512250600, L1010000, 서울, W, 1, 1, =") else {
            panic!("row should parse");
        };
        assert_eq!(row.region_name, "서울");
        assert_eq!(row.warning, "W");
        assert_eq!(row.command, "1");
    }

    #[test]
    fn short_rows_are_rejected() {
        assert!(parse_row("202512250500, 202512250600, L1010000").is_none());
        // Trailing `=` cells do not count toward the column minimum.
        assert!(parse_row("a, b, c, d, e, =, =").is_none());
    }

    #[test]
    fn first_run_emits_all_rows() {
        let run = process_csv(BODY, None, Utc::now());
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.events[0].title, "서울 강풍주의보 발표");
        assert_eq!(run.events[0].kind, EventKind::StrongWind);
        assert_eq!(run.events[0].level, Level::Moderate);
        assert_eq!(run.events[1].title, "강원북부산지 대설경보 발표");
        assert_eq!(run.events[1].level, Level::Severe);
    }

    #[test]
    fn repeated_rows_are_suppressed_by_seen_set() {
        let now = Utc::now();
        let first = process_csv(BODY, None, now);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let second = process_csv(BODY, Some(&state), now);
        assert!(second.events.is_empty());
    }

    #[test]
    fn lifted_warning_is_informational() {
        let body = "202512250500, 202512250600, L1010000, 서울, W, 1, 2, =";
        let run = process_csv(body, None, Utc::now());
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].title, "서울 강풍주의보 해제");
        assert_eq!(run.events[0].level, Level::Info);
    }

    #[test]
    fn lift_after_issue_is_a_new_announcement() {
        let now = Utc::now();
        let issued = "202512250500, 202512250600, L1010000, 서울, W, 1, 1, =";
        let first = process_csv(issued, None, now);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        let lifted = "202512250500, 202512250600, L1010000, 서울, W, 1, 2, =";
        let second = process_csv(lifted, Some(&state), now);
        assert_eq!(second.events.len(), 1);
    }

    #[test]
    fn seen_entries_expire_after_ttl() {
        let now = Utc::now();
        let first = process_csv(BODY, None, now);
        let Some(state) = first.next_state else {
            panic!("state should be set");
        };
        // Past the TTL the same rows emit again.
        let later = now + chrono::Duration::seconds(6 * 3600 + 1);
        let second = process_csv(BODY, Some(&state), later);
        assert_eq!(second.events.len(), 2);
    }

    #[test]
    fn comment_and_blank_lines_are_ignored() {
        let run = process_csv("# only comments\n\n", None, Utc::now());
        assert!(run.events.is_empty());
    }

    #[test]
    fn effective_time_parses_to_utc() {
        let run = process_csv(BODY, None, Utc::now());
        let Some(occurred_at) = run.events[0].occurred_at else {
            panic!("time should parse");
        };
        assert_eq!(occurred_at.to_rfc3339(), "2025-12-24T21:00:00+00:00");
    }
}
