//! KMA earthquake early-warning binary stream.
//!
//! The server publishes one small binary frame per second, addressed by a
//! KST timestamp in the URL. A frame is `header ‖ body ‖ trailer`; the
//! trailer is 60 bytes of percent-encoded location text followed by 15
//! bit-packed bytes with the quake parameters. Header bits select the
//! phase: 1 = no event, 2 = fast info, 3 = detail. Only phase ≥ 2 emits.
//!
//! Because the poll addresses server time, the adapter keeps a clock
//! offset estimate derived from each response's `ST` (epoch seconds) or
//! `Date` header, clamped non-negative and re-derived on every fetch. The
//! offset is deliberately in-memory only: it is a latency optimization,
//! not correctness state, and is rebuilt within one poll after a restart.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::PewsSimConfig;
use crate::domain::{EventKind, Level, NewEvent, SourceId};
use crate::ingest::adapter::{AdapterRun, SourceAdapter};
use crate::ingest::text::{collapse_whitespace, percent_decode_lossy};
use crate::ingest::time::{from_epoch_secs, parse_kst_compact, to_kst_compact};

const BASE_URL: &str = "https://www.weather.go.kr/pews/data";
const SIM_BASE_URL: &str = "https://www.weather.go.kr/pews/simdata";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL_SECS: u64 = 1;

/// Header length of a live frame.
const HEADER_LEN: usize = 4;
/// Header length of a simulation frame.
const SIM_HEADER_LEN: usize = 1;
/// Trailer: location text bytes + bit-packed quake parameters.
const TEXT_LEN: usize = 60;
const BIN_LEN: usize = 15;

/// The published eqk-id is this base plus the 26-bit frame field.
const EQK_ID_BASE: u64 = 2_000_000_000;

/// How long a simulation replay runs, in seconds.
const SIM_WINDOW_SECS: i64 = 5 * 60;

/// Poll one second behind the estimated server clock so the addressed
/// frame already exists.
const POLL_LAG_MS: i64 = 1000;

/// Affected-region names, one per mask bit, mask MSB first.
const REGIONS: [&str; 17] = [
    "서울", "부산", "대구", "인천", "광주", "대전", "울산", "세종", "경기", "강원", "충북",
    "충남", "전북", "전남", "경북", "경남", "제주",
];

/// Adapter for the early-warning stream.
pub struct PewsAdapter {
    client: reqwest::Client,
    sim: Option<PewsSimConfig>,
    /// Estimated `local - server` clock offset, milliseconds, ≥ 0.
    offset_ms: AtomicI64,
    /// Wall-clock anchor of the simulation replay, set on its first run.
    sim_started_at: Mutex<Option<DateTime<Utc>>>,
}

impl PewsAdapter {
    #[must_use]
    pub fn new(sim: Option<PewsSimConfig>) -> Self {
        if let Some(sim) = &sim {
            tracing::warn!(eqk_id = %sim.eqk_id, start_at = %sim.start_at, "pews simulation mode active");
        }
        Self {
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            sim,
            offset_ms: AtomicI64::new(0),
            sim_started_at: Mutex::new(None),
        }
    }

    /// The frame URL and header length for this poll, or `None` when the
    /// simulation window is over.
    fn poll_target(&self, now: DateTime<Utc>) -> Option<(String, usize)> {
        if let Some(sim) = &self.sim {
            let Some(sim_start) = parse_kst_compact(&sim.start_at) else {
                tracing::warn!(start_at = %sim.start_at, "unparseable simulation start, skipping poll");
                return None;
            };
            let anchor = {
                let mut guard = self.sim_started_at.lock().ok()?;
                *guard.get_or_insert(now)
            };
            let elapsed = now - anchor;
            if elapsed > chrono::Duration::seconds(SIM_WINDOW_SECS) {
                return None;
            }
            let virtual_now = sim_start + elapsed;
            let ts = to_kst_compact(virtual_now);
            return Some((format!("{SIM_BASE_URL}/{}/{ts}.b", sim.eqk_id), SIM_HEADER_LEN));
        }

        let offset = self.offset_ms.load(Ordering::Relaxed);
        let target = now - chrono::Duration::milliseconds(offset + POLL_LAG_MS);
        Some((format!("{BASE_URL}/{}.b", to_kst_compact(target)), HEADER_LEN))
    }

    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, Option<i64>), reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let server_ms = server_time_ms(
            response
                .headers()
                .get("ST")
                .and_then(|value| value.to_str().ok()),
            response
                .headers()
                .get(reqwest::header::DATE)
                .and_then(|value| value.to_str().ok()),
        );
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), server_ms))
    }
}

#[async_trait]
impl SourceAdapter for PewsAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Pews
    }

    fn poll_interval_secs(&self) -> u64 {
        POLL_INTERVAL_SECS
    }

    async fn run(&self, prior_state: Option<&str>) -> AdapterRun {
        let now = Utc::now();
        let Some((url, header_len)) = self.poll_target(now) else {
            return AdapterRun::unchanged(prior_state);
        };

        let (bytes, server_ms) = match self.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(error = %e, "pews fetch failed");
                return AdapterRun::unchanged(prior_state);
            }
        };

        if self.sim.is_none() {
            if let Some(server_ms) = server_ms {
                let offset = clock_offset_ms(now.timestamp_millis(), server_ms);
                self.offset_ms.store(offset, Ordering::Relaxed);
            }
        }

        let Some(frame) = parse_frame(&bytes, header_len) else {
            tracing::warn!(len = bytes.len(), "undersized pews frame dropped");
            return AdapterRun::unchanged(prior_state);
        };

        process_frame(&frame, prior_state)
    }
}

// ── Frame decoding ──────────────────────────────────────────────────────

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    /// Phase 1: nothing happening.
    Quiet,
    /// Phase 2 or 3.
    Alert(QuakeFrame),
}

/// Quake parameters unpacked from the binary trailer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuakeFrame {
    pub phase: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
    pub depth_km: f64,
    pub occurred_at: Option<DateTime<Utc>>,
    pub eqk_id: u64,
    pub intensity: u8,
    pub regions: Vec<&'static str>,
    pub location: String,
}

/// Splits and decodes a raw frame. `None` when the body is too short to
/// carry a trailer.
pub(crate) fn parse_frame(bytes: &[u8], header_len: usize) -> Option<Frame> {
    if bytes.len() < header_len + TEXT_LEN + BIN_LEN {
        return None;
    }

    let header = bytes.first()?;
    let phase = phase_from_header(*header);
    if phase < 2 {
        return Some(Frame::Quiet);
    }

    let text_start = bytes.len() - TEXT_LEN - BIN_LEN;
    let bin_start = bytes.len() - BIN_LEN;
    let text = &bytes[text_start..bin_start];
    let bin = &bytes[bin_start..];

    let location = collapse_whitespace(&percent_decode_lossy(
        String::from_utf8_lossy(text).trim_end_matches(['\0', ' ']),
    ));

    let lat_raw = read_bits(bin, 0, 10);
    let lon_raw = read_bits(bin, 10, 10);
    let mag_raw = read_bits(bin, 20, 7);
    let depth_raw = read_bits(bin, 27, 10);
    let epoch_secs = read_bits(bin, 37, 32);
    let eqk_raw = read_bits(bin, 69, 26);
    let intensity = read_bits(bin, 95, 4) as u8;
    let mask = read_bits(bin, 99, 17);

    let regions = REGIONS
        .iter()
        .enumerate()
        .filter(|(index, _)| mask & (1 << (16 - index)) != 0)
        .map(|(_, name)| *name)
        .collect();

    Some(Frame::Alert(QuakeFrame {
        phase,
        latitude: 30.0 + lat_raw as f64 / 100.0,
        longitude: 124.0 + lon_raw as f64 / 100.0,
        magnitude: mag_raw as f64 / 10.0,
        depth_km: depth_raw as f64 / 10.0,
        occurred_at: from_epoch_secs(epoch_secs as i64),
        eqk_id: EQK_ID_BASE + eqk_raw,
        intensity,
        regions,
        location,
    }))
}

/// Phase selection from header byte 0, bits MSB-first. Bit 0 is reserved
/// and ignored; bit 2 set means phase 3 regardless of bit 1.
pub(crate) fn phase_from_header(header: u8) -> u8 {
    let bit1 = (header >> 6) & 1;
    let bit2 = (header >> 5) & 1;
    if bit2 == 1 {
        3
    } else if bit1 == 1 {
        2
    } else {
        1
    }
}

/// Reads `len` bits starting at bit `start`, MSB-first across bytes.
pub(crate) fn read_bits(bytes: &[u8], start: usize, len: usize) -> u64 {
    debug_assert!(start + len <= bytes.len() * 8);
    let mut value = 0u64;
    for offset in start..start + len {
        let bit = (bytes[offset / 8] >> (7 - offset % 8)) & 1;
        value = (value << 1) | u64::from(bit);
    }
    value
}

// ── Dedup and event construction ────────────────────────────────────────

/// Checkpoint state: the last emitted incident and phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PewsState {
    #[serde(rename = "lastEqkId")]
    last_eqk_id: u64,
    #[serde(rename = "lastPhase")]
    last_phase: u8,
}

/// Emits for a decoded frame, suppressing the `(eqk id, phase)` pair the
/// checkpoint already recorded. A later phase of the same incident is
/// emitted downgraded to Info, so clients are not re-alerted.
pub(crate) fn process_frame(frame: &Frame, prior_state: Option<&str>) -> AdapterRun {
    let Frame::Alert(quake) = frame else {
        return AdapterRun::unchanged(prior_state);
    };

    let state: PewsState = prior_state
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    if quake.eqk_id == state.last_eqk_id && quake.phase == state.last_phase {
        return AdapterRun::unchanged(prior_state);
    }

    let repeat_incident = quake.eqk_id == state.last_eqk_id;
    let level = if repeat_incident {
        Level::Info
    } else {
        level_for_intensity(quake.intensity)
    };

    let label = if quake.phase == 2 { "지진속보" } else { "지진정보" };
    let title = format!("[{label}] 규모 {:.1} {}", quake.magnitude, quake.location);
    let body = (!quake.regions.is_empty())
        .then(|| format!("예상 최대진도 {}, 영향 지역: {}", quake.intensity, quake.regions.join(", ")));

    let next_state = PewsState {
        last_eqk_id: quake.eqk_id,
        last_phase: quake.phase,
    };

    AdapterRun {
        events: vec![NewEvent {
            kind: EventKind::Earthquake,
            title,
            body,
            occurred_at: quake.occurred_at,
            region_text: Some(quake.location.clone()),
            level,
            payload: Some(json!({
                "eqkId": quake.eqk_id,
                "phase": quake.phase,
                "latitude": quake.latitude,
                "longitude": quake.longitude,
                "magnitude": quake.magnitude,
                "depthKm": quake.depth_km,
                "intensity": quake.intensity,
                "regions": quake.regions.clone(),
            })),
        }],
        next_state: serde_json::to_string(&next_state).ok(),
    }
}

/// Instrumental-intensity mapping for a fresh incident.
fn level_for_intensity(intensity: u8) -> Level {
    match intensity {
        8.. => Level::Critical,
        6..=7 => Level::Severe,
        4..=5 => Level::Moderate,
        _ => Level::Minor,
    }
}

/// `local - server`, clamped non-negative: the estimate only ever delays
/// the polled timestamp, never runs ahead of the server.
pub(crate) fn clock_offset_ms(local_ms: i64, server_ms: i64) -> i64 {
    (local_ms - server_ms).max(0)
}

/// Server wall clock from response headers: fractional epoch seconds in
/// `ST` when present, otherwise the standard `Date` header.
pub(crate) fn server_time_ms(st: Option<&str>, date: Option<&str>) -> Option<i64> {
    if let Some(st) = st {
        if let Ok(secs) = st.trim().parse::<f64>() {
            return Some((secs * 1000.0) as i64);
        }
    }
    let date = date?;
    DateTime::parse_from_rfc2822(date)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}
