//! Source tags identifying which adapter produced an event.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enum tag for the upstream source of an event.
///
/// Stored as a `SMALLINT` in the `events` and `ingest_checkpoints` tables;
/// the numeric values are part of the wire and storage contract and must
/// never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// National disaster text-message feed.
    Sms = 1,
    /// KMA domestic earthquake notice dashboard.
    QuakeNotice = 2,
    /// KMA earthquake early-warning binary stream.
    Pews = 3,
    /// KMA weather-warning CSV API.
    WeatherAlert = 4,
    /// National forest-fire status API.
    ForestFire = 5,
}

impl SourceId {
    /// All known sources, in tag order.
    pub const ALL: [Self; 5] = [
        Self::Sms,
        Self::QuakeNotice,
        Self::Pews,
        Self::WeatherAlert,
        Self::ForestFire,
    ];

    /// Returns the storage tag.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }

    /// Stable lowercase name used in job ids and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::QuakeNotice => "quake_notice",
            Self::Pews => "pews",
            Self::WeatherAlert => "weather_alert",
            Self::ForestFire => "forest_fire",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i16> for SourceId {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Sms),
            2 => Ok(Self::QuakeNotice),
            3 => Ok(Self::Pews),
            4 => Ok(Self::WeatherAlert),
            5 => Ok(Self::ForestFire),
            other => Err(other),
        }
    }
}
