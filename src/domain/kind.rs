//! Event category tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a normalized event.
///
/// Stored as a `SMALLINT`; values 1–3 cover the earthquake family, 4–13 the
/// weather-warning family (one per KMA warning type), and the remainder the
/// civil-safety categories announced over the disaster text-message feed.
/// Numeric values are part of the storage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Earthquake = 1,
    QuakeNotice = 2,
    Tsunami = 3,
    StrongWind = 4,
    HeavyRain = 5,
    ColdWave = 6,
    DryWeather = 7,
    StormSurge = 8,
    HighSeas = 9,
    Typhoon = 10,
    HeavySnow = 11,
    YellowDust = 12,
    HeatWave = 13,
    Flood = 14,
    Landslide = 15,
    Fire = 16,
    ForestFire = 17,
    Collapse = 18,
    Explosion = 19,
    TrafficControl = 20,
    PowerOutage = 21,
    GasLeak = 22,
    ChemicalSpill = 23,
    Epidemic = 24,
    LivestockDisease = 25,
    WaterOutage = 26,
    MissingPerson = 27,
    AirQuality = 28,
    CivilDefense = 29,
    Terror = 30,
    AirRaid = 31,
    DamDischarge = 32,
    MarineAccident = 33,
    Drought = 34,
    Volcano = 35,
    Etc = 36,
}

impl EventKind {
    /// Returns the storage tag.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TryFrom<i16> for EventKind {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        use EventKind::{
            AirQuality, AirRaid, ChemicalSpill, CivilDefense, ColdWave, Collapse, DamDischarge,
            Drought, DryWeather, Earthquake, Epidemic, Etc, Explosion, Fire, Flood, ForestFire,
            GasLeak, HeatWave, HeavyRain, HeavySnow, HighSeas, Landslide, LivestockDisease,
            MarineAccident, MissingPerson, PowerOutage, QuakeNotice, StormSurge, StrongWind,
            Terror, TrafficControl, Tsunami, Typhoon, Volcano, WaterOutage, YellowDust,
        };

        const ALL: [EventKind; 36] = [
            Earthquake,
            QuakeNotice,
            Tsunami,
            StrongWind,
            HeavyRain,
            ColdWave,
            DryWeather,
            StormSurge,
            HighSeas,
            Typhoon,
            HeavySnow,
            YellowDust,
            HeatWave,
            Flood,
            Landslide,
            Fire,
            ForestFire,
            Collapse,
            Explosion,
            TrafficControl,
            PowerOutage,
            GasLeak,
            ChemicalSpill,
            Epidemic,
            LivestockDisease,
            WaterOutage,
            MissingPerson,
            AirQuality,
            CivilDefense,
            Terror,
            AirRaid,
            DamDischarge,
            MarineAccident,
            Drought,
            Volcano,
            Etc,
        ];

        ALL.into_iter()
            .find(|kind| kind.as_i16() == value)
            .ok_or(value)
    }
}
