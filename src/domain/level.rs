//! Five-step severity scale.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of an event, 1 (lowest) to 5 (highest).
///
/// Each adapter maps its source-specific labels onto this scale; the
/// mapping tables live next to the adapters. Stored as a `SMALLINT`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info = 1,
    Minor = 2,
    Moderate = 3,
    Severe = 4,
    Critical = 5,
}

impl Level {
    /// Returns the storage tag.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TryFrom<i16> for Level {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Info),
            2 => Ok(Self::Minor),
            3 => Ok(Self::Moderate),
            4 => Ok(Self::Severe),
            5 => Ok(Self::Critical),
            other => Err(other),
        }
    }
}
