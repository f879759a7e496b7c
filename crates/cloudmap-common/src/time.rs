//! Time handling for satellite image cadences.

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// How often a satellite source publishes a new image.
///
/// Images are published on whole-hour boundaries that are a multiple of
/// the cadence (e.g. 00, 03, 06 ... for a 3-hour cadence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Cadence {
    hours: u32,
}

impl Cadence {
    /// Hourly images.
    pub const HOURLY: Cadence = Cadence { hours: 1 };
    /// Images every three hours.
    pub const THREE_HOURLY: Cadence = Cadence { hours: 3 };

    /// Create a cadence of `hours` hours. Returns None for 0 or for values
    /// that do not divide a day evenly.
    pub fn from_hours(hours: u32) -> Option<Self> {
        if hours == 0 || 24 % hours != 0 {
            return None;
        }
        Some(Self { hours })
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn as_duration(&self) -> Duration {
        Duration::hours(self.hours as i64)
    }

    /// Truncate `dt` to the most recent publication boundary.
    pub fn truncate(&self, dt: DateTime<Utc>) -> DateTime<Utc> {
        let hour = (dt.hour() / self.hours) * self.hours;
        let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        dt.date_naive().and_time(time).and_utc()
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::THREE_HOURLY
    }
}

impl TryFrom<u32> for Cadence {
    type Error = String;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        Cadence::from_hours(hours)
            .ok_or_else(|| format!("cadence of {} hours does not divide a day", hours))
    }
}

impl From<Cadence> for u32 {
    fn from(cadence: Cadence) -> Self {
        cadence.hours
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.hours)
    }
}
