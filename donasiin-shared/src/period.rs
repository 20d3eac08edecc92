use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::week::{local_date, start_of_day};

/// Recency bucket used by the ledger and the activity timeline. Evaluated
/// against the wall clock at request time, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    All,
    Today,
    #[serde(alias = "recent")]
    Week,
    Month,
}

impl Period {
    pub fn contains<Tz: TimeZone>(&self, at: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> bool {
        match self {
            Period::All => true,
            Period::Today => local_date(tz, at) == local_date(tz, now),
            Period::Week => at >= now - TimeDelta::days(7),
            Period::Month => at >= now - TimeDelta::days(30),
        }
    }

    /// Date-only records are treated as starting at local midnight.
    pub fn contains_date<Tz: TimeZone>(&self, date: NaiveDate, now: DateTime<Utc>, tz: &Tz) -> bool {
        self.contains(start_of_day(tz, date), now, tz)
    }
}
