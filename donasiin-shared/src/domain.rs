use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Target used when no weekly target has been configured for a week.
pub const DEFAULT_WEEKLY_TARGET: i64 = 1_000_000;

/// Smallest accepted pledge, in rupiah.
pub const DEFAULT_MIN_DONATION: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Success,
    Rejected,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Success => "success",
            DonationStatus::Rejected => "rejected",
        }
    }

    /// Only a pending donation may be verified, and only into a terminal state.
    pub fn can_transition_to(&self, next: DonationStatus) -> bool {
        matches!(
            (self, next),
            (DonationStatus::Pending, DonationStatus::Success)
                | (DonationStatus::Pending, DonationStatus::Rejected)
        )
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown donation status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DonationStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DonationStatus::Pending),
            "success" => Ok(DonationStatus::Success),
            "rejected" => Ok(DonationStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub donor_name: String,
    pub phone_number: String,
    pub amount: i64,
    pub status: DonationStatus,
    #[serde(default)]
    pub payment_proof_url: Option<String>,
    #[serde(default)]
    pub qris_data: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDonation {
    pub donor_name: String,
    pub phone_number: String,
    pub amount: i64,
    pub status: DonationStatus,
    pub payment_proof_url: Option<String>,
    pub qris_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub amount: i64,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: i64,
    pub description: String,
    pub location: String,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTarget {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub target_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(deserialize_with = "date_or_timestamp")]
    pub activity_date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub participant_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

fn null_as_empty<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

/// Accepts `YYYY-MM-DD` as well as a full timestamp, keeping only its date.
fn date_or_timestamp<'de, D>(d: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub location: String,
    pub activity_date: NaiveDate,
    pub image_urls: Vec<String>,
    pub participant_count: Option<i32>,
}

/// Sum of successful donations in a window and the number of distinct donors.
///
/// Donors are counted by name here; the ledger counts them by phone number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTotals {
    pub amount: i64,
    pub donor_count: usize,
}

impl WeeklyTotals {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        let mut amount = 0i64;
        let mut donors = HashSet::new();
        for (value, name) in rows {
            amount += value;
            donors.insert(name);
        }
        WeeklyTotals {
            amount,
            donor_count: donors.len(),
        }
    }
}

/// Percentage of `target` reached by `current`, clamped to `[0, 100]`.
pub fn progress_percentage(current: i64, target: i64) -> f64 {
    if current <= 0 {
        return 0.0;
    }
    if target <= 0 {
        return 100.0;
    }
    (current as f64 / target as f64 * 100.0).min(100.0)
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}
