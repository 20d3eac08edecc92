use super::StorageError;
use super::schema::{donations, expenses, sessions, timeline_activities, weekly_targets};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use donasiin_shared::domain::{Activity, Donation, Expense, WeeklyTarget};

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = donations)]
pub struct DonationRow {
    pub id: String,
    pub donor_name: String,
    pub phone_number: String,
    pub amount: i64,
    pub status: String,
    pub payment_proof_url: Option<String>,
    pub qris_data: Option<String>,
    pub created_at: NaiveDateTime,
    pub verified_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = donations)]
pub struct NewDonationRow<'a> {
    pub id: &'a str,
    pub donor_name: &'a str,
    pub phone_number: &'a str,
    pub amount: i64,
    pub status: &'a str,
    pub payment_proof_url: Option<&'a str>,
    pub qris_data: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DonationRow> for Donation {
    type Error = StorageError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StorageError::Corrupt(format!("donation {}: {e}", row.id)))?;
        Ok(Donation {
            id: row.id,
            donor_name: row.donor_name,
            phone_number: row.phone_number,
            amount: row.amount,
            status,
            payment_proof_url: row.payment_proof_url,
            qris_data: row.qris_data,
            created_at: row.created_at.and_utc(),
            verified_at: row.verified_at.map(|t| t.and_utc()),
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = expenses)]
pub struct ExpenseRow {
    pub id: String,
    pub amount: i64,
    pub description: String,
    pub location: String,
    pub receipt_url: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = expenses)]
pub struct NewExpenseRow<'a> {
    pub id: &'a str,
    pub amount: i64,
    pub description: &'a str,
    pub location: &'a str,
    pub receipt_url: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            amount: row.amount,
            description: row.description,
            location: row.location,
            receipt_url: row.receipt_url,
            created_at: row.created_at.and_utc(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = weekly_targets)]
pub struct WeeklyTargetRow {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub target_amount: i64,
}

impl From<WeeklyTargetRow> for WeeklyTarget {
    fn from(row: WeeklyTargetRow) -> Self {
        WeeklyTarget {
            week_start: row.week_start,
            week_end: row.week_end,
            target_amount: row.target_amount,
        }
    }
}

impl From<&WeeklyTarget> for WeeklyTargetRow {
    fn from(t: &WeeklyTarget) -> Self {
        WeeklyTargetRow {
            week_start: t.week_start,
            week_end: t.week_end,
            target_amount: t.target_amount,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = timeline_activities)]
pub struct ActivityRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub activity_date: NaiveDate,
    pub image_urls: String, // JSON array
    pub participant_count: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = timeline_activities)]
pub struct NewActivityRow<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub activity_date: NaiveDate,
    pub image_urls: String,
    pub participant_count: Option<i32>,
    pub created_at: NaiveDateTime,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = StorageError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let image_urls: Vec<String> = serde_json::from_str(&row.image_urls)
            .map_err(|e| StorageError::Corrupt(format!("activity {}: {e}", row.id)))?;
        Ok(Activity {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            activity_date: row.activity_date,
            image_urls,
            participant_count: row.participant_count,
            created_at: row.created_at.and_utc(),
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = sessions)]
#[diesel(primary_key(jti))]
pub struct Session {
    pub jti: String,
    pub email: String,
    pub issued_at: NaiveDateTime,
    pub last_used_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub email: &'a str,
}
