//! Public transparency ledger: verified income, expenses and their balance.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use donasiin_shared::api::{LedgerQuery, LedgerSummaryDto, StatusFilter};
use donasiin_shared::domain::{Donation, DonationStatus, Expense, NewExpense};
use donasiin_shared::period::Period;
use tracing::info;

use super::ServiceError;
use super::images::{ImageUpload, store_image};
use crate::backend::{Backend, Bucket, DonationQuery};

pub fn summarize(donations: &[Donation], expenses: &[Expense]) -> LedgerSummaryDto {
    let verified: Vec<&Donation> = donations
        .iter()
        .filter(|d| d.status == DonationStatus::Success)
        .collect();
    let total_income: i64 = verified.iter().map(|d| d.amount).sum();
    let total_expense: i64 = expenses.iter().map(|e| e.amount).sum();
    let donors: HashSet<&str> = verified.iter().map(|d| d.phone_number.as_str()).collect();
    LedgerSummaryDto {
        total_income,
        total_expense,
        balance: total_income - total_expense,
        total_donors: donors.len(),
    }
}

/// Parsed ledger filters, evaluated against one wall-clock reading.
#[derive(Debug, Clone)]
pub struct LedgerFilter {
    needle: Option<String>,
    status: StatusFilter,
    period: Period,
    now: DateTime<Utc>,
    tz: Tz,
}

impl LedgerFilter {
    pub fn new(query: &LedgerQuery, now: DateTime<Utc>, tz: Tz) -> Self {
        LedgerFilter {
            needle: query
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            status: query.status.unwrap_or_default(),
            period: query.period.unwrap_or_default(),
            now,
            tz,
        }
    }

    fn needle_matches(&self, haystacks: &[&str], raw: Option<&str>) -> bool {
        let Some(needle) = &self.needle else {
            return true;
        };
        let lower = needle.to_lowercase();
        haystacks.iter().any(|h| h.to_lowercase().contains(&lower))
            || raw.is_some_and(|r| r.contains(needle.as_str()))
    }

    /// Name matches case-insensitively, phone by raw substring.
    pub fn matches_donation(&self, d: &Donation) -> bool {
        self.needle_matches(&[&d.donor_name], Some(&d.phone_number))
            && self.status.matches(d.status)
            && self.period.contains(d.created_at, self.now, &self.tz)
    }

    pub fn matches_expense(&self, e: &Expense) -> bool {
        self.needle_matches(&[&e.description, &e.location], None)
            && self.period.contains(e.created_at, self.now, &self.tz)
    }
}

pub async fn verified_donations(backend: &Backend) -> Result<Vec<Donation>, ServiceError> {
    Ok(backend
        .records
        .list_donations(&DonationQuery::with_status(DonationStatus::Success), None)
        .await?)
}

pub async fn summary(backend: &Backend) -> Result<LedgerSummaryDto, ServiceError> {
    let (donations, expenses) = futures::try_join!(
        verified_donations(backend),
        async { Ok::<_, ServiceError>(backend.records.list_expenses().await?) }
    )?;
    Ok(summarize(&donations, &expenses))
}

pub async fn donations(
    backend: &Backend,
    filter: &LedgerFilter,
) -> Result<Vec<Donation>, ServiceError> {
    let mut rows = verified_donations(backend).await?;
    rows.retain(|d| filter.matches_donation(d));
    Ok(rows)
}

pub async fn expenses(
    backend: &Backend,
    filter: &LedgerFilter,
) -> Result<Vec<Expense>, ServiceError> {
    let mut rows = backend.records.list_expenses().await?;
    rows.retain(|e| filter.matches_expense(e));
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct ExpenseInput {
    pub amount: i64,
    pub description: String,
    pub location: String,
}

/// Records an expense, storing the optional receipt image first.
pub async fn record_expense(
    backend: &Backend,
    input: ExpenseInput,
    receipt: Option<ImageUpload>,
    max_image_bytes: usize,
    bearer: &str,
) -> Result<Expense, ServiceError> {
    let description = input.description.trim();
    if input.amount <= 0 {
        return Err(ServiceError::invalid("expense amount must be positive"));
    }
    if description.is_empty() {
        return Err(ServiceError::invalid("expense description is required"));
    }
    if let Some(r) = &receipt {
        r.validate(max_image_bytes)?;
    }
    let receipt_url = match receipt {
        Some(r) => {
            Some(store_image(backend, Bucket::Receipts, r, max_image_bytes, Some(bearer)).await?)
        }
        None => None,
    };
    let new = NewExpense {
        amount: input.amount,
        description: description.to_string(),
        location: input.location.trim().to_string(),
        receipt_url,
    };
    let expense = backend.records.insert_expense(&new, bearer).await?;
    info!(expense_id = %expense.id, amount = expense.amount, "expense recorded");
    Ok(expense)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn donation(name: &str, phone: &str, amount: i64, status: DonationStatus, created: &str) -> Donation {
        Donation {
            id: format!("{name}-{amount}"),
            donor_name: name.into(),
            phone_number: phone.into(),
            amount,
            status,
            payment_proof_url: None,
            qris_data: None,
            created_at: at(created),
            verified_at: None,
        }
    }

    fn expense(desc: &str, location: &str, amount: i64, created: &str) -> Expense {
        Expense {
            id: desc.into(),
            amount,
            description: desc.into(),
            location: location.into(),
            receipt_url: None,
            created_at: at(created),
        }
    }

    #[test]
    fn summary_ignores_unverified_and_balances_exactly() {
        use DonationStatus::*;
        let donations = [
            donation("Budi", "0811", 100_000, Success, "2026-10-16T01:00:00Z"),
            donation("Budi", "0811", 50_000, Success, "2026-10-15T01:00:00Z"),
            donation("Siti", "0812", 25_000, Success, "2026-10-14T01:00:00Z"),
            donation("Ani", "0813", 900_000, Pending, "2026-10-14T01:00:00Z"),
            donation("Tono", "0814", 400_000, Rejected, "2026-10-14T01:00:00Z"),
        ];
        let expenses = [
            expense("Nasi kotak", "Masjid", 120_000, "2026-10-16T05:00:00Z"),
            expense("Air mineral", "Masjid", 80_000, "2026-10-16T05:00:00Z"),
        ];
        let s = summarize(&donations, &expenses);
        assert_eq!(s.total_income, 175_000);
        assert_eq!(s.total_expense, 200_000);
        assert_eq!(s.balance, -25_000);
        assert_eq!(s.total_donors, 2);
    }

    #[test]
    fn text_filter_matches_name_case_insensitively_and_phone_raw() {
        let now = at("2026-10-16T10:00:00Z");
        let d = donation("Budi Santoso", "081234567", 10_000, DonationStatus::Success, "2026-10-16T01:00:00Z");
        let by = |q: &str| {
            let query = LedgerQuery {
                q: Some(q.into()),
                ..Default::default()
            };
            LedgerFilter::new(&query, now, chrono_tz::Asia::Jakarta).matches_donation(&d)
        };
        assert!(by("budi"));
        assert!(by("SANTOSO"));
        assert!(by("1234"));
        assert!(!by("siti"));
        assert!(by("   "));
    }

    #[test]
    fn status_and_period_narrow_donations() {
        let now = at("2026-10-16T10:00:00Z");
        let old = donation("Budi", "0811", 1_000, DonationStatus::Success, "2026-09-01T00:00:00Z");
        let recent = donation("Budi", "0811", 1_000, DonationStatus::Success, "2026-10-12T00:00:00Z");
        let query = LedgerQuery {
            period: Some(Period::Week),
            ..Default::default()
        };
        let f = LedgerFilter::new(&query, now, chrono_tz::Asia::Jakarta);
        assert!(f.matches_donation(&recent));
        assert!(!f.matches_donation(&old));

        let query = LedgerQuery {
            status: Some(StatusFilter::Pending),
            ..Default::default()
        };
        let f = LedgerFilter::new(&query, now, chrono_tz::Asia::Jakarta);
        assert!(!f.matches_donation(&recent));
    }

    #[test]
    fn expense_filter_searches_description_and_location() {
        let now = at("2026-10-16T10:00:00Z");
        let e = expense("Nasi Kotak", "Masjid Al-Ikhlas", 1, "2026-10-16T01:00:00Z");
        for (q, hit) in [("nasi", true), ("ikhlas", true), ("bensin", false)] {
            let query = LedgerQuery {
                q: Some(q.into()),
                ..Default::default()
            };
            let f = LedgerFilter::new(&query, now, chrono_tz::Asia::Jakarta);
            assert_eq!(f.matches_expense(&e), hit, "{q}");
        }
        let query = LedgerQuery {
            period: Some(Period::Today),
            ..Default::default()
        };
        let f = LedgerFilter::new(&query, now + TimeDelta::days(2), chrono_tz::Asia::Jakarta);
        assert!(!f.matches_expense(&e));
    }
}
