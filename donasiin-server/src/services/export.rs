//! CSV export of the filtered ledger views.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use donasiin_shared::domain::{Donation, Expense};
use donasiin_shared::mask::mask_phone_number;

use super::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Donations,
    Expenses,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Donations => "donations",
            ExportKind::Expenses => "expenses",
        }
    }
}

pub fn file_name(kind: ExportKind, today: NaiveDate) -> String {
    format!("{}_{}.csv", kind.as_str(), today.format("%Y-%m-%d"))
}

/// `d/m/yyyy` in the configured zone, without zero padding.
fn local_day(at: DateTime<Utc>, tz: &Tz) -> String {
    at.with_timezone(tz).format("%-d/%-m/%Y").to_string()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ServiceError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ServiceError::Export(e.to_string()))
}

fn csv_err(e: csv::Error) -> ServiceError {
    ServiceError::Export(e.to_string())
}

pub fn donations_csv(rows: &[Donation], tz: &Tz) -> Result<String, ServiceError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["Tanggal", "Nama Donatur", "Nomor HP", "Jumlah", "Status"])
        .map_err(csv_err)?;
    for d in rows {
        wtr.write_record([
            local_day(d.created_at, tz),
            d.donor_name.clone(),
            mask_phone_number(&d.phone_number),
            d.amount.to_string(),
            d.status.to_string(),
        ])
        .map_err(csv_err)?;
    }
    finish(wtr)
}

pub fn expenses_csv(rows: &[Expense], tz: &Tz) -> Result<String, ServiceError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["Tanggal", "Deskripsi", "Lokasi", "Jumlah"])
        .map_err(csv_err)?;
    for e in rows {
        wtr.write_record([
            local_day(e.created_at, tz),
            e.description.clone(),
            e.location.clone(),
            e.amount.to_string(),
        ])
        .map_err(csv_err)?;
    }
    finish(wtr)
}
