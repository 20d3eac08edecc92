//! Persistence, file storage and identity behind one set of traits.
//!
//! Two implementations exist: a hosted Supabase project reached over HTTP, and
//! a local SQLite database with files on disk and admins listed in config.

pub mod local_auth;
pub mod local_files;
pub mod sqlite;
pub mod supabase;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use donasiin_shared::domain::{
    Activity, Donation, DonationStatus, Expense, NewActivity, NewDonation, NewExpense,
    WeeklyTarget, WeeklyTotals,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::server::config::{AppConfig, BackendConfig};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] sqlite::StorageError),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid credentials or session")]
    Unauthorized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    PaymentProofs,
    Receipts,
    TimelineImages,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [
        Bucket::PaymentProofs,
        Bucket::Receipts,
        Bucket::TimelineImages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::PaymentProofs => "payment-proofs",
            Bucket::Receipts => "receipts",
            Bucket::TimelineImages => "timeline-images",
        }
    }
}

/// Path segment encoding that leaves common filename punctuation readable.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes each `/`-separated segment of an object name.
pub fn encode_object_path(name: &str) -> String {
    name.split('/')
        .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Filter for donation listings. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct DonationQuery {
    pub status: Option<DonationStatus>,
}

impl DonationQuery {
    pub fn with_status(status: DonationStatus) -> Self {
        DonationQuery {
            status: Some(status),
        }
    }
}

/// Typed access to the four application tables.
///
/// Writes performed on behalf of an admin take the admin's access token so a
/// hosted backend can enforce its own row policies.
#[async_trait]
pub trait Records: Send + Sync {
    async fn insert_donation(&self, new: &NewDonation) -> Result<Donation, BackendError>;

    async fn get_donation(
        &self,
        id: &str,
        bearer: Option<&str>,
    ) -> Result<Option<Donation>, BackendError>;

    async fn list_donations(
        &self,
        query: &DonationQuery,
        bearer: Option<&str>,
    ) -> Result<Vec<Donation>, BackendError>;

    /// Moves a pending donation to `status`. Returns `None` when no row with
    /// that id is still pending.
    async fn verify_donation(
        &self,
        id: &str,
        status: DonationStatus,
        verified_at: DateTime<Utc>,
        bearer: &str,
    ) -> Result<Option<Donation>, BackendError>;

    /// Successful donations created in `[start, end)`.
    async fn weekly_totals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WeeklyTotals, BackendError>;

    async fn list_expenses(&self) -> Result<Vec<Expense>, BackendError>;

    async fn insert_expense(&self, new: &NewExpense, bearer: &str)
    -> Result<Expense, BackendError>;

    async fn weekly_target(
        &self,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyTarget>, BackendError>;

    /// Most recent targets by `week_start`, newest first.
    async fn recent_weekly_targets(&self, limit: usize)
    -> Result<Vec<WeeklyTarget>, BackendError>;

    async fn upsert_weekly_target(
        &self,
        target: &WeeklyTarget,
        bearer: &str,
    ) -> Result<WeeklyTarget, BackendError>;

    /// All activities, latest `activity_date` first.
    async fn list_activities(&self) -> Result<Vec<Activity>, BackendError>;

    async fn insert_activity(
        &self,
        new: &NewActivity,
        bearer: &str,
    ) -> Result<Activity, BackendError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: Bucket,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bearer: Option<&str>,
    ) -> Result<(), BackendError>;

    fn public_url(&self, bucket: Bucket, name: &str) -> String;

    /// Stored references may already be absolute URLs.
    fn resolve(&self, bucket: Bucket, stored: &str) -> String {
        if stored.starts_with("http://") || stored.starts_with("https://") {
            stored.to_string()
        } else {
            self.public_url(bucket, stored)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;

    /// Resolves an access token to its user, or `Unauthorized`.
    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn Records>,
    pub files: Arc<dyn ObjectStore>,
    pub auth: Arc<dyn AuthProvider>,
    /// Directory served under `/files` when objects live on local disk.
    pub served_files: Option<PathBuf>,
}

pub async fn connect(config: &AppConfig) -> Result<Backend, BackendError> {
    match &config.backend {
        BackendConfig::Supabase { url, anon_key } => {
            let client = supabase::SupabaseClient::new(
                url,
                anon_key,
                config.jwt_secret.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )?;
            tracing::info!(url = %url, "using supabase backend");
            Ok(Backend {
                records: Arc::new(client.clone()),
                files: Arc::new(client.clone()),
                auth: Arc::new(client),
                served_files: None,
            })
        }
        BackendConfig::Sqlite {
            db_path,
            files_dir,
            public_base_url,
        } => {
            if let Some(parent) = std::path::Path::new(db_path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let store = sqlite::SqliteStore::connect(db_path).await?;
            let files = local_files::LocalFiles::new(files_dir.clone(), public_base_url.as_deref());
            files.ensure_buckets().await?;
            let secret = config.jwt_secret.clone().unwrap_or_default();
            let auth = local_auth::LocalAuth::new(store.clone(), config.users.clone(), secret);
            tracing::info!(db_path = %db_path, files_dir = %files_dir.display(), "using sqlite backend");
            Ok(Backend {
                records: Arc::new(store),
                files: Arc::new(files),
                auth: Arc::new(auth),
                served_files: Some(files_dir.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths_keep_separators_and_encode_segments() {
        assert_eq!(
            encode_object_path("2026/10 16/bukti #1.jpg"),
            "2026/10%2016/bukti%20%231.jpg"
        );
        assert_eq!(encode_object_path("170-abc_d.png"), "170-abc_d.png");
    }

    #[test]
    fn bucket_names_match_storage_layout() {
        let names: Vec<_> = Bucket::ALL.iter().map(Bucket::as_str).collect();
        assert_eq!(names, ["payment-proofs", "receipts", "timeline-images"]);
    }
}
