pub mod models;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use donasiin_shared::domain::{
    Activity, Donation, DonationStatus, Expense, NewActivity, NewDonation, NewExpense,
    WeeklyTarget, WeeklyTotals,
};
use models::{
    ActivityRow, DonationRow, ExpenseRow, NewActivityRow, NewDonationRow, NewExpenseRow,
    NewSession, WeeklyTargetRow,
};
use tracing::trace;
use uuid::Uuid;

use super::{BackendError, DonationQuery, Records};

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored value could not be mapped back to its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl SqliteStore {
    pub async fn connect(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(SqliteStore { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            f(&mut conn)
        })
        .await?
    }

    // Session helpers for JWT inactivity windows
    pub async fn create_session(&self, jti_: &str, email_: &str) -> Result<(), StorageError> {
        use schema::sessions;
        let j = jti_.to_string();
        let e = email_.to_string();
        self.with_conn(move |conn| {
            let new = NewSession {
                jti: &j,
                email: &e,
            };
            diesel::insert_into(sessions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn delete_session(&self, jti_: &str) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let j = jti_.to_string();
        self.with_conn(move |conn| {
            let deleted = diesel::delete(sessions.filter(jti.eq(&j))).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Marks the session used, but only while `last_used_at` is not older
    /// than `cutoff`. Returns `false` for unknown or idle-expired sessions.
    pub async fn touch_session_with_cutoff(
        &self,
        jti_: &str,
        cutoff: NaiveDateTime,
    ) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let j = jti_.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now().naive_utc();
            let updated =
                diesel::update(sessions.filter(jti.eq(&j)).filter(last_used_at.ge(cutoff)))
                    .set(last_used_at.eq(now))
                    .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }
}

fn load_donation(conn: &mut SqliteConnection, id_: &str) -> Result<Option<Donation>, StorageError> {
    use schema::donations::dsl::*;
    donations
        .filter(id.eq(id_))
        .select(DonationRow::as_select())
        .first::<DonationRow>(conn)
        .optional()?
        .map(Donation::try_from)
        .transpose()
}

#[async_trait]
impl Records for SqliteStore {
    async fn insert_donation(&self, new: &NewDonation) -> Result<Donation, BackendError> {
        use schema::donations;
        let new = new.clone();
        let donation = self
            .with_conn(move |conn| {
                let id = Uuid::new_v4().to_string();
                let row = NewDonationRow {
                    id: &id,
                    donor_name: &new.donor_name,
                    phone_number: &new.phone_number,
                    amount: new.amount,
                    status: new.status.as_str(),
                    payment_proof_url: new.payment_proof_url.as_deref(),
                    qris_data: new.qris_data.as_deref(),
                    created_at: Utc::now().naive_utc(),
                };
                diesel::insert_into(donations::table)
                    .values(&row)
                    .execute(conn)?;
                load_donation(conn, &id)?
                    .ok_or_else(|| StorageError::Corrupt(format!("donation {id} vanished")))
            })
            .await?;
        trace!(donation_id = %donation.id, "insert_donation");
        Ok(donation)
    }

    async fn get_donation(
        &self,
        id: &str,
        _bearer: Option<&str>,
    ) -> Result<Option<Donation>, BackendError> {
        let id = id.to_string();
        Ok(self.with_conn(move |conn| load_donation(conn, &id)).await?)
    }

    async fn list_donations(
        &self,
        query: &DonationQuery,
        _bearer: Option<&str>,
    ) -> Result<Vec<Donation>, BackendError> {
        use schema::donations::dsl::*;
        let query = query.clone();
        Ok(self
            .with_conn(move |conn| {
                let mut q = donations
                    .select(DonationRow::as_select())
                    .order(created_at.desc())
                    .into_boxed();
                if let Some(s) = query.status {
                    q = q.filter(status.eq(s.as_str()));
                }
                q.load::<DonationRow>(conn)?
                    .into_iter()
                    .map(Donation::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .await?)
    }

    async fn verify_donation(
        &self,
        id_: &str,
        next: DonationStatus,
        at: DateTime<Utc>,
        _bearer: &str,
    ) -> Result<Option<Donation>, BackendError> {
        use schema::donations::dsl::*;
        let target = id_.to_string();
        Ok(self
            .with_conn(move |conn| {
                let updated = diesel::update(
                    donations
                        .filter(id.eq(&target))
                        .filter(status.eq(DonationStatus::Pending.as_str())),
                )
                .set((
                    status.eq(next.as_str()),
                    verified_at.eq(Some(at.naive_utc())),
                ))
                .execute(conn)?;
                if updated == 0 {
                    return Ok(None);
                }
                load_donation(conn, &target)
            })
            .await?)
    }

    async fn weekly_totals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WeeklyTotals, BackendError> {
        use schema::donations::dsl::*;
        let (from, until) = (start.naive_utc(), end.naive_utc());
        Ok(self
            .with_conn(move |conn| {
                let rows: Vec<(i64, String)> = donations
                    .filter(status.eq(DonationStatus::Success.as_str()))
                    .filter(created_at.ge(from))
                    .filter(created_at.lt(until))
                    .select((amount, donor_name))
                    .load(conn)?;
                Ok(WeeklyTotals::from_rows(
                    rows.iter().map(|(a, n)| (*a, n.as_str())),
                ))
            })
            .await?)
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, BackendError> {
        use schema::expenses::dsl::*;
        Ok(self
            .with_conn(|conn| {
                Ok(expenses
                    .select(ExpenseRow::as_select())
                    .order(created_at.desc())
                    .load::<ExpenseRow>(conn)?
                    .into_iter()
                    .map(Expense::from)
                    .collect())
            })
            .await?)
    }

    async fn insert_expense(
        &self,
        new: &NewExpense,
        _bearer: &str,
    ) -> Result<Expense, BackendError> {
        use schema::expenses;
        let new = new.clone();
        Ok(self
            .with_conn(move |conn| {
                let id = Uuid::new_v4().to_string();
                let row = NewExpenseRow {
                    id: &id,
                    amount: new.amount,
                    description: &new.description,
                    location: &new.location,
                    receipt_url: new.receipt_url.as_deref(),
                    created_at: Utc::now().naive_utc(),
                };
                diesel::insert_into(expenses::table)
                    .values(&row)
                    .execute(conn)?;
                let row: ExpenseRow = expenses::table
                    .find(&id)
                    .select(ExpenseRow::as_select())
                    .first(conn)?;
                Ok(Expense::from(row))
            })
            .await?)
    }

    async fn weekly_target(
        &self,
        start: NaiveDate,
    ) -> Result<Option<WeeklyTarget>, BackendError> {
        use schema::weekly_targets::dsl::*;
        Ok(self
            .with_conn(move |conn| {
                Ok(weekly_targets
                    .filter(week_start.eq(start))
                    .select(WeeklyTargetRow::as_select())
                    .first::<WeeklyTargetRow>(conn)
                    .optional()?
                    .map(WeeklyTarget::from))
            })
            .await?)
    }

    async fn recent_weekly_targets(
        &self,
        limit: usize,
    ) -> Result<Vec<WeeklyTarget>, BackendError> {
        use schema::weekly_targets::dsl::*;
        Ok(self
            .with_conn(move |conn| {
                Ok(weekly_targets
                    .select(WeeklyTargetRow::as_select())
                    .order(week_start.desc())
                    .limit(limit as i64)
                    .load::<WeeklyTargetRow>(conn)?
                    .into_iter()
                    .map(WeeklyTarget::from)
                    .collect())
            })
            .await?)
    }

    async fn upsert_weekly_target(
        &self,
        target: &WeeklyTarget,
        _bearer: &str,
    ) -> Result<WeeklyTarget, BackendError> {
        use schema::weekly_targets::dsl::*;
        let row = WeeklyTargetRow::from(target);
        Ok(self
            .with_conn(move |conn| {
                diesel::insert_into(weekly_targets)
                    .values(&row)
                    .on_conflict(week_start)
                    .do_update()
                    .set((
                        week_end.eq(row.week_end),
                        target_amount.eq(row.target_amount),
                    ))
                    .execute(conn)?;
                Ok(WeeklyTarget::from(row))
            })
            .await?)
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, BackendError> {
        use schema::timeline_activities::dsl::*;
        Ok(self
            .with_conn(|conn| {
                timeline_activities
                    .select(ActivityRow::as_select())
                    .order((activity_date.desc(), created_at.desc()))
                    .load::<ActivityRow>(conn)?
                    .into_iter()
                    .map(Activity::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .await?)
    }

    async fn insert_activity(
        &self,
        new: &NewActivity,
        _bearer: &str,
    ) -> Result<Activity, BackendError> {
        use schema::timeline_activities;
        let new = new.clone();
        Ok(self
            .with_conn(move |conn| {
                let id = Uuid::new_v4().to_string();
                let images = serde_json::to_string(&new.image_urls)
                    .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
                let row = NewActivityRow {
                    id: &id,
                    title: &new.title,
                    description: &new.description,
                    location: &new.location,
                    activity_date: new.activity_date,
                    image_urls: images,
                    participant_count: new.participant_count,
                    created_at: Utc::now().naive_utc(),
                };
                diesel::insert_into(timeline_activities::table)
                    .values(&row)
                    .execute(conn)?;
                let row: ActivityRow = timeline_activities::table
                    .find(&id)
                    .select(ActivityRow::as_select())
                    .first(conn)?;
                Activity::try_from(row)
            })
            .await?)
    }
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    Ok(())
}
