//! Hosted backend: PostgREST tables, Storage buckets and GoTrue auth of a
//! Supabase project, reached with the project's anon key.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use donasiin_shared::domain::{
    Activity, Donation, DonationStatus, Expense, NewActivity, NewDonation, NewExpense,
    WeeklyTarget, WeeklyTotals,
};
use donasiin_shared::jwt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    AuthProvider, AuthSession, AuthUser, BackendError, Bucket, DonationQuery, ObjectStore, Records,
    encode_object_path,
};

const DONATIONS: &str = "donations";
const EXPENSES: &str = "expenses";
const WEEKLY_TARGETS: &str = "weekly_targets";
const ACTIVITIES: &str = "timeline_activities";

#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base: String,
    anon_key: String,
    jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum Order {
    Asc,
    Desc,
}

/// PostgREST filter and ordering parameters for one table.
#[derive(Debug, Clone)]
pub struct Select {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl Select {
    pub fn table(table: &'static str) -> Self {
        Select {
            table,
            params: vec![("select".into(), "*".into())],
        }
    }

    pub fn columns(mut self, cols: &str) -> Self {
        self.params[0].1 = cols.to_string();
        self
    }

    fn filter(mut self, col: &str, op: &str, value: impl Display) -> Self {
        self.params.push((col.to_string(), format!("{op}.{value}")));
        self
    }

    pub fn eq(self, col: &str, value: impl Display) -> Self {
        self.filter(col, "eq", value)
    }

    pub fn gte(self, col: &str, value: impl Display) -> Self {
        self.filter(col, "gte", value)
    }

    pub fn lt(self, col: &str, value: impl Display) -> Self {
        self.filter(col, "lt", value)
    }

    pub fn order(mut self, col: &str, order: Order) -> Self {
        let dir = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        // Repeated orderings are joined into one comma-separated parameter.
        match self.params.iter_mut().find(|(k, _)| k == "order") {
            Some((_, v)) => v.push_str(&format!(",{col}.{dir}")),
            None => self.params.push(("order".into(), format!("{col}.{dir}"))),
        }
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".into(), n.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Serialize)]
struct StatusPatch<'a> {
    status: &'a str,
    verified_at: String,
}

#[derive(Deserialize)]
struct TotalsRow {
    amount: i64,
    donor_name: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: GoTrueUser,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(u: GoTrueUser) -> Self {
        AuthUser {
            email: u.email.unwrap_or_default(),
            id: u.id,
        }
    }
}

impl SupabaseClient {
    pub fn new(
        url: &str,
        anon_key: &str,
        jwt_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()?;
        Ok(SupabaseClient {
            inner: Arc::new(Inner {
                http,
                base: url.trim_end_matches('/').to_string(),
                anon_key: anon_key.to_string(),
                jwt_secret: jwt_secret.filter(|s| !s.trim().is_empty()),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.inner
            .http
            .request(method, self.url(path))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.inner.anon_key))
    }

    async fn check(res: Response) -> Result<Response, BackendError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            warn!(body = %body, "supabase: unauthorized");
            return Err(BackendError::Unauthorized);
        }
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(res: Response) -> Result<T, BackendError> {
        let res = Self::check(res).await?;
        res.json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        q: &Select,
        bearer: Option<&str>,
    ) -> Result<Vec<T>, BackendError> {
        debug!(table = q.table, params = ?q.params, "supabase select");
        let res = self
            .request(Method::GET, &format!("rest/v1/{}", q.table), bearer)
            .query(q.params())
            .send()
            .await?;
        Self::json(res).await
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &'static str,
        body: &B,
        bearer: Option<&str>,
        on_conflict: Option<&str>,
    ) -> Result<T, BackendError> {
        let mut req = self.request(Method::POST, &format!("rest/v1/{table}"), bearer);
        req = match on_conflict {
            Some(col) => req
                .query(&[("on_conflict", col)])
                .header("Prefer", "return=representation,resolution=merge-duplicates"),
            None => req.header("Prefer", "return=representation"),
        };
        let res = req.json(body).send().await?;
        let mut rows: Vec<T> = Self::json(res).await?;
        if rows.is_empty() {
            return Err(BackendError::Decode(format!(
                "insert into {table} returned no rows"
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        q: &Select,
        body: &B,
        bearer: &str,
    ) -> Result<Vec<T>, BackendError> {
        let res = self
            .request(Method::PATCH, &format!("rest/v1/{}", q.table), Some(bearer))
            .query(q.params())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        Self::json(res).await
    }
}

#[async_trait]
impl Records for SupabaseClient {
    async fn insert_donation(&self, new: &NewDonation) -> Result<Donation, BackendError> {
        self.insert(DONATIONS, new, None, None).await
    }

    async fn get_donation(
        &self,
        id: &str,
        bearer: Option<&str>,
    ) -> Result<Option<Donation>, BackendError> {
        let q = Select::table(DONATIONS).eq("id", id).limit(1);
        Ok(self.select(&q, bearer).await?.into_iter().next())
    }

    async fn list_donations(
        &self,
        query: &DonationQuery,
        bearer: Option<&str>,
    ) -> Result<Vec<Donation>, BackendError> {
        let mut q = Select::table(DONATIONS);
        if let Some(status) = query.status {
            q = q.eq("status", status);
        }
        q = q.order("created_at", Order::Desc);
        self.select(&q, bearer).await
    }

    async fn verify_donation(
        &self,
        id: &str,
        status: DonationStatus,
        verified_at: DateTime<Utc>,
        bearer: &str,
    ) -> Result<Option<Donation>, BackendError> {
        let q = Select::table(DONATIONS)
            .eq("id", id)
            .eq("status", DonationStatus::Pending);
        let patch = StatusPatch {
            status: status.as_str(),
            verified_at: timestamp(verified_at),
        };
        let rows: Vec<Donation> = self.update(&q, &patch, bearer).await?;
        Ok(rows.into_iter().next())
    }

    async fn weekly_totals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WeeklyTotals, BackendError> {
        let q = Select::table(DONATIONS)
            .columns("amount,donor_name")
            .eq("status", DonationStatus::Success)
            .gte("created_at", timestamp(start))
            .lt("created_at", timestamp(end));
        let rows: Vec<TotalsRow> = self.select(&q, None).await?;
        Ok(WeeklyTotals::from_rows(
            rows.iter().map(|r| (r.amount, r.donor_name.as_str())),
        ))
    }

    async fn list_expenses(&self) -> Result<Vec<Expense>, BackendError> {
        let q = Select::table(EXPENSES).order("created_at", Order::Desc);
        self.select(&q, None).await
    }

    async fn insert_expense(
        &self,
        new: &NewExpense,
        bearer: &str,
    ) -> Result<Expense, BackendError> {
        self.insert(EXPENSES, new, Some(bearer), None).await
    }

    async fn weekly_target(
        &self,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyTarget>, BackendError> {
        let q = Select::table(WEEKLY_TARGETS)
            .eq("week_start", week_start)
            .limit(1);
        Ok(self.select(&q, None).await?.into_iter().next())
    }

    async fn recent_weekly_targets(
        &self,
        limit: usize,
    ) -> Result<Vec<WeeklyTarget>, BackendError> {
        let q = Select::table(WEEKLY_TARGETS)
            .order("week_start", Order::Desc)
            .limit(limit);
        self.select(&q, None).await
    }

    async fn upsert_weekly_target(
        &self,
        target: &WeeklyTarget,
        bearer: &str,
    ) -> Result<WeeklyTarget, BackendError> {
        self.insert(WEEKLY_TARGETS, target, Some(bearer), Some("week_start"))
            .await
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, BackendError> {
        let q = Select::table(ACTIVITIES)
            .order("activity_date", Order::Desc)
            .order("created_at", Order::Desc);
        self.select(&q, None).await
    }

    async fn insert_activity(
        &self,
        new: &NewActivity,
        bearer: &str,
    ) -> Result<Activity, BackendError> {
        self.insert(ACTIVITIES, new, Some(bearer), None).await
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        bucket: Bucket,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        bearer: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = format!(
            "storage/v1/object/{}/{}",
            bucket.as_str(),
            encode_object_path(name)
        );
        let res = self
            .request(Method::POST, &path, bearer)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        Self::check(res).await?;
        debug!(bucket = bucket.as_str(), object = name, "supabase: object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, name: &str) -> String {
        self.url(&format!(
            "storage/v1/object/public/{}/{}",
            bucket.as_str(),
            encode_object_path(name)
        ))
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let res = self
            .request(Method::POST, "auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password })
            .send()
            .await?;
        if matches!(
            res.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            warn!(email, "login: rejected by supabase");
            return Err(BackendError::Unauthorized);
        }
        let token: TokenResponse = Self::json(res).await?;
        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|s| Utc::now().timestamp() + s))
            .unwrap_or_default();
        Ok(AuthSession {
            access_token: token.access_token,
            expires_at,
            user: token.user.into(),
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        // With the project secret configured, forged or expired tokens never leave the process.
        if let Some(secret) = &self.inner.jwt_secret {
            jwt::decode_and_verify(access_token, secret.as_bytes()).map_err(|e| {
                warn!(error = %e, "auth: jwt decode failed");
                BackendError::Unauthorized
            })?;
        }
        let res = self
            .request(Method::GET, "auth/v1/user", Some(access_token))
            .send()
            .await?;
        if res.status() == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        let user: GoTrueUser = Self::json(res).await?;
        Ok(user.into())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let res = self
            .request(Method::POST, "auth/v1/logout", Some(access_token))
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }
}
