//! Minimal REST client helpers for consumers of the donation API.
//! Feature-gated by `rest-client` to keep reqwest out of builds that do not need it.

use super::endpoints as ep;
use super::*;
use once_cell::sync::Lazy;
use std::time::Duration;

pub use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("serde: {0}")]
    Serde(String),
}

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(60))
        .build()
        .expect("failed to build HTTP client")
});

fn mk_client() -> reqwest::Client {
    HTTP_CLIENT.clone()
}

async fn handle_json<T: for<'de> serde::Deserialize<'de>>(
    res: reqwest::Response,
) -> Result<T, RestError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    res.json::<T>()
        .await
        .map_err(|e| RestError::Serde(e.to_string()))
}

async fn handle_text(res: reqwest::Response) -> Result<String, RestError> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

async fn get_json<T: for<'de> serde::Deserialize<'de>>(
    url: String,
    bearer: Option<&str>,
) -> Result<T, RestError> {
    let mut req = mk_client().get(url);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }
    let res = req
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn server_version(base: &str) -> Result<VersionInfoDto, RestError> {
    get_json(ep::version(base), None).await
}

pub async fn login(base: &str, req: &LoginReq) -> Result<SessionDto, RestError> {
    let res = mk_client()
        .post(ep::auth_login(base))
        .json(req)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn logout(base: &str, bearer: &str) -> Result<(), RestError> {
    let res = mk_client()
        .post(ep::auth_logout(base))
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_text(res).await.map(|_| ())
}

pub async fn session(base: &str, bearer: &str) -> Result<SessionUserDto, RestError> {
    get_json(ep::auth_session(base), Some(bearer)).await
}

pub async fn payment_code(base: &str, req: &PaymentCodeReq) -> Result<PaymentCodeResp, RestError> {
    let res = mk_client()
        .post(ep::payment_code(base))
        .json(req)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

/// Proof image attached to a donation submission.
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub async fn submit_donation(
    base: &str,
    req: &PaymentCodeReq,
    proof: ProofUpload,
) -> Result<DonationReceiptDto, RestError> {
    let part = reqwest::multipart::Part::bytes(proof.bytes)
        .file_name(proof.file_name)
        .mime_str(&proof.content_type)
        .map_err(|e| RestError::Http(e.to_string()))?;
    let form = reqwest::multipart::Form::new()
        .text("donor_name", req.donor_name.clone())
        .text("phone_number", req.phone_number.clone())
        .text("amount", req.amount.to_string())
        .part("payment_proof", part);
    let res = mk_client()
        .post(ep::donations(base))
        .multipart(form)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn ledger_summary(base: &str) -> Result<LedgerSummaryDto, RestError> {
    get_json(ep::ledger_summary(base), None).await
}

pub async fn ledger_donations(
    base: &str,
    query: &LedgerQuery,
) -> Result<Vec<PublicDonationDto>, RestError> {
    let res = mk_client()
        .get(ep::ledger_donations(base))
        .query(query)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn ledger_expenses(
    base: &str,
    query: &LedgerQuery,
) -> Result<Vec<ExpenseDto>, RestError> {
    let res = mk_client()
        .get(ep::ledger_expenses(base))
        .query(query)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

/// Downloads the filtered donation ledger as CSV text.
pub async fn export_donations(base: &str, query: &LedgerQuery) -> Result<String, RestError> {
    let res = mk_client()
        .get(ep::ledger_donations_export(base))
        .query(query)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_text(res).await
}

pub async fn export_expenses(base: &str, query: &LedgerQuery) -> Result<String, RestError> {
    let res = mk_client()
        .get(ep::ledger_expenses_export(base))
        .query(query)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_text(res).await
}

pub async fn progress(base: &str) -> Result<WeeklyProgressDto, RestError> {
    get_json(ep::progress(base), None).await
}

pub async fn progress_history(base: &str) -> Result<Vec<WeeklyProgressDto>, RestError> {
    get_json(ep::progress_history(base), None).await
}

pub async fn activities(base: &str, query: &TimelineQuery) -> Result<Vec<ActivityDto>, RestError> {
    let res = mk_client()
        .get(ep::activities(base))
        .query(query)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn admin_donations(
    base: &str,
    bearer: &str,
    view: ReviewView,
) -> Result<AdminDonationsDto, RestError> {
    let res = mk_client()
        .get(ep::admin_donations(base))
        .bearer_auth(bearer)
        .query(&ReviewQuery { view: Some(view) })
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn approve_donation(
    base: &str,
    bearer: &str,
    donation_id: &str,
) -> Result<AdminDonationsDto, RestError> {
    let res = mk_client()
        .post(ep::admin_approve(base, donation_id))
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn reject_donation(
    base: &str,
    bearer: &str,
    donation_id: &str,
) -> Result<AdminDonationsDto, RestError> {
    let res = mk_client()
        .post(ep::admin_reject(base, donation_id))
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn put_weekly_target(
    base: &str,
    bearer: &str,
    req: &WeeklyTargetReq,
) -> Result<WeeklyTargetDto, RestError> {
    let res = mk_client()
        .put(ep::admin_weekly_targets(base))
        .bearer_auth(bearer)
        .json(req)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}
