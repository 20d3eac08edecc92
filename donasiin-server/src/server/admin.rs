use axum::Json;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use donasiin_shared::api;
use donasiin_shared::domain::DonationStatus;

use super::auth::AuthCtx;
use super::form::read_form;
use super::{AppError, AppState, dto};
use crate::services::ledger::{self, ExpenseInput};
use crate::services::timeline::{self, ActivityInput};
use crate::services::{progress, review};

pub async fn api_list_donations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Query(query): Query<api::ReviewQuery>,
) -> Result<Json<api::AdminDonationsDto>, AppError> {
    let list = review::list(
        &state.backend,
        query.view.unwrap_or_default(),
        &auth.access_token,
    )
    .await?;
    Ok(Json(dto::admin_donations(state.backend.files.as_ref(), list)))
}

async fn decide(
    state: &AppState,
    auth: &AuthCtx,
    id: &str,
    decision: DonationStatus,
) -> Result<Json<api::AdminDonationsDto>, AppError> {
    let list = review::decide(
        &state.backend,
        id,
        decision,
        &auth.user.email,
        &auth.access_token,
    )
    .await?;
    Ok(Json(dto::admin_donations(state.backend.files.as_ref(), list)))
}

pub async fn api_approve_donation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::AdminDonationsDto>, AppError> {
    decide(&state, &auth, &id, DonationStatus::Success).await
}

pub async fn api_reject_donation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::AdminDonationsDto>, AppError> {
    decide(&state, &auth, &id, DonationStatus::Rejected).await
}

pub async fn api_create_expense(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<api::ExpenseDto>), AppError> {
    let mut form = read_form(multipart).await?;
    let input = ExpenseInput {
        amount: form
            .integer::<i64>("amount")?
            .ok_or_else(|| AppError::bad_request("amount is required"))?,
        description: form.text("description")?,
        location: form.optional("location").unwrap_or_default().to_string(),
    };
    let receipt = form.take_file("receipt");
    let expense = ledger::record_expense(
        &state.backend,
        input,
        receipt,
        state.config.max_proof_bytes,
        &auth.access_token,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(dto::expense(state.backend.files.as_ref(), &expense)),
    ))
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("{name} must be a YYYY-MM-DD date")))
}

pub async fn api_create_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<api::ActivityDto>), AppError> {
    let mut form = read_form(multipart).await?;
    let input = ActivityInput {
        title: form.text("title")?,
        description: form.optional("description").unwrap_or_default().to_string(),
        location: form.optional("location").unwrap_or_default().to_string(),
        activity_date: parse_date("activity_date", &form.text("activity_date")?)?,
        participant_count: form.integer::<i32>("participant_count")?,
    };
    let images = form.take_files("images");
    let activity = timeline::record_activity(
        &state.backend,
        input,
        images,
        state.config.max_proof_bytes,
        &auth.access_token,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(dto::activity(state.backend.files.as_ref(), &activity)),
    ))
}

pub async fn api_put_weekly_target(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<api::WeeklyTargetReq>,
) -> Result<Json<api::WeeklyTargetDto>, AppError> {
    let saved = progress::set_weekly_target(
        &state.backend,
        parse_date("week_start", &body.week_start)?,
        parse_date("week_end", &body.week_end)?,
        body.target_amount,
        &auth.access_token,
    )
    .await?;
    Ok(Json(dto::weekly_target(&saved)))
}
