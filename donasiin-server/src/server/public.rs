use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use donasiin_shared::api;
use donasiin_shared::domain::now_utc;
use donasiin_shared::week::local_date;

use super::form::read_form;
use super::{AppError, AppState, dto};
use crate::services::export::{self, ExportKind};
use crate::services::ledger::{self, LedgerFilter};
use crate::services::{intake, progress, timeline};

pub async fn api_payment_code(
    State(state): State<AppState>,
    Json(body): Json<api::PaymentCodeReq>,
) -> Result<Json<api::PaymentCodeResp>, AppError> {
    Ok(Json(intake::payment_code(&state.config, &body)?))
}

pub async fn api_submit_donation(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<api::DonationReceiptDto>), AppError> {
    let mut form = read_form(multipart).await?;
    let amount = form
        .integer::<i64>("amount")?
        .ok_or_else(|| AppError::bad_request("amount is required"))?;
    let req = api::PaymentCodeReq {
        donor_name: form.optional("donor_name").unwrap_or_default().to_string(),
        phone_number: form.optional("phone_number").unwrap_or_default().to_string(),
        amount,
    };
    let proof = form.take_file("payment_proof");
    let donation = intake::submit(&state.config, &state.backend, &req, proof).await?;
    Ok((StatusCode::CREATED, Json(dto::receipt(&donation))))
}

pub async fn api_ledger_summary(
    State(state): State<AppState>,
) -> Result<Json<api::LedgerSummaryDto>, AppError> {
    Ok(Json(ledger::summary(&state.backend).await?))
}

fn filter(state: &AppState, query: &api::LedgerQuery) -> LedgerFilter {
    LedgerFilter::new(query, now_utc(), state.config.timezone)
}

pub async fn api_ledger_donations(
    State(state): State<AppState>,
    Query(query): Query<api::LedgerQuery>,
) -> Result<Json<Vec<api::PublicDonationDto>>, AppError> {
    let rows = ledger::donations(&state.backend, &filter(&state, &query)).await?;
    Ok(Json(rows.iter().map(dto::public_donation).collect()))
}

pub async fn api_ledger_expenses(
    State(state): State<AppState>,
    Query(query): Query<api::LedgerQuery>,
) -> Result<Json<Vec<api::ExpenseDto>>, AppError> {
    let rows = ledger::expenses(&state.backend, &filter(&state, &query)).await?;
    let files = state.backend.files.as_ref();
    Ok(Json(rows.iter().map(|e| dto::expense(files, e)).collect()))
}

fn csv_response(state: &AppState, kind: ExportKind, body: String) -> impl IntoResponse + use<> {
    let today = local_date(&state.config.timezone, now_utc());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::file_name(kind, today)
    );
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

pub async fn api_export_donations(
    State(state): State<AppState>,
    Query(query): Query<api::LedgerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = ledger::donations(&state.backend, &filter(&state, &query)).await?;
    let body = export::donations_csv(&rows, &state.config.timezone)?;
    tracing::info!(rows = rows.len(), "donation ledger exported");
    Ok(csv_response(&state, ExportKind::Donations, body))
}

pub async fn api_export_expenses(
    State(state): State<AppState>,
    Query(query): Query<api::LedgerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = ledger::expenses(&state.backend, &filter(&state, &query)).await?;
    let body = export::expenses_csv(&rows, &state.config.timezone)?;
    tracing::info!(rows = rows.len(), "expense ledger exported");
    Ok(csv_response(&state, ExportKind::Expenses, body))
}

pub async fn api_progress(
    State(state): State<AppState>,
) -> Result<Json<api::WeeklyProgressDto>, AppError> {
    let dto = progress::current_week(
        &state.backend,
        state.config.timezone,
        state.config.fallback_target,
        now_utc(),
    )
    .await?;
    Ok(Json(dto))
}

pub async fn api_progress_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::WeeklyProgressDto>>, AppError> {
    Ok(Json(
        progress::history(&state.backend, state.config.timezone).await?,
    ))
}

pub async fn api_activities(
    State(state): State<AppState>,
    Query(query): Query<api::TimelineQuery>,
) -> Result<Json<Vec<api::ActivityDto>>, AppError> {
    let rows = timeline::list(
        &state.backend,
        query.period.unwrap_or_default(),
        now_utc(),
        state.config.timezone,
    )
    .await?;
    let files = state.backend.files.as_ref();
    Ok(Json(rows.iter().map(|a| dto::activity(files, a)).collect()))
}
