mod acl;
mod admin;
pub mod auth;
pub mod config;
mod dto;
mod form;
mod public;
pub mod session;

use crate::backend::{Backend, BackendError};
use crate::services::ServiceError;
use crate::server::auth::AuthCtx;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    http::{Method, StatusCode, header},
    routing::{get, post, put},
};
pub use config::AppConfig;
use donasiin_shared::api;
use serde::Serialize;
use session::SessionEvents;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

/// Multipart framing and text fields on top of the image bytes.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub backend: Backend,
    pub sessions: SessionEvents,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Backend) -> Self {
        Self {
            config,
            backend,
            sessions: SessionEvents::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

/// Body limits for single-image forms and activity galleries.
fn upload_limits(max_proof_bytes: usize) -> (usize, usize) {
    let single = max_proof_bytes.saturating_add(FORM_OVERHEAD_BYTES);
    let gallery = max_proof_bytes
        .saturating_mul(crate::services::timeline::MAX_IMAGES)
        .saturating_add(FORM_OVERHEAD_BYTES);
    (single, gallery)
}

pub fn router(state: AppState) -> Router {
    let (proof_limit, gallery_limit) = upload_limits(state.config.max_proof_bytes);

    let private = Router::new()
        .route("/api/v1/auth/logout", post(auth::api_auth_logout))
        .route("/api/v1/auth/session", get(auth::api_auth_session))
        .route("/api/v1/admin/donations", get(admin::api_list_donations))
        .route(
            "/api/v1/admin/donations/{id}/approve",
            post(admin::api_approve_donation),
        )
        .route(
            "/api/v1/admin/donations/{id}/reject",
            post(admin::api_reject_donation),
        )
        .route(
            "/api/v1/admin/expenses",
            post(admin::api_create_expense).layer(DefaultBodyLimit::max(proof_limit)),
        )
        .route(
            "/api/v1/admin/activities",
            post(admin::api_create_activity).layer(DefaultBodyLimit::max(gallery_limit)),
        )
        .route(
            "/api/v1/admin/weekly-targets",
            put(admin::api_put_weekly_target),
        )
        .with_state(state.clone())
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            email = tracing::field::Empty,
            role = tracing::field::Empty,
        )
    });

    let mut app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/version", get(api_version))
        .route("/api/v1/auth/login", post(auth::api_auth_login))
        .route(
            "/api/v1/donations/payment-code",
            post(public::api_payment_code),
        )
        .route(
            "/api/v1/donations",
            post(public::api_submit_donation).layer(DefaultBodyLimit::max(proof_limit)),
        )
        .route("/api/v1/ledger/summary", get(public::api_ledger_summary))
        .route("/api/v1/ledger/donations", get(public::api_ledger_donations))
        .route("/api/v1/ledger/expenses", get(public::api_ledger_expenses))
        .route(
            "/api/v1/ledger/donations/export",
            get(public::api_export_donations),
        )
        .route(
            "/api/v1/ledger/expenses/export",
            get(public::api_export_expenses),
        )
        .route("/api/v1/progress", get(public::api_progress))
        .route("/api/v1/progress/history", get(public::api_progress_history))
        .route("/api/v1/activities", get(public::api_activities))
        .merge(private);

    if let Some(dir) = &state.backend.served_files {
        app = app.nest_service(
            crate::backend::local_files::FILES_ROUTE,
            ServeDir::new(dir),
        );
    }

    let app = app
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([header::CONTENT_DISPOSITION]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn api_version() -> Json<api::VersionInfoDto> {
    Json(api::VersionInfoDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    // Uploaded images are embedded by the public site, possibly on another origin
    let resource_policy = if path.starts_with("/files/") {
        "cross-origin"
    } else {
        "same-origin"
    };
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static(resource_policy),
    );
    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    // Disable caching for API and health endpoints
    if path == "/healthz" || path.starts_with("/api/") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(
            HeaderName::from_static("pragma"),
            HeaderValue::from_static("no-cache"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("email", tracing::field::display(&auth.user.email));
        span.record("role", tracing::field::debug(&auth.role));
    }
    Ok(next.run(req).await)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    BadGateway(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unauthorized => AppError::Unauthorized,
            BackendError::InvalidInput(m) => AppError::BadRequest(m),
            BackendError::Http(_) | BackendError::Status { .. } | BackendError::Decode(_) => {
                AppError::BadGateway(e.to_string())
            }
            BackendError::Storage(_) | BackendError::Io(_) | BackendError::Internal(_) => {
                AppError::internal(e)
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Invalid(m) => AppError::BadRequest(m),
            ServiceError::TooLarge(m) => AppError::PayloadTooLarge(m),
            ServiceError::NotFound(_) => AppError::NotFound(e.to_string()),
            ServiceError::Conflict { .. } => AppError::Conflict(e.to_string()),
            ServiceError::Backend(inner) => inner.into(),
            ServiceError::Qris(_) | ServiceError::Export(_) => AppError::internal(e),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            AppError::PayloadTooLarge(m) => {
                (StatusCode::PAYLOAD_TOO_LARGE, m, "payload_too_large", None)
            }
            // Do not leak upstream or internal error details to clients, but log them
            AppError::BadGateway(m) => (
                StatusCode::BAD_GATEWAY,
                "backend unavailable".into(),
                "bad_gateway",
                Some(m),
            ),
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::error!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
