use axum::extract::{Extension, State};
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use donasiin_shared::api;
use donasiin_shared::auth::Role;
use tracing::{error, info, warn};

use super::session::SessionEvent;
use super::{AppError, AppState};
use crate::backend::{AuthUser, BackendError};

/// Caller identity resolved by [`require_bearer`].
#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub user: AuthUser,
    pub role: Role,
    pub access_token: String,
}

fn bearer_token(req: &Request<axum::body::Body>) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(&req).map(str::to_string) else {
        return Err(AppError::unauthorized());
    };

    let user = match state.backend.auth.current_user(&token).await {
        Ok(user) => user,
        Err(BackendError::Unauthorized) => {
            warn!("auth: token rejected");
            return Err(AppError::unauthorized());
        }
        Err(e) => {
            error!(error = %e, "auth: resolving session failed");
            return Err(AppError::from(e));
        }
    };
    let role = state.config.role_for(&user.email);
    req.extensions_mut().insert(AuthCtx {
        user,
        role,
        access_token: token,
    });
    Ok(next.run(req).await)
}

fn session_user(state: &AppState, user: &AuthUser) -> api::SessionUserDto {
    api::SessionUserDto {
        id: user.id.clone(),
        email: user.email.clone(),
        role: state.config.role_for(&user.email),
    }
}

pub async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<api::LoginReq>,
) -> Result<Json<api::SessionDto>, AppError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    let session = state
        .backend
        .auth
        .sign_in(body.email.trim(), &body.password)
        .await?;
    let user = session_user(&state, &session.user);
    info!(email = %user.email, role = ?user.role, "login succeeded");
    state.sessions.publish(SessionEvent::SignedIn {
        user_id: session.user.id.clone(),
        email: session.user.email.clone(),
    });
    Ok(Json(api::SessionDto {
        access_token: session.access_token,
        token_type: "bearer".to_string(),
        expires_at: session.expires_at,
        user,
    }))
}

pub async fn api_auth_logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<StatusCode, AppError> {
    state.backend.auth.sign_out(&auth.access_token).await?;
    state.sessions.publish(SessionEvent::SignedOut {
        user_id: auth.user.id.clone(),
        email: auth.user.email.clone(),
    });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_auth_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Json<api::SessionUserDto> {
    Json(session_user(&state, &auth.user))
}
