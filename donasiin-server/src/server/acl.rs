use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use donasiin_shared::auth::Role;

pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };

    let segs = segmented(&path);
    let prefix = ["api", "v1"];
    if !segs.as_slice().starts_with(&prefix) {
        tracing::warn!(?segs, "ACL: path outside api scope");
        return Err(AppError::forbidden());
    }
    let rest = &segs[prefix.len()..];

    let decision = match auth.role {
        Role::Admin => allow_admin(&method, rest),
        Role::Viewer => allow_session(&method, rest),
    };

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            email = %auth.user.email,
            role = ?auth.role,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

fn allow_admin(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["admin", "donations"] if *method == Method::GET => Ok(()),
        ["admin", "donations", id, action]
            if *method == Method::POST
                && (action == &"approve" || action == &"reject")
                && !id.is_empty() =>
        {
            Ok(())
        }
        ["admin", "expenses"] if *method == Method::POST => Ok(()),
        ["admin", "activities"] if *method == Method::POST => Ok(()),
        ["admin", "weekly-targets"] if *method == Method::PUT => Ok(()),
        _ => allow_session(method, rest),
    }
}

/// Session routes open to any signed-in user.
fn allow_session(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["auth", "session"] if *method == Method::GET => Ok(()),
        ["auth", "logout"] if *method == Method::POST => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
