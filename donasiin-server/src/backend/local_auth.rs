use async_trait::async_trait;
use bcrypt::verify;
use chrono::{Duration, Utc};
use donasiin_shared::jwt::{self, JwtClaims};
use tracing::{error, warn};

use super::sqlite::SqliteStore;
use super::{AuthProvider, AuthSession, AuthUser, BackendError};
use crate::server::config::UserConfig;

/// How many hours of inactivity before an admin session is considered expired.
const SESSION_IDLE_HOURS: i64 = 8;
/// How many hours before mandatory re-login.
const TOKEN_TTL_HOURS: i64 = 24;

const TOKEN_ROLE: &str = "authenticated";

/// Admin accounts from config, HS256 tokens and a session table for idle cutoff.
pub struct LocalAuth {
    store: SqliteStore,
    users: Vec<UserConfig>,
    secret: String,
}

impl LocalAuth {
    pub fn new(store: SqliteStore, users: Vec<UserConfig>, secret: String) -> Self {
        LocalAuth {
            store,
            users,
            secret,
        }
    }

    fn verify_token(&self, token: &str) -> Result<(JwtClaims, String), BackendError> {
        let claims = jwt::decode_and_verify(token, self.secret.as_bytes()).map_err(|e| {
            warn!(error = %e, "auth: jwt decode failed");
            BackendError::Unauthorized
        })?;
        let Some(jti) = claims.session_id.clone() else {
            warn!(sub = %claims.sub, "auth: token without session id");
            return Err(BackendError::Unauthorized);
        };
        Ok((claims, jti))
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let email = email.trim();
        let user = self
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| {
                warn!(email, "login: unknown user");
                BackendError::Unauthorized
            })?;
        if !verify(password, &user.password_hash).map_err(|e| {
            error!(email, error = %e, "login: bcrypt verify failed");
            BackendError::Internal(e.to_string())
        })? {
            warn!(email, "login: invalid password");
            return Err(BackendError::Unauthorized);
        }

        let jti = uuid::Uuid::new_v4().to_string();
        let exp = (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp();
        let claims = JwtClaims {
            sub: user.email.to_lowercase(),
            email: Some(user.email.clone()),
            role: TOKEN_ROLE.to_string(),
            exp,
            session_id: Some(jti.clone()),
        };
        self.store.create_session(&jti, &user.email).await?;
        let access_token = jwt::encode(&claims, self.secret.as_bytes()).map_err(|e| {
            error!(email, error = %e, "login: jwt encode failed");
            BackendError::Internal(e.to_string())
        })?;
        Ok(AuthSession {
            access_token,
            expires_at: exp,
            user: AuthUser {
                id: claims.sub,
                email: user.email.clone(),
            },
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let (claims, jti) = self.verify_token(access_token)?;
        let cutoff = Utc::now() - Duration::hours(SESSION_IDLE_HOURS);
        if !self
            .store
            .touch_session_with_cutoff(&jti, cutoff.naive_utc())
            .await?
        {
            warn!(
                jti = %jti,
                sub = %claims.sub,
                cutoff = %cutoff,
                "auth: session missing or expired (last_used_at < cutoff)"
            );
            return Err(BackendError::Unauthorized);
        }
        Ok(AuthUser {
            email: claims.email.unwrap_or_else(|| claims.sub.clone()),
            id: claims.sub,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let (_, jti) = self.verify_token(access_token)?;
        if !self.store.delete_session(&jti).await? {
            return Err(BackendError::Unauthorized);
        }
        Ok(())
    }
}
