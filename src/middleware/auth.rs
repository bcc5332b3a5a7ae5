use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{Role, UserId};
use crate::state::AppState;

/// The caller behind a valid bearer token.
///
/// Use as an extractor; wrap in `Option` for routes that also serve
/// anonymous callers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, role: Role) -> AppResult<()> {
        if self.role != role {
            return Err(AppError::Forbidden(format!("{} access required", role.as_str())));
        }
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolves a token to its user. The role comes from storage, not the
/// token, so role changes apply to tokens already issued.
pub fn authenticate(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = state.auth.verify_token(token.trim()).map_err(|e| {
        tracing::warn!(error = %e, "token verification failed");
        AppError::Unauthorized
    })?;

    let user = {
        let db = state.db()?;
        queries::get_user_by_id(&db, &UserId::new(&claims.sub))?
    };
    let user = user.ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        id: user.id,
        role: user.role,
    })
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        authenticate(state, token)
    }
}
