use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::handlers::bookings::non_empty;
use crate::middleware::auth::AuthUser;
use crate::models::{ApprovalStatus, ArtistProfile, Role, User, UserId};
use crate::services::auth::AuthService;
use crate::services::payment::validate_hourly_rate;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    expires_in: i64,
    user: User,
}

// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub category_id: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub hourly_rate: Option<i64>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let name = body.name.trim().to_string();
    let email = normalize_email(&body.email)?;
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let role = match Role::parse(&body.role) {
        Some(role @ (Role::Customer | Role::Artist)) => role,
        _ => return Err(AppError::Validation("role must be customer or artist".to_string())),
    };

    let artist = if role == Role::Artist {
        let hourly_rate = validate_hourly_rate(body.hourly_rate.unwrap_or(0))?;
        Some(ArtistProfile {
            category_id: non_empty(body.category_id),
            bio: body.bio.unwrap_or_default().trim().to_string(),
            skills: clean_skills(body.skills.unwrap_or_default()),
            hourly_rate,
            approval: ApprovalStatus::Pending,
            schedule: None,
            rating: 0.0,
            review_count: 0,
        })
    } else {
        None
    };

    let password_hash = hash_password(&state.auth, body.password).await?;
    let user = User {
        id: UserId::generate(),
        name,
        email,
        password_hash,
        role,
        phone: non_empty(body.phone),
        artist,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db()?;
        if queries::get_user_by_email(&db, &user.email)?.is_some() {
            return Err(AppError::Conflict("email is already registered".to_string()));
        }
        if let Some(category_id) = user.artist.as_ref().and_then(|a| a.category_id.as_deref()) {
            if queries::get_category(&db, category_id)?.is_none() {
                return Err(AppError::Validation(format!("unknown category: {category_id}")));
            }
        }
        queries::create_user(&db, &user)?;
    }

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");

    let token = state.auth.issue_token(&user.id, user.role).map_err(anyhow::Error::from)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_in: state.auth.token_ttl_seconds(),
            user,
        }),
    ))
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = {
        let db = state.db()?;
        queries::get_user_by_email(&db, &body.email)?
    };
    let Some(user) = user else {
        tracing::info!("login failed: unknown email");
        return Err(AppError::Unauthorized);
    };

    let auth = state.auth.clone();
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || auth.verify_password(&body.password, &hash))
        .await
        .map_err(anyhow::Error::from)?;
    if !valid {
        tracing::info!(user_id = %user.id, "login failed: wrong password");
        return Err(AppError::Unauthorized);
    }

    let token = state.auth.issue_token(&user.id, user.role).map_err(anyhow::Error::from)?;
    Ok(Json(AuthResponse {
        token,
        expires_in: state.auth.token_ttl_seconds(),
        user,
    }))
}

// GET /api/auth/me
pub async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> AppResult<Json<User>> {
    let found = {
        let db = state.db()?;
        queries::get_user_by_id(&db, &user.id)?
    };
    found.map(Json).ok_or(AppError::Unauthorized)
}

pub(crate) async fn hash_password(auth: &AuthService, password: String) -> AppResult<String> {
    let auth = auth.clone();
    let hash = tokio::task::spawn_blocking(move || auth.hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(hash)
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::Validation("a valid email is required".to_string())),
    }
}

pub(crate) fn clean_skills(skills: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    cleaned.dedup();
    cleaned
}
