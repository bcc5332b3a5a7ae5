use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, ArtistFilter};
use crate::errors::{AppError, AppResult};
use crate::handlers::artists::{to_artist_responses, ArtistResponse};
use crate::handlers::bookings::non_empty;
use crate::middleware::auth::AuthUser;
use crate::models::{ApprovalStatus, Category, Role, User, UserId};
use crate::services::notifications::notify;
use crate::state::AppState;

// GET /api/admin/artists
#[derive(Deserialize)]
pub struct AdminArtistsQuery {
    pub approval: Option<String>,
}

pub async fn list_artists(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AdminArtistsQuery>,
) -> AppResult<Json<Vec<ArtistResponse>>> {
    user.require(Role::Admin)?;

    let approval = query
        .approval
        .as_deref()
        .map(|s| {
            ApprovalStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown approval status: {s}")))
        })
        .transpose()?;

    let artists = {
        let db = state.db()?;
        queries::list_artists(
            &db,
            &ArtistFilter {
                approval,
                ..Default::default()
            },
        )?
    };
    Ok(Json(to_artist_responses(artists)))
}

// POST /api/admin/artists/:id/approve
pub async fn approve_artist(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    set_approval(&state, &user, &id, ApprovalStatus::Approved).await
}

// POST /api/admin/artists/:id/reject
pub async fn reject_artist(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    set_approval(&state, &user, &id, ApprovalStatus::Rejected).await
}

async fn set_approval(
    state: &Arc<AppState>,
    user: &AuthUser,
    id: &str,
    approval: ApprovalStatus,
) -> AppResult<Json<serde_json::Value>> {
    user.require(Role::Admin)?;
    let artist_id = UserId::new(id);

    let updated = {
        let db = state.db()?;
        queries::set_artist_approval(&db, &artist_id, approval)?
    };
    if !updated {
        return Err(AppError::NotFound("artist".to_string()));
    }

    tracing::info!(artist_id = %artist_id, approval = approval.as_str(), admin_id = %user.id, "artist approval changed");

    let (kind, message) = match approval {
        ApprovalStatus::Approved => ("artist_approved", "Your artist profile has been approved"),
        _ => ("artist_rejected", "Your artist profile was not approved"),
    };
    notify(state, &artist_id, kind, message);

    Ok(Json(serde_json::json!({"ok": true, "approval": approval.as_str()})))
}

// GET /api/admin/users
#[derive(Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<UsersQuery>,
) -> AppResult<Json<Vec<User>>> {
    user.require(Role::Admin)?;

    let role = query
        .role
        .as_deref()
        .map(|s| Role::parse(s).ok_or_else(|| AppError::Validation(format!("unknown role: {s}"))))
        .transpose()?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let users = {
        let db = state.db()?;
        queries::list_users(&db, role, limit)?
    };
    Ok(Json(users))
}

// POST /api/admin/categories
#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    user.require(Role::Admin)?;
    let name = category_name(&body.name)?;

    let category = Category {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        description: non_empty(body.description),
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db()?;
        if queries::category_name_taken(&db, &category.name, None)? {
            return Err(AppError::Conflict(format!("category {} already exists", category.name)));
        }
        queries::create_category(&db, &category)?;
    }

    tracing::info!(category_id = %category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

// PUT /api/admin/categories/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> AppResult<Json<Category>> {
    user.require(Role::Admin)?;
    let name = category_name(&body.name)?;
    let description = non_empty(body.description);

    let updated = {
        let db = state.db()?;
        if queries::get_category(&db, &id)?.is_none() {
            return Err(AppError::NotFound("category".to_string()));
        }
        if queries::category_name_taken(&db, &name, Some(&id))? {
            return Err(AppError::Conflict(format!("category {name} already exists")));
        }
        queries::update_category(&db, &id, &name, description.as_deref())?;
        queries::get_category(&db, &id)?
    };

    updated
        .map(Json)
        .ok_or_else(|| AppError::NotFound("category".to_string()))
}

// DELETE /api/admin/categories/:id
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    user.require(Role::Admin)?;

    {
        let db = state.db()?;
        if queries::get_category(&db, &id)?.is_none() {
            return Err(AppError::NotFound("category".to_string()));
        }
        if queries::category_in_use(&db, &id)? {
            return Err(AppError::Conflict(
                "category is still referenced by artists or bookings".to_string(),
            ));
        }
        queries::delete_category(&db, &id)?;
    }

    tracing::info!(category_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn category_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    Ok(name.to_string())
}

// GET /api/admin/stats
#[derive(Serialize)]
pub struct StatsResponse {
    users_by_role: BTreeMap<String, i64>,
    bookings_by_status: BTreeMap<String, i64>,
    /// Cents, completed payments only.
    revenue: i64,
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<StatsResponse>> {
    user.require(Role::Admin)?;

    let db = state.db()?;
    Ok(Json(StatsResponse {
        users_by_role: queries::count_users_by_role(&db)?.into_iter().collect(),
        bookings_by_status: queries::count_bookings_by_status(&db)?.into_iter().collect(),
        revenue: queries::total_revenue(&db)?,
    }))
}
