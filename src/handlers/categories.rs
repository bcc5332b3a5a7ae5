use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::db::queries::{self, ArtistFilter};
use crate::errors::{AppError, AppResult};
use crate::handlers::artists::{to_artist_responses, ArtistResponse};
use crate::models::{ApprovalStatus, Category};
use crate::state::AppState;

// GET /api/categories
pub async fn list_categories(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Category>>> {
    let categories = {
        let db = state.db()?;
        queries::list_categories(&db)?
    };
    Ok(Json(categories))
}

// GET /api/categories/:id
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Category>> {
    let category = {
        let db = state.db()?;
        queries::get_category(&db, &id)?
    };
    category
        .map(Json)
        .ok_or_else(|| AppError::NotFound("category".to_string()))
}

// GET /api/categories/:id/artists
pub async fn list_category_artists(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<ArtistResponse>>> {
    let artists = {
        let db = state.db()?;
        if queries::get_category(&db, &id)?.is_none() {
            return Err(AppError::NotFound("category".to_string()));
        }
        let filter = ArtistFilter {
            approval: Some(ApprovalStatus::Approved),
            category_id: Some(id),
            ..Default::default()
        };
        queries::list_artists(&db, &filter)?
    };
    Ok(Json(to_artist_responses(artists)))
}
