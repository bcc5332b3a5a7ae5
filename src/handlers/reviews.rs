use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};
use crate::handlers::bookings::non_empty;
use crate::middleware::auth::AuthUser;
use crate::models::{Review, Role};
use crate::services::notifications::notify;
use crate::services::review;
use crate::state::AppState;

// POST /api/reviews
#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: String,
    pub rating: f64,
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    user.require(Role::Customer)?;

    let created = {
        let mut db = state.db()?;
        review::create_review(
            &mut db,
            &user.id,
            body.booking_id.trim(),
            whole_rating(body.rating)?,
            non_empty(body.comment),
        )?
    };

    notify(
        &state,
        &created.artist_id,
        "review_received",
        &format!("You received a {}-star review", created.rating),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// JSON numbers arrive as floats; only whole ratings are accepted.
fn whole_rating(rating: f64) -> AppResult<i64> {
    if !rating.is_finite() || rating.fract() != 0.0 {
        return Err(AppError::Validation("rating must be a whole number".to_string()));
    }
    // Saturates outside the i64 range; the range check happens downstream.
    Ok(rating as i64)
}
