use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppResult;
use crate::handlers::bookings::load_visible_booking;
use crate::middleware::auth::AuthUser;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /api/bookings/:id/calendar.ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<String>,
) -> AppResult<Response> {
    let booking = load_visible_booking(&state, &user, &booking_id)?;

    let artist_name = {
        let db = state.db()?;
        queries::get_user_by_id(&db, &booking.artist_id)?
    }
    .map(|u| u.name)
    .filter(|n| !n.is_empty())
    .unwrap_or_else(|| "your artist".to_string());

    let ics = generate_ics(&booking, &artist_name);
    let disposition = format!("attachment; filename=\"booking-{}.ics\"", booking.id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics,
    )
        .into_response())
}
