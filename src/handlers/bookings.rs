use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::queries::{self, BookingFilter};
use crate::errors::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::{Booking, BookingStatus, Role, UserId};
use crate::services::availability::{parse_booking_date, TimeRange};
use crate::services::booking::{self, BookingAction, NewBooking};
use crate::services::notifications::notify;
use crate::services::payment;
use crate::state::AppState;

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub artist_id: String,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub special_requests: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    user.require(Role::Customer)?;

    let request = NewBooking {
        customer_id: user.id.clone(),
        artist_id: UserId::new(&body.artist_id),
        booking_date: parse_booking_date(&body.booking_date)?,
        slot: TimeRange::parse(&body.start_time, &body.end_time)?,
        location: non_empty(body.location),
        special_requests: non_empty(body.special_requests),
    };
    let today = chrono::Utc::now().date_naive();

    let created = {
        let mut db = state.db()?;
        booking::create_booking(&mut db, request, state.config.auto_confirm_bookings, today)?
    };

    notify(
        &state,
        &created.artist_id,
        "booking_created",
        &format!(
            "New booking on {} from {} to {}",
            created.booking_date, created.start_time, created.end_time
        ),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<BookingsQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown booking status: {s}")))
        })
        .transpose()?;

    let mut filter = BookingFilter {
        status,
        ..Default::default()
    };
    match user.role {
        Role::Customer => filter.customer_id = Some(user.id.clone()),
        Role::Artist => filter.artist_id = Some(user.id.clone()),
        Role::Admin => {}
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let bookings = {
        let db = state.db()?;
        queries::list_bookings(&db, &filter, limit)?
    };

    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    Ok(Json(load_visible_booking(&state, &user, &id)?))
}

pub(crate) fn load_visible_booking(state: &AppState, user: &AuthUser, id: &str) -> AppResult<Booking> {
    let booking = {
        let db = state.db()?;
        queries::get_booking_by_id(&db, id)?
    }
    .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    if !user.is_admin() && !booking.involves(&user.id) {
        // Same answer as a missing booking.
        return Err(AppError::NotFound("booking".to_string()));
    }
    Ok(booking)
}

// POST /api/bookings/:id/accept
pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    run_action(&state, &user, &id, BookingAction::Accept).await
}

// POST /api/bookings/:id/reject
#[derive(Deserialize, Default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> AppResult<Json<Booking>> {
    let reason = body.and_then(|Json(b)| non_empty(b.reason));
    run_action(&state, &user, &id, BookingAction::Reject { reason }).await
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    run_action(&state, &user, &id, BookingAction::Complete).await
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    run_action(&state, &user, &id, BookingAction::Cancel).await
}

async fn run_action(
    state: &Arc<AppState>,
    user: &AuthUser,
    id: &str,
    action: BookingAction,
) -> AppResult<Json<Booking>> {
    let kind = match action {
        BookingAction::Accept => "booking_accepted",
        BookingAction::Reject { .. } => "booking_rejected",
        BookingAction::Complete => "booking_completed",
        BookingAction::Cancel => "booking_cancelled",
    };

    let outcome = {
        let mut db = state.db()?;
        booking::apply_action(&mut db, id, user, action)?
    };
    let mut updated = outcome.booking;

    if outcome.changed {
        let recipient = if user.id == updated.artist_id {
            &updated.customer_id
        } else {
            &updated.artist_id
        };
        notify(
            state,
            recipient,
            kind,
            &format!(
                "Booking on {} at {} is now {}",
                updated.booking_date,
                updated.start_time,
                updated.status.as_str()
            ),
        );
    }

    // A failed refund is retried by cancelling again.
    if updated.status == BookingStatus::Cancelled {
        payment::refund_booking(state, &updated).await?;
        let refreshed = {
            let db = state.db()?;
            queries::get_booking_by_id(&db, id)?
        };
        if let Some(refreshed) = refreshed {
            updated = refreshed;
        }
    }

    Ok(Json(updated))
}

pub(crate) fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
