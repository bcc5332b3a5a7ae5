use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};

use crate::db::queries;
use crate::errors::{AppError, AppResult, ConflictDetail};
use crate::middleware::auth::AuthUser;
use crate::models::{Booking, BookingStatus, PaymentStatus, Role, UserId};
use crate::services::availability::{check_availability, AvailabilityCheck, TimeRange};
use crate::services::payment::price_for;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: UserId,
    pub artist_id: UserId,
    pub booking_date: NaiveDate,
    pub slot: TimeRange,
    pub location: Option<String>,
    pub special_requests: Option<String>,
}

/// Creates a booking if the artist is free.
///
/// The artist's bookings for the day are read, checked and the new row
/// written inside one immediate transaction, so no other writer can slip an
/// overlapping booking in between.
pub fn create_booking(
    conn: &mut Connection,
    request: NewBooking,
    auto_confirm: bool,
    today: NaiveDate,
) -> AppResult<Booking> {
    if request.booking_date < today {
        return Err(AppError::Validation("booking date is in the past".to_string()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let artist = queries::get_user_by_id(&tx, &request.artist_id)?
        .filter(|u| u.role == Role::Artist)
        .ok_or_else(|| AppError::NotFound("artist".to_string()))?;
    if !artist.is_approved_artist() {
        return Err(AppError::Unprocessable("artist is not approved for bookings".to_string()));
    }
    let profile = artist.artist.as_ref();

    if let Some(schedule) = profile.and_then(|p| p.schedule.as_ref()) {
        if !schedule.is_empty() && !schedule.fits(request.booking_date, &request.slot) {
            return Err(AppError::Conflict(format!(
                "requested time is outside the artist's working hours ({})",
                schedule.to_human_readable()
            )));
        }
    }

    let existing = queries::get_artist_bookings_on(&tx, &request.artist_id, request.booking_date)?;
    if let AvailabilityCheck::Unavailable { conflict } =
        check_availability(&request.artist_id, request.booking_date, &request.slot, &existing)
    {
        tracing::info!(
            artist_id = %request.artist_id,
            date = %request.booking_date,
            conflict_id = %conflict.id,
            "booking rejected: slot taken"
        );
        return Err(AppError::BookingConflict(ConflictDetail {
            booking_id: conflict.id.clone(),
            start_time: conflict.start_time.to_string(),
            end_time: conflict.end_time.to_string(),
        }));
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: request.customer_id,
        artist_id: request.artist_id,
        category_id: profile.and_then(|p| p.category_id.clone()),
        booking_date: request.booking_date,
        start_time: request.slot.start,
        end_time: request.slot.end,
        status: if auto_confirm {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        },
        payment_status: PaymentStatus::Unpaid,
        total_amount: price_for(
            profile.map(|p| p.hourly_rate).unwrap_or(0),
            request.slot.duration_minutes(),
        )?,
        location: request.location,
        special_requests: request.special_requests,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(&tx, &booking).map_err(|e| {
        if is_overlap_violation(&e) {
            AppError::Conflict("artist is not available at the requested time".to_string())
        } else {
            AppError::Database(e)
        }
    })?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        artist_id = %booking.artist_id,
        date = %booking.booking_date,
        start = %booking.start_time,
        end = %booking.end_time,
        status = booking.status.as_str(),
        "booking created"
    );
    Ok(booking)
}

fn is_overlap_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == ErrorCode::ConstraintViolation && msg.contains("overlaps")
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingAction {
    Accept,
    Reject { reason: Option<String> },
    Complete,
    Cancel,
}

impl BookingAction {
    pub fn target(&self) -> BookingStatus {
        match self {
            BookingAction::Accept => BookingStatus::Accepted,
            BookingAction::Reject { .. } => BookingStatus::Rejected,
            BookingAction::Complete => BookingStatus::Completed,
            BookingAction::Cancel => BookingStatus::Cancelled,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            BookingAction::Accept => "accept",
            BookingAction::Reject { .. } => "reject",
            BookingAction::Complete => "complete",
            BookingAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug)]
pub struct ActionOutcome {
    pub booking: Booking,
    /// False when a cancel was repeated on a cancelled booking that still
    /// awaits its refund.
    pub changed: bool,
}

/// Moves a booking through its lifecycle and returns it in the new state.
///
/// Accept, reject and complete belong to the booked artist. Either party or
/// an admin may cancel. Cancelling a cancelled booking that is still paid
/// succeeds without a status change so the refund can be retried.
pub fn apply_action(
    conn: &mut Connection,
    booking_id: &str,
    actor: &AuthUser,
    action: BookingAction,
) -> AppResult<ActionOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    let allowed = match action {
        BookingAction::Cancel => actor.role == Role::Admin || booking.involves(&actor.id),
        _ => booking.artist_id == actor.id,
    };
    if !allowed {
        return Err(AppError::Forbidden(format!(
            "not allowed to {} this booking",
            action.verb()
        )));
    }

    if action == BookingAction::Cancel
        && booking.status == BookingStatus::Cancelled
        && booking.payment_status == PaymentStatus::Paid
    {
        tracing::info!(booking_id = %booking_id, actor = %actor.id, "cancel repeated to retry refund");
        return Ok(ActionOutcome {
            booking,
            changed: false,
        });
    }

    let target = action.target();
    if !booking.status.can_transition_to(target) {
        return Err(AppError::Conflict(format!(
            "cannot {} a {} booking",
            action.verb(),
            booking.status.as_str()
        )));
    }

    let reason = match &action {
        BookingAction::Reject { reason } => reason.as_deref(),
        _ => None,
    };
    queries::update_booking_status(&tx, booking_id, target, reason)?;
    let updated = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking_id,
        actor = %actor.id,
        from = booking.status.as_str(),
        to = target.as_str(),
        "booking status changed"
    );
    Ok(ActionOutcome {
        booking: updated,
        changed: true,
    })
}
