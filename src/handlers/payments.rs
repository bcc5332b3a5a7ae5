use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::{Booking, Payment, PaymentMethod, Role};
use crate::services::notifications::notify;
use crate::services::payment::pay_for_booking;
use crate::state::AppState;

// POST /api/payments
#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: String,
    pub method: String,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    payment: Payment,
    booking: Booking,
}

pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<PaymentResponse>)> {
    user.require(Role::Customer)?;
    let method = PaymentMethod::parse(&body.method).ok_or_else(|| {
        AppError::Validation("method must be card, paypal or bank_transfer".to_string())
    })?;

    let (payment, booking) = pay_for_booking(&state, &user, body.booking_id.trim(), method).await?;

    notify(
        &state,
        &booking.artist_id,
        "payment_received",
        &format!("Payment received for booking on {}", booking.booking_date),
    );

    Ok((StatusCode::CREATED, Json(PaymentResponse { payment, booking })))
}

// GET /api/payments
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<Vec<Payment>>> {
    let scope = match user.role {
        Role::Admin => None,
        Role::Customer => Some(&user.id),
        Role::Artist => return Err(AppError::Forbidden("customer access required".to_string())),
    };
    let payments = {
        let db = state.db()?;
        queries::list_payments(&db, scope)?
    };
    Ok(Json(payments))
}
