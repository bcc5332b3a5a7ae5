use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::TransactionBehavior;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::models::{Booking, BookingStatus, Payment, PaymentMethod, PaymentRecordStatus, PaymentStatus};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ChargeRequest<'a> {
    pub booking_id: &'a str,
    /// Cents.
    pub amount: i64,
    pub method: PaymentMethod,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the customer and returns the gateway transaction id.
    async fn charge(&self, request: ChargeRequest<'_>) -> anyhow::Result<String>;

    async fn refund(&self, transaction_id: &str, amount: i64) -> anyhow::Result<()>;
}

/// Accepts every charge without contacting a provider.
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: ChargeRequest<'_>) -> anyhow::Result<String> {
        anyhow::ensure!(request.amount >= 0, "negative charge amount");
        let transaction_id = format!("txn_{}", uuid::Uuid::new_v4().simple());
        tracing::info!(
            booking_id = %request.booking_id,
            amount = request.amount,
            method = request.method.as_str(),
            transaction_id = %transaction_id,
            "simulated charge"
        );
        Ok(transaction_id)
    }

    async fn refund(&self, transaction_id: &str, amount: i64) -> anyhow::Result<()> {
        tracing::info!(transaction_id = %transaction_id, amount, "simulated refund");
        Ok(())
    }
}

/// Upper bound on an artist's hourly rate, in cents.
pub const MAX_HOURLY_RATE: i64 = 100_000_000;

pub fn validate_hourly_rate(rate: i64) -> AppResult<i64> {
    if !(0..=MAX_HOURLY_RATE).contains(&rate) {
        return Err(AppError::Validation(format!(
            "hourly_rate must be between 0 and {MAX_HOURLY_RATE}"
        )));
    }
    Ok(rate)
}

/// Price of `minutes` at `hourly_rate` cents per hour, rounded to the nearest cent.
pub fn price_for(hourly_rate: i64, minutes: u16) -> AppResult<i64> {
    hourly_rate
        .checked_mul(i64::from(minutes))
        .and_then(|total| total.checked_add(30))
        .map(|total| total / 60)
        .ok_or_else(|| AppError::Unprocessable("booking price is out of range".to_string()))
}

fn ensure_payable(booking: &Booking, customer: &AuthUser) -> AppResult<()> {
    if booking.customer_id != customer.id {
        return Err(AppError::Forbidden("only the booking's customer can pay for it".to_string()));
    }
    if !matches!(booking.status, BookingStatus::Accepted | BookingStatus::Confirmed) {
        return Err(AppError::Conflict(format!(
            "cannot pay for a {} booking",
            booking.status.as_str()
        )));
    }
    if booking.payment_status != PaymentStatus::Unpaid {
        return Err(AppError::Conflict("booking is already paid".to_string()));
    }
    Ok(())
}

/// Charges the customer for a booking and records the payment.
///
/// The database lock is released while the gateway is called. The booking is
/// re-checked before recording; if it stopped being payable in the meantime
/// the charge is refunded and the request fails.
pub async fn pay_for_booking(
    state: &Arc<AppState>,
    customer: &AuthUser,
    booking_id: &str,
    method: PaymentMethod,
) -> AppResult<(Payment, Booking)> {
    let booking = {
        let db = state.db()?;
        queries::get_booking_by_id(&db, booking_id)?
    }
    .ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    ensure_payable(&booking, customer)?;

    let transaction_id = state
        .payments
        .charge(ChargeRequest {
            booking_id,
            amount: booking.total_amount,
            method,
        })
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    let recorded = record_payment(state, customer, booking_id, method, &transaction_id);
    if recorded.is_err() {
        if let Err(e) = state.payments.refund(&transaction_id, booking.total_amount).await {
            tracing::error!(error = %e, transaction_id = %transaction_id, "failed to refund unrecorded charge");
        }
    }
    recorded
}

fn record_payment(
    state: &Arc<AppState>,
    customer: &AuthUser,
    booking_id: &str,
    method: PaymentMethod,
    transaction_id: &str,
) -> AppResult<(Payment, Booking)> {
    let mut db = state.db()?;
    let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    ensure_payable(&booking, customer)?;

    let payment = Payment {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        customer_id: customer.id.clone(),
        amount: booking.total_amount,
        method,
        status: PaymentRecordStatus::Completed,
        transaction_id: transaction_id.to_string(),
        created_at: Utc::now().naive_utc(),
    };
    queries::create_payment(&tx, &payment)?;
    queries::update_booking_payment_status(&tx, booking_id, PaymentStatus::Paid)?;
    if booking.status == BookingStatus::Accepted {
        queries::update_booking_status(&tx, booking_id, BookingStatus::Confirmed, None)?;
    }
    let updated = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking_id,
        payment_id = %payment.id,
        amount = payment.amount,
        "payment recorded"
    );
    Ok((payment, updated))
}

/// Refunds the completed payment of a cancelled booking, if there is one.
pub async fn refund_booking(state: &Arc<AppState>, booking: &Booking) -> AppResult<()> {
    if booking.payment_status != PaymentStatus::Paid {
        return Ok(());
    }

    let payment = {
        let db = state.db()?;
        queries::get_completed_payment_for_booking(&db, &booking.id)?
    };
    let Some(payment) = payment else {
        tracing::warn!(booking_id = %booking.id, "paid booking has no completed payment");
        return Ok(());
    };

    state
        .payments
        .refund(&payment.transaction_id, payment.amount)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    let db = state.db()?;
    queries::mark_payment_refunded(&db, &payment.id)?;
    queries::update_booking_payment_status(&db, &booking.id, PaymentStatus::Refunded)?;
    tracing::info!(booking_id = %booking.id, payment_id = %payment.id, "payment refunded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_for() {
        assert_eq!(price_for(6000, 60).unwrap(), 6000);
        assert_eq!(price_for(6000, 90).unwrap(), 9000);
        assert_eq!(price_for(1000, 1).unwrap(), 17);
        assert_eq!(price_for(0, 120).unwrap(), 0);
        assert_eq!(price_for(MAX_HOURLY_RATE, 1439).unwrap(), 2_398_333_333);
    }

    #[test]
    fn test_price_for_overflow_is_an_error() {
        let err = price_for(i64::MAX, 60).unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));
        assert!(price_for(i64::MAX / 60, 60).is_err());
    }

    #[test]
    fn test_validate_hourly_rate() {
        assert_eq!(validate_hourly_rate(0).unwrap(), 0);
        assert_eq!(validate_hourly_rate(MAX_HOURLY_RATE).unwrap(), MAX_HOURLY_RATE);
        assert!(matches!(validate_hourly_rate(-1), Err(AppError::Validation(_))));
        assert!(matches!(validate_hourly_rate(MAX_HOURLY_RATE + 1), Err(AppError::Validation(_))));
        assert!(matches!(validate_hourly_rate(i64::MAX), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_simulated_charge_returns_transaction_id() {
        let gateway = SimulatedGateway;
        let txn = gateway
            .charge(ChargeRequest {
                booking_id: "bk-1",
                amount: 5000,
                method: PaymentMethod::Card,
            })
            .await
            .unwrap();
        assert!(txn.starts_with("txn_"));
        gateway.refund(&txn, 5000).await.unwrap();
    }
}
