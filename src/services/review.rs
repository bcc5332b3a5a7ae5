use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{BookingStatus, Review, UserId};

pub fn create_review(
    conn: &mut Connection,
    customer_id: &UserId,
    booking_id: &str,
    rating: i64,
    comment: Option<String>,
) -> AppResult<Review> {
    let rating = u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::Validation("rating must be between 1 and 5".to_string()))?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    if &booking.customer_id != customer_id {
        return Err(AppError::Forbidden("only the booking's customer can review it".to_string()));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::Conflict("only completed bookings can be reviewed".to_string()));
    }
    if queries::review_exists_for_booking(&tx, booking_id)? {
        return Err(AppError::Conflict("booking already reviewed".to_string()));
    }

    let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking_id.to_string(),
        customer_id: customer_id.clone(),
        artist_id: booking.artist_id.clone(),
        rating,
        comment: comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        created_at: Utc::now().naive_utc(),
    };
    queries::create_review(&tx, &review)?;
    queries::refresh_artist_rating(&tx, &review.artist_id)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking_id, artist_id = %review.artist_id, rating, "review created");
    Ok(review)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::middleware::auth::AuthUser;
    use crate::models::{ApprovalStatus, ArtistProfile, Role, User};
    use crate::services::availability::TimeRange;
    use crate::services::booking::{self, BookingAction, NewBooking};

    fn setup() -> (Connection, Vec<String>) {
        let mut conn = db::init_db(":memory:").unwrap();
        for (id, role) in [("cust", Role::Customer), ("artist", Role::Artist)] {
            let artist = (role == Role::Artist).then(|| ArtistProfile {
                category_id: None,
                bio: String::new(),
                skills: vec![],
                hourly_rate: 1000,
                approval: ApprovalStatus::Approved,
                schedule: None,
                rating: 0.0,
                review_count: 0,
            });
            let user = User {
                id: UserId::new(id),
                name: id.to_string(),
                email: format!("{id}@example.com"),
                password_hash: "x".to_string(),
                role,
                phone: None,
                artist,
                created_at: Utc::now().naive_utc(),
            };
            queries::create_user(&conn, &user).unwrap();
        }

        let today = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let artist = AuthUser {
            id: UserId::new("artist"),
            role: Role::Artist,
        };
        let mut ids = vec![];
        for (start, end) in [("09:00", "10:00"), ("10:00", "11:00")] {
            let created = booking::create_booking(
                &mut conn,
                NewBooking {
                    customer_id: UserId::new("cust"),
                    artist_id: UserId::new("artist"),
                    booking_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                    slot: TimeRange::parse(start, end).unwrap(),
                    location: None,
                    special_requests: None,
                },
                true,
                today,
            )
            .unwrap();
            ids.push(created.id);
        }
        booking::apply_action(&mut conn, &ids[0], &artist, BookingAction::Complete).unwrap();
        (conn, ids)
    }

    #[test]
    fn test_review_updates_artist_rating() {
        let (mut conn, ids) = setup();
        create_review(&mut conn, &UserId::new("cust"), &ids[0], 4, Some("  lovely  ".to_string())).unwrap();

        let artist = queries::get_user_by_id(&conn, &UserId::new("artist")).unwrap().unwrap();
        let profile = artist.artist.unwrap();
        assert_eq!(profile.review_count, 1);
        assert!((profile.rating - 4.0).abs() < f64::EPSILON);

        let reviews = queries::list_reviews_for_artist(&conn, &UserId::new("artist")).unwrap();
        assert_eq!(reviews[0].comment.as_deref(), Some("lovely"));
    }

    #[test]
    fn test_review_rules() {
        let (mut conn, ids) = setup();
        let cust = UserId::new("cust");

        for rating in [0, 6, -1, 256, i64::MAX] {
            assert!(matches!(
                create_review(&mut conn, &cust, &ids[0], rating, None),
                Err(AppError::Validation(_))
            ));
        }
        assert!(matches!(
            create_review(&mut conn, &UserId::new("artist"), &ids[0], 5, None),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            create_review(&mut conn, &cust, &ids[1], 5, None),
            Err(AppError::Conflict(_))
        ));
        create_review(&mut conn, &cust, &ids[0], 5, None).unwrap();
        assert!(matches!(
            create_review(&mut conn, &cust, &ids[0], 5, None),
            Err(AppError::Conflict(_))
        ));
    }
}
