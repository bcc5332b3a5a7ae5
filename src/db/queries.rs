use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    ApprovalStatus, ArtistProfile, Booking, BookingStatus, Category, Notification, Payment,
    PaymentMethod, PaymentRecordStatus, PaymentStatus, Review, Role, User, UserId, WeeklySchedule,
};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

pub fn now_string() -> String {
    Utc::now().naive_utc().format(DATETIME_FMT).to_string()
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).with_context(|| format!("invalid stored timestamp: {s}"))
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    parse: fn(&rusqlite::Row) -> anyhow::Result<T>,
) -> anyhow::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse(row)))?;

    let mut items = vec![];
    for row in rows {
        items.push(row??);
    }
    Ok(items)
}

// ── Users ──

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, category_id, bio, skills, \
                            hourly_rate, approval, schedule, rating, review_count, created_at";

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    let (category_id, bio, skills, hourly_rate, approval, schedule) = match &user.artist {
        Some(a) => (
            a.category_id.clone(),
            a.bio.clone(),
            serde_json::to_string(&a.skills)?,
            a.hourly_rate,
            Some(a.approval.as_str()),
            a.schedule.as_ref().map(serde_json::to_string).transpose()?,
        ),
        None => (None, String::new(), "[]".to_string(), 0, None, None),
    };

    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, phone, category_id, bio, skills, hourly_rate, approval, schedule, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.phone,
            category_id,
            bio,
            skills,
            hourly_rate,
            approval,
            schedule,
            user.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &UserId) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user = conn
        .query_row(&sql, params![id], |row| Ok(parse_user_row(row)))
        .optional()?;
    user.transpose()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let user = conn
        .query_row(&sql, params![email.trim().to_lowercase()], |row| {
            Ok(parse_user_row(row))
        })
        .optional()?;
    user.transpose()
}

pub fn list_users(conn: &Connection, role: Option<Role>, limit: i64) -> anyhow::Result<Vec<User>> {
    match role {
        Some(role) => query_all(
            conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at DESC LIMIT ?2"),
            &[&role.as_str(), &limit],
            parse_user_row,
        ),
        None => query_all(
            conn,
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT ?1"),
            &[&limit],
            parse_user_row,
        ),
    }
}

#[derive(Debug, Default)]
pub struct ArtistFilter {
    pub approval: Option<ApprovalStatus>,
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub min_rating: Option<f64>,
}

pub fn list_artists(conn: &Connection, filter: &ArtistFilter) -> anyhow::Result<Vec<User>> {
    let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = 'artist'");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(approval) = filter.approval {
        params_vec.push(Box::new(approval.as_str()));
        sql.push_str(&format!(" AND approval = ?{}", params_vec.len()));
    }
    if let Some(category_id) = &filter.category_id {
        params_vec.push(Box::new(category_id.clone()));
        sql.push_str(&format!(" AND category_id = ?{}", params_vec.len()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params_vec.push(Box::new(format!("%{}%", search.to_lowercase())));
        let n = params_vec.len();
        sql.push_str(&format!(
            " AND (LOWER(name) LIKE ?{n} OR LOWER(bio) LIKE ?{n} OR LOWER(skills) LIKE ?{n})"
        ));
    }
    if let Some(min_rating) = filter.min_rating {
        params_vec.push(Box::new(min_rating));
        sql.push_str(&format!(" AND rating >= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY rating DESC, name ASC");

    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    query_all(conn, &sql, &params_refs, parse_user_row)
}

pub fn update_artist_profile(
    conn: &Connection,
    id: &UserId,
    profile: &ArtistProfile,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET category_id = ?1, bio = ?2, skills = ?3, hourly_rate = ?4, schedule = ?5
         WHERE id = ?6 AND role = 'artist'",
        params![
            profile.category_id,
            profile.bio,
            serde_json::to_string(&profile.skills)?,
            profile.hourly_rate,
            profile.schedule.as_ref().map(serde_json::to_string).transpose()?,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_artist_approval(
    conn: &Connection,
    id: &UserId,
    approval: ApprovalStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET approval = ?1 WHERE id = ?2 AND role = 'artist'",
        params![approval.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn refresh_artist_rating(conn: &Connection, artist_id: &UserId) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET
           rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE artist_id = ?1), 0),
           review_count = (SELECT COUNT(*) FROM reviews WHERE artist_id = ?1)
         WHERE id = ?1",
        params![artist_id],
    )?;
    Ok(())
}

pub fn count_users_by_role(conn: &Connection) -> anyhow::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role_str: String = row.get(4)?;
    let role = Role::parse(&role_str).with_context(|| format!("unknown role: {role_str}"))?;
    let created_at_str: String = row.get(14)?;

    let artist = if role == Role::Artist {
        let skills_json: String = row.get(8)?;
        let approval_str: Option<String> = row.get(10)?;
        let schedule_json: Option<String> = row.get(11)?;
        Some(ArtistProfile {
            category_id: row.get(6)?,
            bio: row.get(7)?,
            skills: serde_json::from_str(&skills_json).unwrap_or_default(),
            hourly_rate: row.get(9)?,
            approval: approval_str
                .as_deref()
                .and_then(ApprovalStatus::parse)
                .unwrap_or(ApprovalStatus::Pending),
            schedule: schedule_json
                .as_deref()
                .map(WeeklySchedule::from_json)
                .transpose()?,
            rating: row.get(12)?,
            review_count: row.get(13)?,
        })
    } else {
        None
    };

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role,
        phone: row.get(5)?,
        artist,
        created_at: parse_datetime(&created_at_str)?,
    })
}

// ── Categories ──

pub fn create_category(conn: &Connection, category: &Category) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO categories (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            category.id,
            category.name,
            category.description,
            category.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_category(conn: &Connection, id: &str) -> anyhow::Result<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, description, created_at FROM categories WHERE id = ?1",
            params![id],
            |row| Ok(parse_category_row(row)),
        )
        .optional()?;
    category.transpose()
}

pub fn list_categories(conn: &Connection) -> anyhow::Result<Vec<Category>> {
    query_all(
        conn,
        "SELECT id, name, description, created_at FROM categories ORDER BY name COLLATE NOCASE",
        &[],
        parse_category_row,
    )
}

pub fn category_name_taken(conn: &Connection, name: &str, except_id: Option<&str>) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE name = ?1 COLLATE NOCASE AND id != COALESCE(?2, '')",
        params![name.trim(), except_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_category(
    conn: &Connection,
    id: &str,
    name: &str,
    description: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3",
        params![name, description, id],
    )?;
    Ok(count > 0)
}

pub fn category_in_use(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM users WHERE category_id = ?1)
              + (SELECT COUNT(*) FROM bookings WHERE category_id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn delete_category(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_category_row(row: &rusqlite::Row) -> anyhow::Result<Category> {
    let created_at_str: String = row.get(3)?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, customer_id, artist_id, category_id, booking_date, start_time, end_time, \
                               status, payment_status, total_amount, location, special_requests, \
                               rejection_reason, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, artist_id, category_id, booking_date, start_time, end_time, status, payment_status, total_amount, location, special_requests, rejection_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.customer_id,
            booking.artist_id,
            booking.category_id,
            booking.booking_date.format(DATE_FMT).to_string(),
            booking.start_time,
            booking.end_time,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.total_amount,
            booking.location,
            booking.special_requests,
            booking.rejection_reason,
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let booking = conn
        .query_row(&sql, params![id], |row| Ok(parse_booking_row(row)))
        .optional()?;
    booking.transpose()
}

/// Every booking of `artist_id` on `date`, any status, in start-time order.
pub fn get_artist_bookings_on(
    conn: &Connection,
    artist_id: &UserId,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    query_all(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE artist_id = ?1 AND booking_date = ?2 ORDER BY start_time ASC"
        ),
        &[artist_id, &date.format(DATE_FMT).to_string()],
        parse_booking_row,
    )
}

#[derive(Debug, Default)]
pub struct BookingFilter {
    pub customer_id: Option<UserId>,
    pub artist_id: Option<UserId>,
    pub status: Option<BookingStatus>,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter, limit: i64) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1 = 1");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(customer_id) = &filter.customer_id {
        params_vec.push(Box::new(customer_id.clone()));
        sql.push_str(&format!(" AND customer_id = ?{}", params_vec.len()));
    }
    if let Some(artist_id) = &filter.artist_id {
        params_vec.push(Box::new(artist_id.clone()));
        sql.push_str(&format!(" AND artist_id = ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY booking_date DESC, start_time DESC LIMIT ?{}",
        params_vec.len()
    ));

    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    query_all(conn, &sql, &params_refs, parse_booking_row)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    rejection_reason: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, rejection_reason = COALESCE(?2, rejection_reason), updated_at = ?3
         WHERE id = ?4",
        params![status.as_str(), rejection_reason, now_string(), id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_payment_status(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![payment_status.as_str(), now_string(), id],
    )?;
    Ok(count > 0)
}

pub fn count_bookings_by_status(conn: &Connection) -> anyhow::Result<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let payment_status_str: String = row.get(8)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        artist_id: row.get(2)?,
        category_id: row.get(3)?,
        booking_date: NaiveDate::parse_from_str(&booking_date_str, DATE_FMT)
            .with_context(|| format!("invalid stored booking date: {booking_date_str}"))?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        payment_status: PaymentStatus::parse(&payment_status_str)
            .with_context(|| format!("unknown payment status: {payment_status_str}"))?,
        total_amount: row.get(9)?,
        location: row.get(10)?,
        special_requests: row.get(11)?,
        rejection_reason: row.get(12)?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

// ── Payments ──

const PAYMENT_COLUMNS: &str =
    "id, booking_id, customer_id, amount, method, status, transaction_id, created_at";

pub fn create_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, customer_id, amount, method, status, transaction_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            payment.id,
            payment.booking_id,
            payment.customer_id,
            payment.amount,
            payment.method.as_str(),
            payment.status.as_str(),
            payment.transaction_id,
            payment.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_completed_payment_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ?1 AND status = 'completed'
         ORDER BY created_at DESC LIMIT 1"
    );
    let payment = conn
        .query_row(&sql, params![booking_id], |row| Ok(parse_payment_row(row)))
        .optional()?;
    payment.transpose()
}

pub fn list_payments(conn: &Connection, customer_id: Option<&UserId>) -> anyhow::Result<Vec<Payment>> {
    match customer_id {
        Some(customer_id) => query_all(
            conn,
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE customer_id = ?1 ORDER BY created_at DESC"),
            &[customer_id],
            parse_payment_row,
        ),
        None => query_all(
            conn,
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC"),
            &[],
            parse_payment_row,
        ),
    }
}

pub fn mark_payment_refunded(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = 'refunded' WHERE id = ?1 AND status = 'completed'",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn total_revenue(conn: &Connection) -> anyhow::Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'completed'",
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let method_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(7)?;

    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        customer_id: row.get(2)?,
        amount: row.get(3)?,
        method: PaymentMethod::parse(&method_str)
            .with_context(|| format!("unknown payment method: {method_str}"))?,
        status: PaymentRecordStatus::parse(&status_str)
            .with_context(|| format!("unknown payment status: {status_str}"))?,
        transaction_id: row.get(6)?,
        created_at: parse_datetime(&created_at_str)?,
    })
}

// ── Reviews ──

pub fn create_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, booking_id, customer_id, artist_id, rating, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            review.id,
            review.booking_id,
            review.customer_id,
            review.artist_id,
            review.rating,
            review.comment,
            review.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn review_exists_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_reviews_for_artist(conn: &Connection, artist_id: &UserId) -> anyhow::Result<Vec<Review>> {
    query_all(
        conn,
        "SELECT id, booking_id, customer_id, artist_id, rating, comment, created_at
         FROM reviews WHERE artist_id = ?1 ORDER BY created_at DESC",
        &[artist_id],
        |row| {
            let created_at_str: String = row.get(6)?;
            Ok(Review {
                id: row.get(0)?,
                booking_id: row.get(1)?,
                customer_id: row.get(2)?,
                artist_id: row.get(3)?,
                rating: row.get(4)?,
                comment: row.get(5)?,
                created_at: parse_datetime(&created_at_str)?,
            })
        },
    )
}

// ── Notifications ──

pub fn insert_notification(
    conn: &Connection,
    user_id: &UserId,
    kind: &str,
    message: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, kind, message) VALUES (?1, ?2, ?3)",
        params![user_id, kind, message],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_notifications(
    conn: &Connection,
    user_id: &UserId,
    limit: i64,
) -> anyhow::Result<Vec<Notification>> {
    query_all(
        conn,
        "SELECT id, user_id, kind, message, is_read, created_at
         FROM notifications WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        &[user_id, &limit],
        parse_notification_row,
    )
}

pub fn get_notifications_since(
    conn: &Connection,
    user_id: &UserId,
    since_id: i64,
) -> anyhow::Result<Vec<Notification>> {
    query_all(
        conn,
        "SELECT id, user_id, kind, message, is_read, created_at
         FROM notifications WHERE user_id = ?1 AND id > ?2 ORDER BY id ASC",
        &[user_id, &since_id],
        parse_notification_row,
    )
}

pub fn mark_notification_read(conn: &Connection, user_id: &UserId, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(count > 0)
}

pub fn mark_all_notifications_read(conn: &Connection, user_id: &UserId) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id],
    )?;
    Ok(count)
}

fn parse_notification_row(row: &rusqlite::Row) -> anyhow::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        message: row.get(3)?,
        is_read: row.get::<_, i32>(4)? != 0,
        created_at: row.get(5)?,
    })
}
