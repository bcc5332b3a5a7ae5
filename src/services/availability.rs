//! Booking conflict detection.
//!
//! Everything here is pure: callers fetch candidate bookings, hand them in,
//! and decide what to do with the answer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{Booking, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("invalid time format: {0:?} (expected HH:MM)")]
    Format(String),
    #[error("time out of range: {0:?}")]
    Range(String),
    #[error("start time {start} must be before end time {end}")]
    EmptyRange { start: TimeOfDay, end: TimeOfDay },
    #[error("invalid date: {0:?} (expected YYYY-MM-DD)")]
    Date(String),
}

/// Wall-clock time as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        (hour <= 23 && minute <= 59).then(|| TimeOfDay(hour * 60 + minute))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| TimeParseError::Format(s.to_string()))?;

        let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
            return Err(TimeParseError::Format(s.to_string()));
        }

        let hour: u16 = h.parse().map_err(|_| TimeParseError::Format(s.to_string()))?;
        let minute: u16 = m.parse().map_err(|_| TimeParseError::Format(s.to_string()))?;
        TimeOfDay::from_hm(hour, minute).ok_or_else(|| TimeParseError::Range(s.to_string()))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl rusqlite::ToSql for TimeOfDay {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        Ok(rusqlite::types::ToSqlOutput::from(self.to_string()))
    }
}

impl rusqlite::types::FromSql for TimeOfDay {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
    }
}

/// A non-empty `[start, end)` range within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeRange {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Result<Self, TimeParseError> {
        if start >= end {
            return Err(TimeParseError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Self::new(start.trim().parse()?, end.trim().parse()?)
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end.minutes() - self.start.minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        has_time_overlap(self.start, self.end, other.start, other.end)
    }
}

/// Strict overlap of `[a_start, a_end)` and `[b_start, b_end)`.
/// Ranges that only touch at an endpoint do not overlap.
pub fn has_time_overlap(
    a_start: TimeOfDay,
    a_end: TimeOfDay,
    b_start: TimeOfDay,
    b_end: TimeOfDay,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Reduces `YYYY-MM-DD` or an RFC 3339 timestamp to its calendar date.
/// The date is taken as written; any offset is dropped, not applied.
pub fn parse_booking_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local().date());
    }
    s.get(..10)
        .filter(|_| s.as_bytes().get(10).is_some_and(|b| *b == b'T' || *b == b' '))
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| TimeParseError::Date(s.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AvailabilityCheck<'a> {
    Available,
    /// `conflict` is the first overlapping booking in input order, not
    /// necessarily the earliest one.
    Unavailable { conflict: &'a Booking },
}

impl<'a> AvailabilityCheck<'a> {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityCheck::Available)
    }

    pub fn conflict(&self) -> Option<&'a Booking> {
        match self {
            AvailabilityCheck::Available => None,
            AvailabilityCheck::Unavailable { conflict } => Some(conflict),
        }
    }
}

/// Checks `slot` on `date` against the artist's active bookings.
///
/// `existing` may be a superset: bookings of other artists, other dates and
/// inactive statuses are skipped here.
pub fn check_availability<'a>(
    artist_id: &UserId,
    date: NaiveDate,
    slot: &TimeRange,
    existing: &'a [Booking],
) -> AvailabilityCheck<'a> {
    existing
        .iter()
        .filter(|b| &b.artist_id == artist_id)
        .filter(|b| b.booking_date == date)
        .filter(|b| b.status.is_active())
        .find(|b| has_time_overlap(slot.start, slot.end, b.start_time, b.end_time))
        .map(|conflict| AvailabilityCheck::Unavailable { conflict })
        .unwrap_or(AvailabilityCheck::Available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, PaymentStatus};

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::parse(start, end).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        parse_booking_date(s).unwrap()
    }

    fn booking(id: &str, artist: &str, day: &str, start: &str, end: &str, status: BookingStatus) -> Booking {
        let now = chrono::Utc::now().naive_utc();
        Booking {
            id: id.to_string(),
            customer_id: UserId::new("customer-1"),
            artist_id: UserId::new(artist),
            category_id: None,
            booking_date: date(day),
            start_time: t(start),
            end_time: t(end),
            status,
            payment_status: PaymentStatus::Unpaid,
            total_amount: 0,
            location: None,
            special_requests: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(t("00:00").minutes(), 0);
        assert_eq!(t("09:05").minutes(), 545);
        assert_eq!(t("9:05").minutes(), 545);
        assert_eq!(t("23:59").minutes(), 1439);
        assert_eq!(t("17:30").to_string(), "17:30");
        assert_eq!(t("7:00").to_string(), "07:00");
    }

    #[test]
    fn test_parse_time_rejects_malformed() {
        for bad in ["", "0900", "9", "ab:cd", "09:5", "09:005", "24:00", "12:60", "-1:00", " 09:00", "09:00:00", "+9:00"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_range_requires_start_before_end() {
        assert!(TimeRange::parse("10:00", "10:00").is_err());
        assert!(TimeRange::parse("11:00", "10:00").is_err());
        assert_eq!(range("10:00", "11:30").duration_minutes(), 90);
    }

    #[test]
    fn test_parse_booking_date_strips_time() {
        assert_eq!(date("2024-05-01"), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(date("2024-05-01T23:30:00Z"), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(date("2024-05-01T23:30:00-05:00"), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(date("2024-05-01T08:00:00.000"), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(parse_booking_date("05/01/2024").is_err());
        assert!(parse_booking_date("2024-13-01").is_err());
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let ranges = [
            range("09:00", "10:00"),
            range("09:30", "10:30"),
            range("10:00", "11:00"),
            range("08:00", "12:00"),
            range("13:00", "14:00"),
        ];
        for a in &ranges {
            for b in &ranges {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_touching_ranges_do_not_overlap() {
        assert!(!range("09:00", "10:00").overlaps(&range("10:00", "11:00")));
        assert!(!range("10:00", "11:00").overlaps(&range("09:00", "10:00")));
    }

    #[test]
    fn test_containment_and_identity_overlap() {
        assert!(range("09:00", "12:00").overlaps(&range("10:00", "11:00")));
        assert!(range("09:00", "10:00").overlaps(&range("09:00", "10:00")));
        assert!(range("09:00", "10:01").overlaps(&range("10:00", "11:00")));
    }

    #[test]
    fn test_different_artists_never_conflict() {
        let existing = vec![booking("b", "artist-2", "2024-05-01", "09:00", "10:00", BookingStatus::Confirmed)];
        let result = check_availability(&UserId::new("artist-1"), date("2024-05-01"), &range("09:00", "10:00"), &existing);
        assert!(result.is_available());
    }

    #[test]
    fn test_different_dates_never_conflict() {
        let existing = vec![booking("b", "artist-1", "2024-05-02", "09:00", "10:00", BookingStatus::Confirmed)];
        let result = check_availability(&UserId::new("artist-1"), date("2024-05-01"), &range("09:00", "10:00"), &existing);
        assert!(result.is_available());
    }

    #[test]
    fn test_inactive_statuses_never_block() {
        for status in [BookingStatus::Rejected, BookingStatus::Completed, BookingStatus::Cancelled] {
            let existing = vec![booking("b", "artist-1", "2024-05-01", "09:00", "10:00", status)];
            let result = check_availability(&UserId::new("artist-1"), date("2024-05-01"), &range("09:00", "10:00"), &existing);
            assert!(result.is_available(), "{status:?} blocked the slot");
        }
    }

    #[test]
    fn test_active_statuses_block() {
        for status in [BookingStatus::Pending, BookingStatus::Accepted, BookingStatus::Confirmed] {
            let existing = vec![booking("b", "artist-1", "2024-05-01", "09:00", "10:00", status)];
            let result = check_availability(&UserId::new("artist-1"), date("2024-05-01"), &range("09:30", "10:30"), &existing);
            assert!(!result.is_available(), "{status:?} did not block the slot");
        }
    }

    #[test]
    fn test_confirmed_afternoon_scenario() {
        let existing = vec![booking("x-1", "artist-x", "2024-05-01", "14:00", "16:00", BookingStatus::Confirmed)];
        let artist = UserId::new("artist-x");

        let result = check_availability(&artist, date("2024-05-01"), &range("15:00", "17:00"), &existing);
        assert!(!result.is_available());
        assert_eq!(result.conflict().map(|b| b.id.as_str()), Some("x-1"));

        let result = check_availability(&artist, date("2024-05-01"), &range("16:00", "18:00"), &existing);
        assert!(result.is_available());
        assert!(result.conflict().is_none());
    }

    #[test]
    fn test_first_conflict_in_input_order() {
        let existing = vec![
            booking("later", "a", "2024-05-01", "11:00", "12:00", BookingStatus::Pending),
            booking("earlier", "a", "2024-05-01", "09:00", "10:00", BookingStatus::Pending),
        ];
        let result = check_availability(&UserId::new("a"), date("2024-05-01"), &range("09:00", "12:00"), &existing);
        assert_eq!(result.conflict().map(|b| b.id.as_str()), Some("later"));
    }

    #[test]
    fn test_checker_is_idempotent() {
        let existing = vec![booking("b", "a", "2024-05-01", "09:00", "10:00", BookingStatus::Accepted)];
        let artist = UserId::new("a");
        let first = check_availability(&artist, date("2024-05-01"), &range("09:30", "09:45"), &existing);
        let second = check_availability(&artist, date("2024-05-01"), &range("09:30", "09:45"), &existing);
        assert_eq!(first, second);
    }

    #[test]
    fn test_identifier_normalization() {
        let existing = vec![booking("b", " artist-1 ", "2024-05-01", "09:00", "10:00", BookingStatus::Confirmed)];
        let result = check_availability(&UserId::new("artist-1"), date("2024-05-01"), &range("09:00", "10:00"), &existing);
        assert!(!result.is_available());
    }
}
