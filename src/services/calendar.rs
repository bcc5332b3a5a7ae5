use crate::models::Booking;

pub fn generate_ics(booking: &Booking, artist_name: &str) -> String {
    let day = booking.booking_date.format("%Y%m%d");
    let dtstart = format!(
        "{day}T{:02}{:02}00",
        booking.start_time.hour(),
        booking.start_time.minute()
    );
    let dtend = format!(
        "{day}T{:02}{:02}00",
        booking.end_time.hour(),
        booking.end_time.minute()
    );
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@artzyra", booking.id);

    let summary = format!("Booking with {}", escape_text(artist_name));
    let description = booking
        .special_requests
        .as_deref()
        .map(escape_text)
        .unwrap_or_else(|| "No special requests".to_string());
    let location = booking
        .location
        .as_deref()
        .map(|l| format!("LOCATION:{}\r\n", escape_text(l)))
        .unwrap_or_default();

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Artzyra//Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         {location}\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        status = if booking.status.is_active() { "CONFIRMED" } else { "CANCELLED" },
    )
}

/// RFC 5545 TEXT escaping.
fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, PaymentStatus, UserId};
    use chrono::{NaiveDate, NaiveDateTime};

    fn booking(status: BookingStatus, special_requests: Option<&str>, location: Option<&str>) -> Booking {
        let created = NaiveDateTime::parse_from_str("2025-03-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Booking {
            id: "test-123".to_string(),
            customer_id: UserId::new("cust"),
            artist_id: UserId::new("artist"),
            category_id: None,
            booking_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            start_time: "14:00".parse().unwrap(),
            end_time: "15:30".parse().unwrap(),
            status,
            payment_status: PaymentStatus::Unpaid,
            total_amount: 0,
            location: location.map(str::to_string),
            special_requests: special_requests.map(str::to_string),
            rejection_reason: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(
            &booking(BookingStatus::Confirmed, Some("Bring the tripod"), Some("Studio 4, Main St")),
            "Maya Lens",
        );
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T153000"));
        assert!(ics.contains("DTSTAMP:20250310T100000"));
        assert!(ics.contains("SUMMARY:Booking with Maya Lens"));
        assert!(ics.contains("DESCRIPTION:Bring the tripod"));
        assert!(ics.contains("LOCATION:Studio 4\\, Main St"));
        assert!(ics.contains("STATUS:CONFIRMED"));
        assert!(ics.contains("UID:test-123@artzyra"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_generate_ics_defaults() {
        let ics = generate_ics(&booking(BookingStatus::Cancelled, None, None), "Test Artist");
        assert!(ics.contains("DESCRIPTION:No special requests"));
        assert!(!ics.contains("LOCATION:"));
        assert!(ics.contains("STATUS:CANCELLED"));
    }
}
