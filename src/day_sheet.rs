use crate::models::{BookingRow, Uid};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;

/// A booking as GoodX returns it for the day query. Unknown fields are dropped.
#[derive(Debug, Default, Deserialize)]
struct UpstreamBooking {
    uid: Option<Uid>,
    diary_uid: Option<Uid>,
    entity_uid: Option<Uid>,
    booking_type_uid: Option<Uid>,
    booking_status_uid: Option<Uid>,
    patient_uid: Option<Uid>,
    start_time: Option<String>,
    duration: Option<i64>,
    reason: Option<String>,
    patient_name: Option<String>,
    patient_surname: Option<String>,
    cancelled: Option<bool>,
}

/// Turns a raw GoodX booking reply into a day sheet ordered by start time,
/// then live before cancelled, then status, surname and name.
pub fn build_day_sheet(bookings: &Value) -> Vec<BookingRow> {
    let rows = match bookings.get("data").and_then(Value::as_array) {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    let mut sheet: Vec<(Option<NaiveDateTime>, BookingRow)> = rows
        .iter()
        .filter_map(|raw| match UpstreamBooking::deserialize(raw) {
            Ok(booking) => Some(booking),
            Err(err) => {
                tracing::warn!("skipping malformed booking row: {err}");
                None
            }
        })
        .map(|booking| {
            let parsed = booking.start_time.as_deref().and_then(parse_start_time);
            let time_pretty = match (parsed, booking.start_time.as_ref()) {
                (Some(dt), _) => dt.format("%H:%M").to_string(),
                (None, Some(raw)) => raw.clone(),
                (None, None) => String::new(),
            };

            let row = BookingRow {
                uid: booking.uid,
                diary_uid: booking.diary_uid,
                entity_uid: booking.entity_uid,
                booking_type_uid: booking.booking_type_uid,
                booking_status_uid: booking.booking_status_uid,
                patient_uid: booking.patient_uid,
                start_time: booking.start_time,
                time_pretty,
                duration: booking.duration,
                reason: booking.reason,
                patient_name: booking.patient_name,
                patient_surname: booking.patient_surname,
                cancelled: booking.cancelled.unwrap_or(false),
            };
            (parsed, row)
        })
        .collect();

    sheet.sort_by(|(a_time, a), (b_time, b)| compare_rows(*a_time, a, *b_time, b));
    sheet.into_iter().map(|(_, row)| row).collect()
}

fn compare_rows(
    a_time: Option<NaiveDateTime>,
    a: &BookingRow,
    b_time: Option<NaiveDateTime>,
    b: &BookingRow,
) -> Ordering {
    let a_time = a_time.unwrap_or(NaiveDateTime::MIN);
    let b_time = b_time.unwrap_or(NaiveDateTime::MIN);

    a_time
        .cmp(&b_time)
        .then(a.cancelled.cmp(&b.cancelled))
        .then(status_key(a).cmp(&status_key(b)))
        .then(a.patient_surname.as_deref().unwrap_or("").cmp(b.patient_surname.as_deref().unwrap_or("")))
        .then(a.patient_name.as_deref().unwrap_or("").cmp(b.patient_name.as_deref().unwrap_or("")))
}

fn status_key(row: &BookingRow) -> i64 {
    row.booking_status_uid.map_or(0, |uid| uid.0)
}

/// Accepts the ISO forms GoodX emits: with `T` or a space, optional fraction,
/// optional offset. Offsets are dropped; the sheet shows wall-clock time.
pub fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
