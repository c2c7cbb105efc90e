use crate::client::cache::Selection;
use crate::models::{BookingRow, BookingUpdate, NewBooking, Uid};
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

pub const MIN_DURATION: u32 = 1;
pub const MAX_DURATION: u32 = 100;
pub const DEFAULT_DURATION: &str = "15";
pub const DEFAULT_REASON: &str = "Updated Consultation";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Duration must be a number between 1 and 100.")]
    Duration,
    #[error("Reason may only contain letters, numbers, spaces, hyphens, commas, and full stops.")]
    Reason,
    #[error("Please choose a patient, booking type and status.")]
    MissingChoice,
}

/// Parses a duration in minutes. Only whole numbers in `[1, 100]` pass.
pub fn validate_duration(raw: &str) -> Result<u32, ValidationError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|minutes| (MIN_DURATION..=MAX_DURATION).contains(minutes))
        .ok_or(ValidationError::Duration)
}

/// Checks the free-text reason against a conservative allow-list.
pub fn validate_reason(raw: &str) -> Result<String, ValidationError> {
    let reason = raw.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | ',' | '.');

    if reason.is_empty() || !reason.chars().all(allowed) {
        return Err(ValidationError::Reason);
    }
    Ok(reason.to_string())
}

/// The create/edit form as the user filled it in. Duration and reason stay as
/// typed until [`BookingForm::validate`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingForm {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration: String,
    pub reason: String,
    pub patient_uid: Option<Uid>,
    pub booking_type_uid: Option<Uid>,
    pub booking_status_uid: Option<Uid>,
}

/// A form that passed validation, ready to become a create or update payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidBooking {
    pub start_time: String,
    pub duration: u32,
    pub reason: String,
    pub patient_uid: Uid,
    pub booking_type_uid: Uid,
    pub booking_status_uid: Uid,
}

impl BookingForm {
    /// Blank form for a new booking on `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            time: default_time(),
            duration: String::new(),
            reason: String::new(),
            patient_uid: None,
            booking_type_uid: None,
            booking_status_uid: None,
        }
    }

    /// Form pre-filled from an existing row, for editing.
    pub fn from_row(row: &BookingRow, today: NaiveDate) -> Self {
        let (date, time) = row
            .start_time
            .as_deref()
            .map(split_start_time)
            .unwrap_or((None, None));

        Self {
            date: date.unwrap_or(today),
            time: time.unwrap_or_else(default_time),
            duration: row
                .duration
                .filter(|minutes| *minutes > 0)
                .map_or_else(|| DEFAULT_DURATION.to_string(), |minutes| minutes.to_string()),
            reason: row
                .reason
                .clone()
                .filter(|reason| !reason.is_empty())
                .unwrap_or_else(|| DEFAULT_REASON.to_string()),
            patient_uid: row.patient_uid,
            booking_type_uid: row.booking_type_uid,
            booking_status_uid: row.booking_status_uid,
        }
    }

    pub fn validate(&self) -> Result<ValidBooking, ValidationError> {
        let duration = validate_duration(&self.duration)?;
        let reason = validate_reason(&self.reason)?;
        let (Some(patient_uid), Some(booking_type_uid), Some(booking_status_uid)) =
            (self.patient_uid, self.booking_type_uid, self.booking_status_uid)
        else {
            return Err(ValidationError::MissingChoice);
        };

        Ok(ValidBooking {
            start_time: format!("{}T{}:00", self.date, self.time.format("%H:%M")),
            duration,
            reason,
            patient_uid,
            booking_type_uid,
            booking_status_uid,
        })
    }
}

impl ValidBooking {
    pub fn into_new(self, selection: Selection) -> NewBooking {
        NewBooking {
            diary_uid: selection.diary_uid,
            entity_uid: selection.entity_uid,
            booking_type_uid: self.booking_type_uid,
            booking_status_uid: self.booking_status_uid,
            patient_uid: self.patient_uid,
            start_time: self.start_time,
            duration: self.duration,
            reason: self.reason,
            cancelled: false,
        }
    }

    pub fn into_update(self, diary_uid: Uid) -> BookingUpdate {
        BookingUpdate {
            diary_uid,
            booking_type_uid: self.booking_type_uid,
            booking_status_uid: self.booking_status_uid,
            patient_uid: self.patient_uid,
            start_time: self.start_time,
            duration: self.duration,
            reason: self.reason,
            cancelled: false,
        }
    }
}

fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Splits `2026-01-05T09:30:00` (or with a space) into date and `HH:MM`.
fn split_start_time(raw: &str) -> (Option<NaiveDate>, Option<NaiveTime>) {
    let (date_part, time_part) = match raw.split_once(['T', ' ']) {
        Some((date, time)) => (Some(date), time),
        None => (None, raw),
    };

    let date = date_part.and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok());
    let time = time_part
        .get(..5)
        .and_then(|hhmm| NaiveTime::parse_from_str(hhmm, "%H:%M").ok());
    (date, time)
}
