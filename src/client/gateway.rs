use crate::client::backend::SchedulerBackend;
use crate::client::error::{ClientError, MutationKind};
use crate::client::{SchedulerClient, listed};
use crate::client::validation::BookingForm;
use crate::models::{BookingRow, BookingType, MutationResponse, Patient, Uid};
use chrono::NaiveDate;

pub const EMPTY_BOOKINGS_MESSAGE: &str = "No bookings found for the selected date.";
pub const UNKNOWN_STATUS: &str = "Unknown";
const NOT_SUPPORTED_PREFIX: &str = "ACTION_NOT_SUPPORTED";

/// A day's bookings ready for display.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingsView {
    Empty { message: &'static str },
    Rows(Vec<BookingListing>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingListing {
    pub row: BookingRow,
    pub status_name: String,
}

/// Choices for the create/edit form, fetched for the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FormOptions {
    pub patients: Vec<Patient>,
    pub booking_types: Vec<BookingType>,
    pub statuses: Vec<(Uid, String)>,
}

/// Sorts a mutation reply into success, "not supported" and everything else.
///
/// Create and update also need a `data` payload to count as success.
pub fn classify_mutation(
    response: MutationResponse,
    kind: MutationKind,
) -> Result<MutationResponse, ClientError> {
    let status = response.status.as_deref().unwrap_or_default();
    if status.starts_with(NOT_SUPPORTED_PREFIX) {
        return Err(ClientError::NotSupported {
            kind,
            status: status.to_string(),
        });
    }

    let require_data = kind != MutationKind::Delete;
    let has_data = response.data.as_ref().is_some_and(|data| !data.is_null());
    if status == "OK" && (has_data || !require_data) {
        return Ok(response);
    }

    let message = response
        .error_text()
        .unwrap_or_else(|| format!("unexpected status {status:?}"));
    Err(ClientError::Rejected { message })
}

impl<B: SchedulerBackend> SchedulerClient<B> {
    /// Lists bookings of the selected diary for `date`, remembering both the
    /// date and the rows.
    pub async fn list_bookings(&self, date: Option<NaiveDate>) -> Result<BookingsView, ClientError> {
        let selection = self.selection().await.ok_or(ClientError::NoDiarySelected)?;
        let date = date.ok_or(ClientError::NoDateSelected)?;
        self.require_session()?;

        let envelope = self
            .track(self.inner.backend.bookings(selection.diary_uid, date).await)?;
        let rows = envelope.data.unwrap_or_default();
        tracing::debug!(diary = %selection.diary_uid, %date, rows = rows.len(), "bookings listed");

        let mut cache = self.inner.cache.write().await;
        cache.set_selected_date(Some(date));
        cache.replace_bookings(rows);

        if cache.bookings().is_empty() {
            return Ok(BookingsView::Empty {
                message: EMPTY_BOOKINGS_MESSAGE,
            });
        }

        let listings = cache
            .bookings()
            .iter()
            .map(|row| BookingListing {
                status_name: cache
                    .status_name(row.booking_status_uid)
                    .unwrap_or(UNKNOWN_STATUS)
                    .to_string(),
                row: row.clone(),
            })
            .collect();
        Ok(BookingsView::Rows(listings))
    }

    pub async fn create_booking(&self, form: &BookingForm) -> Result<MutationResponse, ClientError> {
        let selection = self.selection().await.ok_or(ClientError::NoDiarySelected)?;
        let booking = form.validate()?.into_new(selection);
        self.require_session()?;

        let response = self.track(self.inner.backend.add_booking(&booking).await)?;
        let response = classify_mutation(response, MutationKind::Create)?;
        tracing::info!(diary = %selection.diary_uid, start = %booking.start_time, "booking created");
        self.relist_after_mutation().await;
        Ok(response)
    }

    pub async fn update_booking(
        &self,
        uid: Uid,
        form: &BookingForm,
    ) -> Result<MutationResponse, ClientError> {
        let selection = self.selection().await.ok_or(ClientError::NoDiarySelected)?;
        let booking = form.validate()?.into_update(selection.diary_uid);
        self.require_session()?;

        let response = self.track(self.inner.backend.update_booking(uid, &booking).await)?;
        let response = classify_mutation(response, MutationKind::Update)?;
        tracing::info!(%uid, "booking updated");
        self.relist_after_mutation().await;
        Ok(response)
    }

    /// Cancels a booking. GoodX answers a bare `"OK"` here.
    pub async fn delete_booking(&self, uid: Uid) -> Result<MutationResponse, ClientError> {
        self.require_session()?;

        let response = self.track(self.inner.backend.delete_booking(uid).await)?;
        let response = classify_mutation(response, MutationKind::Delete)?;
        tracing::info!(%uid, "booking cancelled");
        self.relist_after_mutation().await;
        Ok(response)
    }

    /// Fetches patients and booking types for the selected diary and caches
    /// them next to the status map.
    pub async fn load_form_options(&self) -> Result<FormOptions, ClientError> {
        let selection = self.selection().await.ok_or(ClientError::NoDiarySelected)?;
        self.require_session()?;

        let patients = listed(
            self.track(self.inner.backend.patients(selection.entity_uid).await)?,
            "patients",
        )?;
        let booking_types = listed(
            self.track(
                self.inner
                    .backend
                    .booking_types(selection.diary_uid, selection.entity_uid)
                    .await,
            )?,
            "booking types",
        )?;

        let mut cache = self.inner.cache.write().await;
        cache.replace_patients(patients.clone());
        cache.replace_booking_types(booking_types.clone());
        let statuses = cache
            .status_names()
            .iter()
            .map(|(uid, name)| (*uid, name.clone()))
            .collect();

        Ok(FormOptions {
            patients,
            booking_types,
            statuses,
        })
    }

    async fn relist_after_mutation(&self) {
        let date = self.selected_date().await;
        if date.is_none() {
            return;
        }
        if let Err(err) = self.list_bookings(date).await {
            tracing::warn!(error = %err, "could not refresh bookings after change");
        }
    }
}
