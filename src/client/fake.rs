//! In-memory backend for client unit tests.

use crate::client::backend::SchedulerBackend;
use crate::client::error::ClientError;
use crate::models::{
    BookingRow, BookingStatus, BookingType, BookingUpdate, Diary, Envelope, LoginResponse,
    MutationResponse, NewBooking, Patient, Uid,
};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
pub struct FakeBackend {
    pub logins: AtomicUsize,
    pub login_times: Mutex<Vec<Instant>>,
    /// Scripted login outcomes; once empty every login succeeds.
    pub login_script: Mutex<VecDeque<bool>>,
    /// When set, login waits for a notification before answering.
    pub login_gate: Option<Arc<Notify>>,
    pub diaries: Mutex<Vec<Diary>>,
    pub diary_calls: AtomicUsize,
    pub statuses: Mutex<Vec<BookingStatus>>,
    pub status_calls: AtomicUsize,
    pub bookings: Mutex<Vec<BookingRow>>,
    pub booking_calls: AtomicUsize,
    pub unauthorized: AtomicBool,
    /// Diary listing answers like a proxy whose upstream call failed.
    pub diary_outage: AtomicBool,
    /// Status listing answers without `data`.
    pub status_outage: AtomicBool,
    pub mutation_reply: Mutex<MutationResponse>,
    /// Every mutation as `(method, uid, serialized model)`.
    pub sent: Mutex<Vec<(&'static str, Option<Uid>, Value)>>,
}

impl FakeBackend {
    pub fn with_diaries(diaries: Vec<Diary>) -> Self {
        Self {
            diaries: Mutex::new(diaries),
            ..Self::default()
        }
    }

    pub fn fail_logins(&self, count: usize) {
        self.login_script
            .lock()
            .unwrap()
            .extend(std::iter::repeat_n(false, count));
    }

    pub fn reply_with(&self, status: &str, data: Option<Value>, error: Option<&str>) {
        *self.mutation_reply.lock().unwrap() = MutationResponse {
            status: Some(status.to_string()),
            data,
            error: error.map(|text| Value::String(text.to_string())),
        };
    }

    fn check_auth(&self) -> Result<(), ClientError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(ClientError::Unauthorized);
        }
        Ok(())
    }

    fn record(&self, method: &'static str, uid: Option<Uid>, model: Value) -> MutationResponse {
        self.sent.lock().unwrap().push((method, uid, model));
        self.mutation_reply.lock().unwrap().clone()
    }
}

fn ok<T>(data: T) -> Envelope<T> {
    Envelope {
        data: Some(data),
        status: Some("OK".to_string()),
        error: None,
    }
}

impl SchedulerBackend for FakeBackend {
    async fn login(&self) -> Result<LoginResponse, ClientError> {
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        self.login_times.lock().unwrap().push(Instant::now());
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }

        let succeed = self.login_script.lock().unwrap().pop_front().unwrap_or(true);
        Ok(if succeed {
            LoginResponse {
                success: true,
                session_uid: Some(format!("\"sess-{attempt}\"")),
                error: None,
            }
        } else {
            LoginResponse {
                success: false,
                session_uid: None,
                error: Some("Invalid credentials".to_string()),
            }
        })
    }

    async fn diaries(&self) -> Result<Envelope<Vec<Diary>>, ClientError> {
        self.diary_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        if self.diary_outage.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 500,
                message: r#"{"error":"API request failed"}"#.to_string(),
            });
        }
        Ok(ok(self.diaries.lock().unwrap().clone()))
    }

    async fn booking_statuses(
        &self,
        _diary: Uid,
        _entity: Uid,
    ) -> Result<Envelope<Vec<BookingStatus>>, ClientError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        if self.status_outage.load(Ordering::SeqCst) {
            return Ok(Envelope {
                data: None,
                status: Some("FAILED".to_string()),
                error: None,
            });
        }
        Ok(ok(self.statuses.lock().unwrap().clone()))
    }

    async fn booking_types(
        &self,
        diary: Uid,
        _entity: Uid,
    ) -> Result<Envelope<Vec<BookingType>>, ClientError> {
        self.check_auth()?;
        Ok(ok(vec![BookingType {
            uid: Uid(500 + diary.0),
            name: "Consultation".to_string(),
        }]))
    }

    async fn patients(&self, entity: Uid) -> Result<Envelope<Vec<Patient>>, ClientError> {
        self.check_auth()?;
        Ok(ok(vec![Patient {
            uid: Uid(900 + entity.0),
            name: "Thandi".to_string(),
            surname: "Mokoena".to_string(),
        }]))
    }

    async fn bookings(
        &self,
        _diary: Uid,
        _date: NaiveDate,
    ) -> Result<Envelope<Vec<BookingRow>>, ClientError> {
        self.booking_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;
        Ok(ok(self.bookings.lock().unwrap().clone()))
    }

    async fn add_booking(&self, booking: &NewBooking) -> Result<MutationResponse, ClientError> {
        self.check_auth()?;
        let model = serde_json::to_value(booking).unwrap();
        Ok(self.record("add", None, model))
    }

    async fn update_booking(
        &self,
        uid: Uid,
        booking: &BookingUpdate,
    ) -> Result<MutationResponse, ClientError> {
        self.check_auth()?;
        let model = serde_json::to_value(booking).unwrap();
        Ok(self.record("update", Some(uid), model))
    }

    async fn delete_booking(&self, uid: Uid) -> Result<MutationResponse, ClientError> {
        self.check_auth()?;
        Ok(self.record("delete", Some(uid), Value::Null))
    }
}
