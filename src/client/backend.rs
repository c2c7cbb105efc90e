use crate::client::error::ClientError;
use crate::models::{
    BookingRow, BookingStatus, BookingType, BookingUpdate, Diary, Envelope, LoginResponse,
    ModelRequest, MutationResponse, NewBooking, Patient, Uid,
};
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;

/// The proxy endpoints the client depends on.
///
/// `HttpBackend` is the real implementation; tests substitute in-memory ones.
pub trait SchedulerBackend: Send + Sync + 'static {
    fn login(&self) -> impl Future<Output = Result<LoginResponse, ClientError>> + Send;

    fn diaries(&self) -> impl Future<Output = Result<Envelope<Vec<Diary>>, ClientError>> + Send;

    fn booking_statuses(
        &self,
        diary: Uid,
        entity: Uid,
    ) -> impl Future<Output = Result<Envelope<Vec<BookingStatus>>, ClientError>> + Send;

    fn booking_types(
        &self,
        diary: Uid,
        entity: Uid,
    ) -> impl Future<Output = Result<Envelope<Vec<BookingType>>, ClientError>> + Send;

    fn patients(
        &self,
        entity: Uid,
    ) -> impl Future<Output = Result<Envelope<Vec<Patient>>, ClientError>> + Send;

    fn bookings(
        &self,
        diary: Uid,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Envelope<Vec<BookingRow>>, ClientError>> + Send;

    fn add_booking(
        &self,
        booking: &NewBooking,
    ) -> impl Future<Output = Result<MutationResponse, ClientError>> + Send;

    fn update_booking(
        &self,
        uid: Uid,
        booking: &BookingUpdate,
    ) -> impl Future<Output = Result<MutationResponse, ClientError>> + Send;

    fn delete_booking(
        &self,
        uid: Uid,
    ) -> impl Future<Output = Result<MutationResponse, ClientError>> + Send;
}

/// Calls the proxy over HTTP. The cookie store carries the proxy's session
/// cookie between calls the way a browser would.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reads a listing. Anything but a 2xx is an error, so a failed fetch
    /// never reaches the cache as an empty list.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Reads a mutation reply. GoodX may pair an error status with a JSON
    /// body such as `ACTION_NOT_SUPPORTED_*`; that body still needs to be
    /// classified.
    async fn mutate(&self, request: RequestBuilder) -> Result<MutationResponse, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        let body = response.text().await?;
        match serde_json::from_str::<MutationResponse>(&body) {
            Ok(reply) => Ok(reply),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
                message: body,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

impl SchedulerBackend for HttpBackend {
    async fn login(&self) -> Result<LoginResponse, ClientError> {
        let response = self.http.post(self.url("/login")).send().await?;
        // A failed login still carries `{success: false, error}`.
        Ok(response.json().await?)
    }

    async fn diaries(&self) -> Result<Envelope<Vec<Diary>>, ClientError> {
        self.fetch(self.http.get(self.url("/diary"))).await
    }

    async fn booking_statuses(
        &self,
        diary: Uid,
        entity: Uid,
    ) -> Result<Envelope<Vec<BookingStatus>>, ClientError> {
        let request = self
            .http
            .get(self.url("/booking_statuses"))
            .query(&[("diary_uid", diary.0), ("entity_uid", entity.0)]);
        self.fetch(request).await
    }

    async fn booking_types(
        &self,
        diary: Uid,
        entity: Uid,
    ) -> Result<Envelope<Vec<BookingType>>, ClientError> {
        let request = self
            .http
            .get(self.url("/booking_types"))
            .query(&[("diary_uid", diary.0), ("entity_uid", entity.0)]);
        self.fetch(request).await
    }

    async fn patients(&self, entity: Uid) -> Result<Envelope<Vec<Patient>>, ClientError> {
        let request = self
            .http
            .get(self.url("/patients"))
            .query(&[("entity_uid", entity.0)]);
        self.fetch(request).await
    }

    async fn bookings(
        &self,
        diary: Uid,
        date: NaiveDate,
    ) -> Result<Envelope<Vec<BookingRow>>, ClientError> {
        let request = self
            .http
            .get(self.url("/bookings"))
            .query(&[("diary_uid", diary.to_string()), ("date", date.to_string())]);
        self.fetch(request).await
    }

    async fn add_booking(&self, booking: &NewBooking) -> Result<MutationResponse, ClientError> {
        let request = self
            .http
            .post(self.url("/add_booking"))
            .json(&ModelRequest { model: booking });
        self.mutate(request).await
    }

    async fn update_booking(
        &self,
        uid: Uid,
        booking: &BookingUpdate,
    ) -> Result<MutationResponse, ClientError> {
        let request = self
            .http
            .put(self.url(&format!("/booking/{uid}")))
            .json(&ModelRequest { model: booking });
        self.mutate(request).await
    }

    async fn delete_booking(&self, uid: Uid) -> Result<MutationResponse, ClientError> {
        self.mutate(self.http.delete(self.url(&format!("/booking/{uid}"))))
            .await
    }
}
