use crate::config::ProxyConfig;
use crate::errors::AppError;
use crate::models::Uid;
use axum::http::StatusCode;
use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

/// GoodX sessions are requested with a three day timeout.
const SESSION_TIMEOUT_SECS: u64 = 259_200;

pub const DIARY_FIELDS: &[&str] = &[
    "uid",
    "entity_uid",
    "treating_doctor_uid",
    "service_center_uid",
    "booking_type_uid",
    "name",
    "uuid",
    "disabled",
];

pub const BOOKING_STATUS_FIELDS: &[&str] = &[
    "uid",
    "entity_uid",
    "diary_uid",
    "name",
    "next_booking_status_uid",
    "is_arrived",
    "is_final",
    "disabled",
];

pub const BOOKING_TYPE_FIELDS: &[&str] = &["uid", "entity_uid", "diary_uid", "name", "disabled"];

pub const PATIENT_FIELDS: &[&str] = &["uid", "entity_uid", "name", "surname"];

/// Talks to the GoodX API on behalf of every client of this proxy.
///
/// A single upstream session is shared: `login` replaces it and every other
/// call forwards it as the `session_id` cookie.
#[derive(Clone)]
pub struct GoodxUpstream {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    session_cookie: Arc<RwLock<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    uid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionReply {
    data: Option<SessionData>,
}

impl GoodxUpstream {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            base_url: config.gxweb_url.trim_end_matches('/').to_string(),
            username: config.gxweb_user.clone(),
            password: config.gxweb_pass.clone(),
            session_cookie: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session_cookie.read().await.is_some()
    }

    /// Opens a GoodX session and returns its uid.
    pub async fn login(&self) -> Result<String, AppError> {
        let payload = json!({
            "model": { "timeout": SESSION_TIMEOUT_SECS },
            "auth": [["password", { "username": self.username, "password": self.password }]],
        });

        let response = self
            .http
            .post(format!("{}/api/session", self.base_url))
            .json(&payload)
            .send()
            .await?;
        tracing::debug!(status = %response.status(), "goodx login response");

        let cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(extract_session_cookie);

        let response = response.error_for_status()?;
        let reply: SessionReply = response.json().await?;
        let session_uid = reply
            .data
            .and_then(|data| data.uid)
            .ok_or_else(|| AppError::upstream_status(StatusCode::BAD_GATEWAY, "session uid missing".to_string()))?;

        if cookie.is_some() {
            tracing::info!("goodx session cookie stored");
        } else {
            tracing::error!("session_id not found in Set-Cookie header");
        }
        *self.session_cookie.write().await = cookie;

        Ok(session_uid)
    }

    pub async fn diaries(&self) -> Result<(StatusCode, Value), AppError> {
        let params = [("fields", fields_param(DIARY_FIELDS))];
        self.forward(self.get("/api/diary").await?.query(&params)).await
    }

    pub async fn booking_statuses(&self, diary: Uid, entity: Uid) -> Result<(StatusCode, Value), AppError> {
        let filter = json!([
            "AND",
            ["=", ["I", "entity_uid"], ["L", entity.0]],
            ["=", ["I", "diary_uid"], ["L", diary.0]],
            ["NOT", ["I", "disabled"]],
        ]);
        self.query("/api/booking_status", BOOKING_STATUS_FIELDS, &filter)
            .await
    }

    pub async fn booking_types(&self, diary: Uid, entity: Uid) -> Result<(StatusCode, Value), AppError> {
        let filter = json!([
            "AND",
            ["=", ["I", "entity_uid"], ["L", entity.0]],
            ["=", ["I", "diary_uid"], ["L", diary.0]],
            ["NOT", ["I", "disabled"]],
        ]);
        self.query("/api/booking_type", BOOKING_TYPE_FIELDS, &filter)
            .await
    }

    pub async fn patients(&self, entity: Uid) -> Result<(StatusCode, Value), AppError> {
        let filter = json!(["=", ["I", "entity_uid"], ["L", entity.0]]);
        self.query("/api/patient", PATIENT_FIELDS, &filter).await
    }

    /// Raw bookings of one diary on one day, with patient names joined in.
    pub async fn bookings(&self, diary: Uid, date: &str) -> Result<Value, AppError> {
        let fields = json!([
            ["AS", ["I", "patient_uid", "name"], "patient_name"],
            ["AS", ["I", "patient_uid", "surname"], "patient_surname"],
            ["AS", ["I", "patient_uid", "debtor_uid", "name"], "debtor_name"],
            ["AS", ["I", "patient_uid", "debtor_uid", "surname"], "debtor_surname"],
            "uid",
            "entity_uid",
            "diary_uid",
            "booking_type_uid",
            "booking_status_uid",
            "patient_uid",
            "start_time",
            "duration",
            "treating_doctor_uid",
            "reason",
            "invoice_nr",
            "cancelled",
            "uuid",
        ]);
        let filter = json!([
            "AND",
            ["=", ["I", "diary_uid"], ["L", diary.0]],
            ["=", ["::", ["I", "start_time"], ["I", "date"]], ["L", date]],
        ]);
        let params = [("fields", fields.to_string()), ("filter", filter.to_string())];

        let (status, body) = self.forward(self.get("/api/booking").await?.query(&params)).await?;
        if !status.is_success() {
            return Err(AppError::upstream_status(status, body.to_string()));
        }
        Ok(body)
    }

    pub async fn add_booking(&self, model: Value) -> Result<(StatusCode, Value), AppError> {
        let request = self
            .request(Method::POST, "/api/booking")
            .await?
            .json(&json!({ "model": model }));
        self.forward(request).await
    }

    pub async fn update_booking(&self, uid: Uid, model: Value) -> Result<(StatusCode, Value), AppError> {
        let request = self
            .request(Method::PUT, &format!("/api/booking/{uid}"))
            .await?
            .json(&json!({ "model": model }));
        self.forward(request).await
    }

    pub async fn delete_booking(&self, uid: Uid) -> Result<(StatusCode, Value), AppError> {
        let request = self
            .request(Method::DELETE, &format!("/api/booking/{uid}"))
            .await?;
        self.forward(request).await
    }

    async fn query(&self, path: &str, fields: &[&str], filter: &Value) -> Result<(StatusCode, Value), AppError> {
        let params = [("fields", fields_param(fields)), ("filter", filter.to_string())];
        self.forward(self.get(path).await?.query(&params)).await
    }

    async fn get(&self, path: &str) -> Result<RequestBuilder, AppError> {
        self.request(Method::GET, path).await
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let cookie = self
            .session_cookie
            .read()
            .await
            .clone()
            .ok_or_else(AppError::not_authenticated)?;

        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::ACCEPT, "*/*")
            .header(header::COOKIE, format!("session_id={cookie}")))
    }

    /// Sends the request and hands back GoodX's JSON body with its status.
    ///
    /// Bodies that fail to decode are only an error when the status was not a
    /// success; GoodX reports business failures (`ACTION_NOT_SUPPORTED...`) in
    /// JSON and those have to reach the client untouched.
    async fn forward(&self, request: RequestBuilder) -> Result<(StatusCode, Value), AppError> {
        let response: Response = request.send().await?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let text = response.text().await?;

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => Ok((status, body)),
            Err(_) if !status.is_success() => Err(AppError::upstream_status(status, text)),
            Err(err) => Err(AppError::request_failed(err)),
        }
    }
}

fn fields_param(fields: &[&str]) -> String {
    json!(fields).to_string()
}

/// Pulls the `session_id` value out of one `Set-Cookie` header.
///
/// GoodX quotes the value and expects it back quoted, so the quotes stay.
pub fn extract_session_cookie(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("session_id="))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_keeps_quotes() {
        let header = r#"session_id="abc:123"; Path=/; HttpOnly"#;
        assert_eq!(extract_session_cookie(header).as_deref(), Some(r#""abc:123""#));
    }

    #[test]
    fn session_cookie_absent_in_other_cookies() {
        assert_eq!(extract_session_cookie("tracking=1; Path=/"), None);
        assert_eq!(extract_session_cookie("session_id=; Path=/"), None);
    }

    #[test]
    fn fields_param_is_json_array() {
        assert_eq!(fields_param(&["uid", "name"]), r#"["uid","name"]"#);
    }
}
