use crate::day_sheet::build_day_sheet;
use crate::errors::AppError;
use crate::models::{BookingsQuery, DiaryScopeQuery, LoginResponse, PatientsQuery, Uid};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde_json::{Value, json};

type Forwarded = Result<(StatusCode, Json<Value>), AppError>;

pub async fn login(State(state): State<AppState>) -> Response {
    match state.upstream.login().await {
        Ok(session_uid) => {
            let mut headers = HeaderMap::new();
            let cookie = format!("session_UID={session_uid}; HttpOnly; SameSite=Lax; Path=/");
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.insert(header::SET_COOKIE, value);
            }
            let body = LoginResponse {
                success: true,
                session_uid: Some(session_uid),
                error: None,
            };
            (headers, Json(body)).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err.message, details = ?err.details, "login failed");
            let body = LoginResponse {
                success: false,
                session_uid: None,
                error: Some(login_error_text(&err)),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

pub async fn get_diary(State(state): State<AppState>) -> Forwarded {
    ensure_authenticated(&state).await?;
    let (status, body) = state.upstream.diaries().await?;
    Ok((status, Json(body)))
}

pub async fn get_booking_statuses(
    State(state): State<AppState>,
    Query(query): Query<DiaryScopeQuery>,
) -> Forwarded {
    ensure_authenticated(&state).await?;
    let (diary, entity) = diary_scope(query)?;
    let (status, body) = state.upstream.booking_statuses(diary, entity).await?;
    Ok((status, Json(body)))
}

pub async fn get_booking_types(
    State(state): State<AppState>,
    Query(query): Query<DiaryScopeQuery>,
) -> Forwarded {
    ensure_authenticated(&state).await?;
    let (diary, entity) = diary_scope(query)?;
    let (status, body) = state.upstream.booking_types(diary, entity).await?;
    Ok((status, Json(body)))
}

pub async fn get_patients(
    State(state): State<AppState>,
    Query(query): Query<PatientsQuery>,
) -> Forwarded {
    ensure_authenticated(&state).await?;
    let entity = required_uid(query.entity_uid, "Missing entity_uid")?;
    let (status, body) = state.upstream.patients(entity).await?;
    Ok((status, Json(body)))
}

pub async fn get_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_authenticated(&state).await?;

    let (Some(diary), Some(date)) = (non_empty(query.diary_uid), non_empty(query.date)) else {
        return Err(AppError::bad_request("Missing diary_uid or date"));
    };
    let diary: Uid = diary
        .parse()
        .map_err(|_| AppError::bad_request("diary_uid must be a number"))?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("date must be YYYY-MM-DD"))?;

    let raw = state.upstream.bookings(diary, &date.to_string()).await?;
    let sheet = build_day_sheet(&raw);
    tracing::debug!(diary = %diary, %date, rows = sheet.len(), "day sheet built");

    Ok(Json(json!({ "data": sheet, "status": "OK" })))
}

pub async fn add_booking(State(state): State<AppState>, Json(payload): Json<Value>) -> Forwarded {
    ensure_authenticated(&state).await?;
    let model = booking_model(payload)?;
    tracing::debug!(?model, "posting new booking");
    let (status, body) = state.upstream.add_booking(model).await?;
    Ok((status, Json(body)))
}

pub async fn update_booking(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(payload): Json<Value>,
) -> Forwarded {
    ensure_authenticated(&state).await?;
    let uid = path_uid(&uid)?;
    let model = booking_model(payload)?;
    tracing::debug!(%uid, ?model, "updating booking");
    let (status, body) = state.upstream.update_booking(uid, model).await?;
    Ok((status, Json(body)))
}

pub async fn delete_booking(State(state): State<AppState>, Path(uid): Path<String>) -> Forwarded {
    ensure_authenticated(&state).await?;
    let uid = path_uid(&uid)?;
    tracing::info!(%uid, "cancelling booking");
    let (status, body) = state.upstream.delete_booking(uid).await?;
    Ok((status, Json(body)))
}

async fn ensure_authenticated(state: &AppState) -> Result<(), AppError> {
    if state.upstream.is_authenticated().await {
        Ok(())
    } else {
        tracing::warn!("request rejected, no upstream session");
        Err(AppError::not_authenticated())
    }
}

fn booking_model(payload: Value) -> Result<Value, AppError> {
    match payload.get("model") {
        Some(model) if model.is_object() => Ok(model.clone()),
        _ => Err(AppError::bad_request("Missing booking data")),
    }
}

fn diary_scope(query: DiaryScopeQuery) -> Result<(Uid, Uid), AppError> {
    const MISSING: &str = "Missing diary_uid or entity_uid";
    Ok((
        required_uid(query.diary_uid, MISSING)?,
        required_uid(query.entity_uid, MISSING)?,
    ))
}

fn required_uid(value: Option<String>, missing: &str) -> Result<Uid, AppError> {
    let value = non_empty(value).ok_or_else(|| AppError::bad_request(missing))?;
    value
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid uid {value:?}")))
}

fn path_uid(raw: &str) -> Result<Uid, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid booking uid {raw:?}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn login_error_text(err: &AppError) -> String {
    match err.details.as_ref().and_then(|details| details.get("details")) {
        Some(Value::String(details)) => details.clone(),
        _ => err.message.clone(),
    }
}
