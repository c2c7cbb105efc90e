use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/login", post(handlers::login))
        .route("/diary", get(handlers::get_diary))
        .route("/booking_statuses", get(handlers::get_booking_statuses))
        .route("/booking_types", get(handlers::get_booking_types))
        .route("/patients", get(handlers::get_patients))
        .route("/bookings", get(handlers::get_bookings))
        .route("/add_booking", post(handlers::add_booking))
        .route(
            "/booking/:uid",
            put(handlers::update_booking).delete(handlers::delete_booking),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Browsers only send the session cookie cross-origin to explicitly listed
/// origins, so wildcards are not an option here.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
