pub mod admin_api;
pub mod archive_api;
pub mod auth_api;
pub mod dispatch_api;
pub mod lead_api;

use crate::auth::jwt::Claims;
use crate::auth::role_has_app;
use crate::models::Flight;
use crate::opsday;
use crate::AppState;
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde_json::json;

/// Error surface of the API. Everything a handler can fail with maps to one
/// of these kinds; the body is always `{ok:false, error}`.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(m)
            | ApiError::Unauthorized(m)
            | ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self.message());
        }
        (status, Json(json!({"ok": false, "error": self.message()}))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

pub fn internal<E: std::fmt::Display>(e: E) -> ApiError {
    ApiError::Internal(e.to_string())
}

pub fn require_app(claims: &Claims, app: &str) -> Result<(), ApiError> {
    if role_has_app(&claims.role, app) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized(format!("No access to {app}")))
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "name": "paxops-server",
        "time": opsday::utc_iso(Utc::now()),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Unknown route".into())
}

/// Common `from`/`to`/`opsDay` query parameters for row listings.
#[derive(Debug, serde::Deserialize)]
pub struct WindowQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "opsDay")]
    pub ops_day: Option<String>,
}

pub fn resolve_window(
    state: &AppState,
    now: DateTime<Utc>,
    q: &WindowQuery,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let tz = state.config.tz().map_err(internal)?;
    opsday::query_window(now, tz, q.from.as_deref(), q.to.as_deref(), q.ops_day.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// The one range query every listing uses.
pub fn load_window(
    conn: &mut SqliteConnection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Flight>, ApiError> {
    use crate::schema::flights::dsl::*;
    flights
        .filter(time_est.between(opsday::utc_iso(start), opsday::utc_iso(end)))
        .order(time_est.asc())
        .select(Flight::as_select())
        .load(conn)
        .map_err(internal)
}

pub fn find_flight(conn: &mut SqliteConnection, flight_key: &str) -> Result<Flight, ApiError> {
    use crate::schema::flights::dsl::*;
    flights
        .find(flight_key)
        .select(Flight::as_select())
        .first(conn)
        .optional()
        .map_err(internal)?
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown flight key '{flight_key}'")))
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .route("/auth/validate", get(auth_api::validate))
        // Dispatch board
        .route("/dispatch/rows", get(dispatch_api::rows))
        .route("/dispatch/update", patch(dispatch_api::update))
        .route("/dispatch/ack", post(dispatch_api::ack))
        // Zone leads
        .route("/lead/init", get(lead_api::init))
        .route("/lead/rows", get(lead_api::rows))
        .route("/lead/update", patch(lead_api::update))
        .route("/lead/ack", post(lead_api::ack))
        // Management archive views
        .route("/archive/dates", get(archive_api::dates))
        .route("/archive/rows", get(archive_api::rows))
        // Manual sync trigger
        .route("/admin/sync", post(admin_api::trigger_sync))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::auth::middleware::auth_middleware,
        ));

    Router::new()
        .route("/auth/login", post(auth_api::login))
        .merge(protected_routes)
}
