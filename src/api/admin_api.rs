use crate::api::{internal, require_app, ApiError};
use crate::auth::jwt::Claims;
use crate::auth::APP_DISPATCH;
use crate::services::sync;
use crate::AppState;
use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

/// Manual fetch-and-sync pass, for testing against the live provider.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_DISPATCH)?;

    let (inserted, updated) = sync::run_full_sync(&state).await.map_err(internal)?;

    Ok(Json(json!({
        "ok": true,
        "inserted": inserted,
        "updated": updated,
    })))
}
