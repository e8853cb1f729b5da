use crate::api::{internal, require_app, ApiError};
use crate::auth::jwt::{create_token, Claims};
use crate::auth::{access_for_role, authenticate_user, LoginRequest};
use crate::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.db.get().map_err(internal)?;

    let user = authenticate_user(&mut conn, &payload.username, &payload.pin)
        .map_err(|_| ApiError::Unauthenticated("Invalid username or pin.".into()))?;

    let token = create_token(
        &user.username,
        &user.role,
        &state.config.auth.token_secret,
        state.config.auth.token_hours,
    )
    .map_err(internal)?;

    Ok(Json(json!({
        "ok": true,
        "token": token,
        "user": {"username": user.username, "role": user.role},
        "access": access_for_role(&user.role),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub app: Option<String>,
}

pub async fn validate(
    Extension(claims): Extension<Claims>,
    Query(query): Query<ValidateQuery>,
) -> Result<Json<Value>, ApiError> {
    if let Some(app) = query.app.as_deref() {
        require_app(&claims, app)?;
    }

    Ok(Json(json!({
        "ok": true,
        "user": {"username": claims.sub, "role": claims.role},
        "access": access_for_role(&claims.role),
    })))
}
