use crate::api::ApiError;
use crate::auth::jwt::verify_token;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Verifies the bearer token and attaches its claims to the request.
/// Sessions are stateless; no user lookup happens here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("Missing authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthenticated("Missing authorization header".into()))?;

    let claims = verify_token(token, &state.config.auth.token_secret)
        .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
