use crate::api::{
    find_flight, internal, load_window, require_app, resolve_window, ApiError, WindowQuery,
};
use crate::auth::jwt::Claims;
use crate::auth::APP_DISPATCH;
use crate::models::{DispatchUpdate, FlightView};
use crate::opsday;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub async fn rows(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_DISPATCH)?;

    let now = Utc::now();
    let (start, end) = resolve_window(&state, now, &query)?;

    let mut conn = state.db.get().map_err(internal)?;
    let flights = load_window(&mut conn, start, end)?;

    let mut rows = Vec::with_capacity(flights.len());
    for flight in &flights {
        let mut view = FlightView::from(flight);
        view.blank_acknowledged_alert();
        let mut value = serde_json::to_value(&view).map_err(internal)?;
        state.overlay.apply(&flight.key, &mut value).await;
        rows.push(value);
    }

    Ok(Json(json!({
        "ok": true,
        "rows": rows,
        "generatedAt": opsday::utc_iso(now),
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub key: String,
    pub wchr: Option<i32>,
    pub wchc: Option<i32>,
    pub comment: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_DISPATCH)?;
    if req.key.is_empty() {
        return Err(ApiError::BadRequest("Missing key".into()));
    }

    let mut conn = state.db.get().map_err(internal)?;
    let existing = find_flight(&mut conn, &req.key)?;

    let now_iso = opsday::utc_iso(Utc::now());
    let mut changes = DispatchUpdate {
        updated_at: Some(now_iso),
        ..Default::default()
    };
    let mut patch = Map::new();

    if let Some(new_wchr) = req.wchr {
        if new_wchr != existing.wchr {
            changes.prev_wchr = Some(existing.wchr);
            patch.insert("prevWchr".into(), existing.wchr.into());
        }
        changes.wchr = Some(new_wchr);
        patch.insert("wchr".into(), new_wchr.into());
    }
    if let Some(new_wchc) = req.wchc {
        if new_wchc != existing.wchc {
            changes.prev_wchc = Some(existing.wchc);
            patch.insert("prevWchc".into(), existing.wchc.into());
        }
        changes.wchc = Some(new_wchc);
        patch.insert("wchc".into(), new_wchc.into());
    }
    if let Some(new_comment) = req.comment {
        patch.insert("comment".into(), new_comment.clone().into());
        changes.comment = Some(new_comment);
    }

    {
        use crate::schema::flights::dsl::*;
        diesel::update(flights.find(&req.key))
            .set(&changes)
            .execute(&mut conn)
            .map_err(internal)?;
    }

    state.overlay.install(&req.key, Value::Object(patch)).await;

    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub key: String,
}

pub async fn ack(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AckRequest>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_DISPATCH)?;
    if req.key.is_empty() {
        return Err(ApiError::BadRequest("Missing key".into()));
    }

    let mut conn = state.db.get().map_err(internal)?;
    let now_iso = opsday::utc_iso(Utc::now());

    let affected = {
        use crate::schema::flights::dsl::*;
        diesel::update(flights.find(&req.key))
            .set((dispatch_ack.eq(true), updated_at.eq(&now_iso)))
            .execute(&mut conn)
            .map_err(internal)?
    };
    if affected == 0 {
        return Err(ApiError::BadRequest(format!(
            "Unknown flight key '{}'",
            req.key
        )));
    }

    state
        .overlay
        .install(&req.key, json!({"dispatchAck": true}))
        .await;

    Ok(Json(json!({"ok": true})))
}
