use crate::api::{internal, require_app, ApiError};
use crate::auth::jwt::Claims;
use crate::auth::APP_MGMT;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn dates(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_MGMT)?;

    let mut conn = state.db.get().map_err(internal)?;
    let counts: Vec<(String, i64)> = {
        use crate::schema::archive::dsl::*;
        archive
            .group_by(ops_date)
            .select((ops_date, diesel::dsl::count_star()))
            .order(ops_date.desc())
            .load(&mut conn)
            .map_err(internal)?
    };

    let dates: Vec<Value> = counts
        .into_iter()
        .map(|(date, flights)| json!({"date": date, "flights": flights}))
        .collect();

    Ok(Json(json!({"ok": true, "dates": dates})))
}

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    pub date: Option<String>,
}

pub async fn rows(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_MGMT)?;

    let date = query.date.as_deref().unwrap_or("");
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(ApiError::BadRequest(
            "Invalid date, expected YYYY-MM-DD".into(),
        ));
    }

    let mut conn = state.db.get().map_err(internal)?;
    let payloads: Vec<String> = {
        use crate::schema::archive::dsl::*;
        archive
            .filter(ops_date.eq(date))
            .order(id.asc())
            .select(flight_data)
            .load(&mut conn)
            .map_err(internal)?
    };

    let mut rows = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => rows.push(value),
            Err(e) => tracing::warn!("Skipping unparseable archive row: {e}"),
        }
    }

    Ok(Json(json!({
        "ok": true,
        "opsDate": date,
        "flights": rows.len(),
        "rows": rows,
    })))
}
