use crate::api::{
    find_flight, internal, load_window, require_app, resolve_window, ApiError, WindowQuery,
};
use crate::auth::jwt::Claims;
use crate::auth::APP_LEAD;
use crate::models::{Flight, FlightView, LeadUpdate};
use crate::opsday;
use crate::services::fids;
use crate::zones;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub async fn init(Extension(claims): Extension<Claims>) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_LEAD)?;
    Ok(Json(json!({
        "ok": true,
        "zones": zones::ZONES,
        "serverTime": opsday::utc_iso(Utc::now()),
    })))
}

#[derive(Debug, Deserialize)]
pub struct LeadRowsQuery {
    pub zone: Option<String>,
    #[serde(rename = "type")]
    pub flight_type: Option<String>,
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "opsDay")]
    pub ops_day: Option<String>,
}

/// A flight shows on a zone board while it sits in the zone or still owes
/// the board a carry-over, and disappears once that board acknowledges.
fn zone_visible(flight: &Flight, zone: &str) -> bool {
    if zone == "ALL" || zone.is_empty() {
        return !flight.board_ack(&flight.zone_current).unwrap_or(false);
    }
    let member = flight.zone_current == zone || flight.zone_prev == zone;
    member && !flight.board_ack(zone).unwrap_or(false)
}

fn type_matches(flight: &Flight, filter: Option<&str>) -> bool {
    match filter {
        None | Some("ALL") | Some("") => true,
        Some(t) => flight.flight_type == t,
    }
}

fn query_matches(flight: &Flight, q: Option<&str>) -> bool {
    let Some(raw) = q else {
        return true;
    };
    let needle = fids::normalize_flight_no(raw);
    if needle.is_empty() {
        return true;
    }
    fids::normalize_flight_no(&flight.flight_no).contains(&needle)
}

pub async fn rows(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<LeadRowsQuery>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_LEAD)?;

    let now = Utc::now();
    let window = WindowQuery {
        from: query.from.clone(),
        to: query.to.clone(),
        ops_day: query.ops_day.clone(),
    };
    let (start, end) = resolve_window(&state, now, &window)?;
    let zone = query.zone.as_deref().unwrap_or("ALL");

    let mut conn = state.db.get().map_err(internal)?;
    let flights = load_window(&mut conn, start, end)?;

    let mut rows = Vec::new();
    for flight in flights.iter().filter(|f| {
        zone_visible(f, zone)
            && type_matches(f, query.flight_type.as_deref())
            && query_matches(f, query.q.as_deref())
    }) {
        let view = FlightView::from(flight);
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
    pub assignment: Option<String>,
    pub pax: Option<i32>,
    pub watchlist: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_LEAD)?;
    if req.key.is_empty() {
        return Err(ApiError::BadRequest("Missing key".into()));
    }

    let mut conn = state.db.get().map_err(internal)?;
    find_flight(&mut conn, &req.key)?;

    let now_iso = opsday::utc_iso(Utc::now());
    let mut changes = LeadUpdate {
        updated_at: Some(now_iso.clone()),
        ..Default::default()
    };
    let mut patch = Map::new();

    if let Some(new_assignment) = req.assignment {
        changes.assign_edited_by = Some(claims.sub.clone());
        changes.assign_edited_at = Some(now_iso.clone());
        patch.insert("assignment".into(), new_assignment.clone().into());
        patch.insert("assignEditedBy".into(), claims.sub.clone().into());
        patch.insert("assignEditedAt".into(), now_iso.clone().into());
        changes.assignment = Some(new_assignment);
    }
    if let Some(new_pax) = req.pax {
        changes.pax_assisted = Some(new_pax);
        patch.insert("paxAssisted".into(), new_pax.into());
    }
    if let Some(new_watchlist) = req.watchlist {
        patch.insert("watchlist".into(), new_watchlist.clone().into());
        changes.watchlist = Some(new_watchlist);
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
    pub zone: String,
}

fn board_patch_field(zone: &str) -> &'static str {
    match zone {
        "Pier A" => "pieraAck",
        "TB" => "tbAck",
        "Gates" => "gatesAck",
        "T1" => "t1Ack",
        _ => "unassignedAck",
    }
}

/// Sets the zone board's ACK flag and, when the board being acknowledged is
/// the flight's carry-over zone, clears the carry-over slot. Returns whether
/// the slot was cleared.
fn apply_lead_ack(
    conn: &mut diesel::sqlite::SqliteConnection,
    flight_key: &str,
    zone: &str,
    now_iso: &str,
) -> Result<bool, ApiError> {
    let existing = find_flight(conn, flight_key)?;
    if existing.board_ack(zone).is_none() {
        return Err(ApiError::BadRequest(format!("Unknown zone '{zone}'")));
    }

    // Acknowledging the zone a flight moved away from discharges its
    // carry-over slot.
    let clear_prev = existing.zone_prev == zone && existing.zone_current != zone;

    use crate::schema::flights::dsl::*;
    match zone {
        "Pier A" => diesel::update(flights.find(flight_key))
            .set((piera_ack.eq(true), updated_at.eq(now_iso)))
            .execute(conn),
        "TB" => diesel::update(flights.find(flight_key))
            .set((tb_ack.eq(true), updated_at.eq(now_iso)))
            .execute(conn),
        "Gates" => diesel::update(flights.find(flight_key))
            .set((gates_ack.eq(true), updated_at.eq(now_iso)))
            .execute(conn),
        "T1" => diesel::update(flights.find(flight_key))
            .set((t1_ack.eq(true), updated_at.eq(now_iso)))
            .execute(conn),
        _ => diesel::update(flights.find(flight_key))
            .set((unassigned_ack.eq(true), updated_at.eq(now_iso)))
            .execute(conn),
    }
    .map_err(internal)?;

    if clear_prev {
        diesel::update(flights.find(flight_key))
            .set(zone_prev.eq(""))
            .execute(conn)
            .map_err(internal)?;
    }

    Ok(clear_prev)
}

pub async fn ack(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AckRequest>,
) -> Result<Json<Value>, ApiError> {
    require_app(&claims, APP_LEAD)?;
    if req.key.is_empty() {
        return Err(ApiError::BadRequest("Missing key".into()));
    }

    let mut conn = state.db.get().map_err(internal)?;
    let now_iso = opsday::utc_iso(Utc::now());
    let cleared = apply_lead_ack(&mut conn, &req.key, &req.zone, &now_iso)?;

    let mut patch = Map::new();
    patch.insert(board_patch_field(&req.zone).into(), true.into());
    if cleared {
        patch.insert("zonePrev".into(), "".into());
    }
    state.overlay.install(&req.key, Value::Object(patch)).await;

    Ok(Json(json!({"ok": true})))
}
