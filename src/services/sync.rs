//! The FIDS reconciler.
//!
//! One run reads a consistent snapshot of the flights table, diffs it against
//! the freshly fetched window, and applies the result as batched inserts and
//! updates. The diff itself is pure (`plan_sync`), which is where all the
//! change-detection, ACK-reset, and carry-over rules live. Manual user fields
//! are outside `SyncChangeset` and therefore untouchable from here.

use crate::models::{Flight, SyncChangeset};
use crate::opsday;
use crate::services::fids::{self, FidsBatch, FidsFlight};
use crate::zones;
use crate::AppState;
use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::collections::{HashMap, HashSet};

const BATCH_SIZE: usize = 100;
/// Estimated-time movements below this many minutes are noise, not alerts.
const TIME_CHANGE_THRESHOLD_MIN: i64 = 20;

#[derive(Debug, Default)]
pub struct SyncPlan {
    pub inserts: Vec<Flight>,
    pub updates: Vec<(String, SyncChangeset)>,
}

/// Provider timestamps arrive as RFC 3339, as "YYYY-MM-DD HH:MM±hh:mm", or
/// as "YYYY-MM-DD HH:MMZ", with or without seconds.
pub fn parse_fids_time(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().replace(' ', "T");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%#z", "%Y-%m-%dT%H:%M%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Some(stripped) = s.strip_suffix('Z') {
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
    }
    None
}

struct Incoming {
    flight_no: String,
    sched_utc: DateTime<Utc>,
    sched_iso: String,
    est_utc: DateTime<Utc>,
    est_iso: String,
    origin_dest: String,
    gate: String,
    zone: String,
}

fn prepare(
    flight_type: &str,
    rec: &FidsFlight,
    overrides: &HashMap<String, String>,
    us_codes: &HashSet<String>,
) -> Option<Incoming> {
    if rec.flight.trim().is_empty() {
        return None;
    }
    let sched_utc = parse_fids_time(&rec.sched)?;
    let est_utc = parse_fids_time(&rec.est).unwrap_or(sched_utc);
    let region = zones::region_of(&rec.origin_dest, us_codes);
    let zone = zones::classify(flight_type, &rec.gate, &rec.terminal, region, overrides);

    Some(Incoming {
        flight_no: rec.flight.clone(),
        sched_utc,
        sched_iso: opsday::utc_iso(sched_utc),
        est_utc,
        est_iso: opsday::utc_iso(est_utc),
        origin_dest: rec.origin_dest.clone(),
        gate: rec.gate.clone(),
        zone,
    })
}

fn new_flight(key: String, flight_type: &str, inc: &Incoming, now_iso: &str) -> Flight {
    Flight {
        key,
        flight_type: flight_type.to_string(),
        flight_no: inc.flight_no.clone(),
        time_sched: inc.sched_iso.clone(),
        time_est: inc.est_iso.clone(),
        origin_dest: inc.origin_dest.clone(),
        gate: inc.gate.clone(),
        zone_current: inc.zone.clone(),
        // Initial-zone snapshot; sync never writes this column again.
        zone_previous: inc.zone.clone(),
        zone_prev: String::new(),
        gate_changed: false,
        gate_chg_at: String::new(),
        gate_chg_from_gate: String::new(),
        gate_chg_to_gate: String::new(),
        gate_chg_from_zone: String::new(),
        gate_chg_to_zone: String::new(),
        zone_changed: false,
        zone_chg_at: String::new(),
        zone_chg_from: String::new(),
        zone_chg_to: String::new(),
        time_changed: false,
        time_chg_at: String::new(),
        time_prev_est: String::new(),
        time_delta_min: None,
        alert_text: String::new(),
        wchr: 0,
        wchc: 0,
        prev_wchr: 0,
        prev_wchc: 0,
        comment: String::new(),
        assignment: String::new(),
        pax_assisted: 0,
        watchlist: String::new(),
        assign_edited_by: String::new(),
        assign_edited_at: String::new(),
        dispatch_ack: false,
        piera_ack: false,
        tb_ack: false,
        t1_ack: false,
        unassigned_ack: false,
        gates_ack: false,
        created_at: now_iso.to_string(),
        updated_at: now_iso.to_string(),
    }
}

fn carry_forward(old: &Flight, inc: &Incoming, now_iso: &str) -> SyncChangeset {
    SyncChangeset {
        flight_no: inc.flight_no.clone(),
        time_sched: inc.sched_iso.clone(),
        time_est: inc.est_iso.clone(),
        origin_dest: inc.origin_dest.clone(),
        gate: inc.gate.clone(),
        zone_current: old.zone_current.clone(),
        zone_prev: old.zone_prev.clone(),
        gate_changed: old.gate_changed,
        gate_chg_at: old.gate_chg_at.clone(),
        gate_chg_from_gate: old.gate_chg_from_gate.clone(),
        gate_chg_to_gate: old.gate_chg_to_gate.clone(),
        gate_chg_from_zone: old.gate_chg_from_zone.clone(),
        gate_chg_to_zone: old.gate_chg_to_zone.clone(),
        zone_changed: old.zone_changed,
        zone_chg_at: old.zone_chg_at.clone(),
        zone_chg_from: old.zone_chg_from.clone(),
        zone_chg_to: old.zone_chg_to.clone(),
        time_changed: old.time_changed,
        time_chg_at: old.time_chg_at.clone(),
        time_prev_est: old.time_prev_est.clone(),
        time_delta_min: old.time_delta_min,
        alert_text: old.alert_text.clone(),
        dispatch_ack: old.dispatch_ack,
        piera_ack: old.piera_ack,
        tb_ack: old.tb_ack,
        t1_ack: old.t1_ack,
        unassigned_ack: old.unassigned_ack,
        gates_ack: old.gates_ack,
        updated_at: now_iso.to_string(),
    }
}

/// Diffs one existing row against its incoming record.
fn update_for(old: &Flight, inc: &Incoming, now_iso: &str) -> SyncChangeset {
    let mut cs = carry_forward(old, inc, now_iso);
    let mut any_new_change = false;

    let old_gate = zones::normalize_gate(&old.gate);
    let new_gate = zones::normalize_gate(&inc.gate);
    if !old_gate.is_empty() && !new_gate.is_empty() && old_gate != new_gate {
        cs.gate_changed = true;
        cs.gate_chg_at = now_iso.to_string();
        cs.gate_chg_from_gate = old.gate.clone();
        cs.gate_chg_to_gate = inc.gate.clone();
        cs.gate_chg_from_zone = old.zone_current.clone();
        any_new_change = true;
    }

    if !old.zone_current.is_empty() && !inc.zone.is_empty() && old.zone_current != inc.zone {
        // Carry-over: the previous zone slot is only overwritten once its
        // board has acknowledged (or the slot is empty).
        if cs.zone_prev.is_empty() || old.board_ack(&cs.zone_prev).unwrap_or(true) {
            cs.zone_prev = old.zone_current.clone();
        }
        cs.zone_current = inc.zone.clone();
        cs.zone_changed = true;
        cs.zone_chg_at = now_iso.to_string();
        cs.zone_chg_from = old.zone_current.clone();
        cs.zone_chg_to = inc.zone.clone();
        any_new_change = true;
    }

    if cs.gate_changed {
        cs.gate_chg_to_zone = cs.zone_current.clone();
    }

    if let Some(old_est) = opsday::parse_utc(&old.time_est) {
        let delta_min =
            ((inc.est_utc - old_est).num_seconds() as f64 / 60.0).round() as i64;
        if delta_min.abs() >= TIME_CHANGE_THRESHOLD_MIN {
            cs.time_prev_est = old.time_est.clone();
            cs.time_changed = true;
            cs.time_delta_min = Some(delta_min as i32);
            cs.time_chg_at = now_iso.to_string();
            any_new_change = true;
        }
    }

    if any_new_change {
        cs.dispatch_ack = false;
        cs.piera_ack = false;
        cs.tb_ack = false;
        cs.t1_ack = false;
        cs.unassigned_ack = false;
        cs.gates_ack = false;
    }

    cs.alert_text = build_alert(&cs);
    cs
}

/// Alert text is a pure function of the three change-flag triples.
fn build_alert(cs: &SyncChangeset) -> String {
    let mut parts = Vec::new();
    if cs.gate_changed && (!cs.gate_chg_from_gate.is_empty() || !cs.gate_chg_to_gate.is_empty()) {
        parts.push(format!(
            "Gate: {} -> {}",
            cs.gate_chg_from_gate, cs.gate_chg_to_gate
        ));
    }
    if cs.zone_changed && (!cs.zone_chg_from.is_empty() || !cs.zone_chg_to.is_empty()) {
        parts.push(format!("Zone: {} -> {}", cs.zone_chg_from, cs.zone_chg_to));
    }
    if cs.time_changed {
        if let Some(delta) = cs.time_delta_min {
            parts.push(format!("TimeDelta: {} min", delta));
        }
    }
    parts.join(" | ")
}

/// Pure diff of the fetched window against the current table snapshot.
pub fn plan_sync(
    existing: &HashMap<String, Flight>,
    batch: &FidsBatch,
    overrides: &HashMap<String, String>,
    us_codes: &HashSet<String>,
    now: DateTime<Utc>,
    tz: Tz,
) -> SyncPlan {
    let now_iso = opsday::utc_iso(now);
    let mut plan = SyncPlan::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (flight_type, records) in [("ARR", &batch.arrivals), ("DEP", &batch.departures)] {
        for rec in records {
            let Some(inc) = prepare(flight_type, rec, overrides, us_codes) else {
                continue;
            };
            let key = opsday::flight_key(flight_type, &inc.flight_no, inc.sched_utc, tz);
            if !seen.insert(key.clone()) {
                continue;
            }
            match existing.get(&key) {
                None => plan.inserts.push(new_flight(key, flight_type, &inc, &now_iso)),
                Some(old) => plan.updates.push((key, update_for(old, &inc, &now_iso))),
            }
        }
    }

    plan
}

/// Applies a plan in batches of 100 statements.
pub fn apply_plan(conn: &mut SqliteConnection, plan: &SyncPlan) -> Result<(usize, usize)> {
    use crate::schema::flights::dsl::*;

    let mut inserted = 0;
    for chunk in plan.inserts.chunks(BATCH_SIZE) {
        inserted += conn.transaction::<usize, diesel::result::Error, _>(|conn| {
            diesel::insert_into(crate::schema::flights::table)
                .values(chunk)
                .execute(conn)
        })?;
    }

    let mut updated = 0;
    for chunk in plan.updates.chunks(BATCH_SIZE) {
        updated += conn.transaction::<usize, diesel::result::Error, _>(|conn| {
            let mut count = 0;
            for (row_key, changes) in chunk {
                count += diesel::update(flights.find(row_key)).set(changes).execute(conn)?;
            }
            Ok(count)
        })?;
    }

    Ok((inserted, updated))
}

pub fn load_existing(conn: &mut SqliteConnection) -> Result<HashMap<String, Flight>> {
    use crate::schema::flights::dsl::*;
    let rows = flights.select(Flight::as_select()).load::<Flight>(conn)?;
    Ok(rows.into_iter().map(|f| (f.key.clone(), f)).collect())
}

pub fn load_overrides(conn: &mut SqliteConnection) -> Result<HashMap<String, String>> {
    use crate::schema::zone_overrides::dsl::*;
    let rows = zone_overrides
        .select(crate::models::ZoneOverride::as_select())
        .load::<crate::models::ZoneOverride>(conn)?;
    Ok(rows.into_iter().map(|o| (o.gate, o.zone)).collect())
}

pub fn load_us_codes(conn: &mut SqliteConnection) -> Result<HashSet<String>> {
    use crate::schema::us_airport_codes::dsl::*;
    let rows = us_airport_codes.select(code).load::<String>(conn)?;
    Ok(rows.into_iter().collect())
}

/// One full fetch-and-reconcile pass over the current sync window.
pub async fn run_full_sync(state: &AppState) -> Result<(usize, usize)> {
    let tz = state.config.tz()?;
    let now = Utc::now();
    let (from, to) = opsday::sync_window(now, tz);

    let batch = fids::fetch_window(state.fids.as_ref(), from, to).await?;

    let mut conn = state.db.get()?;
    let existing = load_existing(&mut conn)?;
    let overrides = load_overrides(&mut conn)?;
    let us_codes = load_us_codes(&mut conn)?;

    let plan = plan_sync(&existing, &batch, &overrides, &us_codes, now, tz);
    let (inserted, updated) = apply_plan(&mut conn, &plan)?;
    tracing::info!(inserted, updated, "FIDS sync applied");
    Ok((inserted, updated))
}
