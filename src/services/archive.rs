//! Nightly archive of the completed ops day.
//!
//! Moves every flight whose estimated time fell inside yesterday's ops day
//! into the archive table as a JSON snapshot, then removes the live rows.
//! Existing archive rows for the same date are deleted first, so a rerun
//! after a partial failure converges instead of duplicating.

use crate::models::{Flight, NewArchiveRow};
use crate::opsday;
use crate::AppState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

const BATCH_SIZE: usize = 100;

/// Archives the ops day that ended this morning. Returns the ops date and
/// how many flights were moved.
pub fn archive_completed_day(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<(String, usize)> {
    let today = opsday::ops_day_for(now, tz);
    let target = today.pred_opt().unwrap_or(today);
    let ops_date = target.format("%Y-%m-%d").to_string();
    let (start, end) = opsday::ops_day_span(target, tz);

    let rows: Vec<Flight> = {
        use crate::schema::flights::dsl::*;
        flights
            .filter(time_est.between(opsday::utc_iso(start), opsday::utc_iso(end)))
            .select(Flight::as_select())
            .load(conn)?
    };

    if rows.is_empty() {
        tracing::info!(%ops_date, "No flights to archive");
        return Ok((ops_date, 0));
    }

    // Rerun-safe: drop anything a previous (possibly partial) run left.
    {
        use crate::schema::archive::dsl;
        diesel::delete(dsl::archive.filter(dsl::ops_date.eq(&ops_date))).execute(conn)?;
    }

    let archived_at = opsday::utc_iso(now);
    let snapshots: Vec<NewArchiveRow> = rows
        .iter()
        .map(|f| {
            Ok(NewArchiveRow {
                ops_date: ops_date.clone(),
                archived_at: archived_at.clone(),
                flight_data: serde_json::to_string(f)?,
            })
        })
        .collect::<Result<_>>()?;

    for chunk in snapshots.chunks(BATCH_SIZE) {
        diesel::insert_into(crate::schema::archive::table)
            .values(chunk)
            .execute(conn)?;
    }

    let keys: Vec<&String> = rows.iter().map(|f| &f.key).collect();
    for chunk in keys.chunks(BATCH_SIZE) {
        use crate::schema::flights::dsl::*;
        diesel::delete(flights.filter(key.eq_any(chunk.iter().copied()))).execute(conn)?;
    }

    tracing::info!(%ops_date, flights = rows.len(), "Archived completed ops day");
    Ok((ops_date, rows.len()))
}

pub async fn run_archive(state: &AppState) -> Result<(String, usize)> {
    let tz = state.config.tz()?;
    let mut conn = state.db.get()?;
    archive_completed_day(&mut conn, Utc::now(), tz)
}
