//! Background loops standing in for cron.
//!
//! A 60-second tick drives the FIDS sync; a second tick fires the archive
//! job once per ops day after local 03:30. Failures are logged and the next
//! tick reconciles.

use crate::services::{archive, sync};
use crate::AppState;
use chrono::{NaiveDate, Timelike, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

const TICK_SECS: u64 = 60;
const ARCHIVE_LOCAL_HOUR: u32 = 3;
const ARCHIVE_LOCAL_MINUTE: u32 = 30;

/// Fires a sync every minute. A provider latency spike can outlast the tick,
/// so runs are spawned behind a best-effort in-flight guard.
pub async fn run_sync_loop(state: AppState) {
    let running = Arc::new(AtomicBool::new(false));
    let mut tick = interval(Duration::from_secs(TICK_SECS));

    // The first tick completes immediately, syncing once at startup.
    loop {
        tick.tick().await;

        if running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Previous FIDS sync still running, skipping tick");
            continue;
        }

        let state = state.clone();
        let running = running.clone();
        tokio::spawn(async move {
            if let Err(e) = sync::run_full_sync(&state).await {
                tracing::error!("FIDS sync failed: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });
    }
}

/// Runs the archive once per ops day, at or after local 03:30. A service
/// restarted later in the day catches up on its first pass; the job itself
/// is idempotent.
pub async fn run_archive_loop(state: AppState) {
    let mut tick = interval(Duration::from_secs(TICK_SECS));
    let mut last_run: Option<NaiveDate> = None;

    loop {
        tick.tick().await;

        let tz = match state.config.tz() {
            Ok(tz) => tz,
            Err(e) => {
                tracing::error!("Archive loop: {e}");
                continue;
            }
        };

        let now = Utc::now();
        let local = now.with_timezone(&tz);
        let due = local.hour() > ARCHIVE_LOCAL_HOUR
            || (local.hour() == ARCHIVE_LOCAL_HOUR && local.minute() >= ARCHIVE_LOCAL_MINUTE);
        if !due {
            continue;
        }

        let ops_day = crate::opsday::ops_day_for(now, tz);
        if last_run == Some(ops_day) {
            continue;
        }

        match archive::run_archive(&state).await {
            Ok(_) => last_run = Some(ops_day),
            Err(e) => tracing::error!("Archive job failed: {e}"),
        }
    }
}
