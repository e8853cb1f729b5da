//! Operational-day and query-window arithmetic.
//!
//! Instants are stored as UTC ISO-8601 strings at second precision, which
//! keeps lexicographic ordering equal to chronological ordering for the
//! `time_est` range queries. All human-facing windowing happens in the
//! airport's local zone; the ops day runs from local 03:00 to 02:59:59 the
//! next morning, so requests before 03:00 belong to the previous ops day.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Local hour at which a new ops day begins.
pub const OPS_DAY_START_HOUR: u32 = 3;

pub fn utc_iso(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Converts a local wall-clock tuple to UTC. Ambiguous fall-back instants
/// resolve to the earlier candidate; instants skipped by spring-forward are
/// pushed one hour later.
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                // No zone in the tz database skips more than an hour.
                None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

/// The ops day the given instant belongs to.
pub fn ops_day_for(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    let local = now.with_timezone(&tz);
    let date = local.date_naive();
    if local.hour() < OPS_DAY_START_HOUR {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// UTC span of one ops day: local 03:00:00 on D through 02:59:59 on D+1.
pub fn ops_day_span(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(
        tz,
        date,
        NaiveTime::from_hms_opt(OPS_DAY_START_HOUR, 0, 0).unwrap(),
    );
    let next = date.succ_opt().unwrap_or(date);
    let end = local_to_utc(
        tz,
        next,
        NaiveTime::from_hms_opt(OPS_DAY_START_HOUR - 1, 59, 59).unwrap(),
    );
    (start, end)
}

fn parse_hhmm(raw: &str) -> Result<(u32, u32)> {
    let (h, m) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid time '{}', expected HH:MM", raw))?;
    let hour: u32 = h.parse().map_err(|_| anyhow!("Invalid hour in '{}'", raw))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| anyhow!("Invalid minute in '{}'", raw))?;
    if hour > 23 || minute > 59 {
        return Err(anyhow!("Time '{}' out of range", raw));
    }
    Ok((hour, minute))
}

/// Calendar day a local HH:MM lands on: hours before 03:00 fall on the next
/// calendar day of the same ops day.
fn day_for_local_hour(ops_day: NaiveDate, hour: u32) -> NaiveDate {
    if hour < OPS_DAY_START_HOUR {
        ops_day.succ_opt().unwrap_or(ops_day)
    } else {
        ops_day
    }
}

/// Resolves the window for a read request.
///
/// `ops_day = "next"` shifts the base day forward. The default start is
/// capped to one hour of lookback, but only when the caller supplied no
/// explicit `from_time` and is not asking for tomorrow.
pub fn query_window(
    now: DateTime<Utc>,
    tz: Tz,
    from_time: Option<&str>,
    to_time: Option<&str>,
    ops_day: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = matches!(ops_day, Some("next"));
    let mut base = ops_day_for(now, tz);
    if next {
        base = base.succ_opt().unwrap_or(base);
    }
    let (day_start, day_end) = ops_day_span(base, tz);

    let start = match from_time {
        Some(raw) => {
            let (hour, minute) = parse_hhmm(raw)?;
            local_to_utc(
                tz,
                day_for_local_hour(base, hour),
                NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            )
        }
        None => {
            let lookback = now - Duration::hours(1);
            if !next && lookback > day_start {
                lookback
            } else {
                day_start
            }
        }
    };

    let end = match to_time {
        Some(raw) => {
            let (hour, minute) = parse_hhmm(raw)?;
            local_to_utc(
                tz,
                day_for_local_hour(base, hour),
                NaiveTime::from_hms_opt(hour, minute, 59).unwrap(),
            )
        }
        None => day_end,
    };

    Ok((start, end))
}

/// Window for FIDS sync and archive: the full ops day with no lookback cap.
/// From local noon onward (and through the small hours) the window also
/// covers the following ops day, pre-loading tomorrow's flights.
pub fn sync_window(now: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let base = ops_day_for(now, tz);
    let (start, mut end) = ops_day_span(base, tz);
    let local_hour = now.with_timezone(&tz).hour();
    if local_hour >= 12 || local_hour < OPS_DAY_START_HOUR {
        let next = base.succ_opt().unwrap_or(base);
        end = ops_day_span(next, tz).1;
    }
    (start, end)
}

/// Builds the immutable row key: `YYYY-MM-DD|TYPE|FLIGHT|HH:mm` with the
/// date and time rendered in the local zone and the date backshifted for
/// small-hours flights belonging to the previous ops day.
pub fn flight_key(flight_type: &str, flight_no: &str, sched: DateTime<Utc>, tz: Tz) -> String {
    let local = sched.with_timezone(&tz);
    let mut date = local.date_naive();
    if local.hour() < OPS_DAY_START_HOUR {
        date = date.pred_opt().unwrap_or(date);
    }
    format!(
        "{}|{}|{}|{}",
        date.format("%Y-%m-%d"),
        flight_type,
        flight_no,
        local.format("%H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toronto() -> Tz {
        "America/Toronto".parse().unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        parse_utc(s).unwrap()
    }

    #[test]
    fn key_renders_local_date_and_time() {
        let key = flight_key("ARR", "WS 816", utc("2025-02-25T11:30:00Z"), toronto());
        assert_eq!(key, "2025-02-25|ARR|WS 816|06:30");
    }

    #[test]
    fn key_backshifts_small_hours_to_previous_ops_day() {
        // 01:30 local on Feb 26 belongs to the Feb 25 ops day.
        let key = flight_key("DEP", "AC 123", utc("2025-02-26T06:30:00Z"), toronto());
        assert_eq!(key, "2025-02-25|DEP|AC 123|01:30");
    }

    #[test]
    fn ops_day_rolls_at_local_three() {
        // 02:59 local.
        assert_eq!(
            ops_day_for(utc("2025-02-25T07:59:00Z"), toronto()),
            NaiveDate::from_ymd_opt(2025, 2, 24).unwrap()
        );
        // 03:00 local.
        assert_eq!(
            ops_day_for(utc("2025-02-25T08:00:00Z"), toronto()),
            NaiveDate::from_ymd_opt(2025, 2, 25).unwrap()
        );
    }

    #[test]
    fn ops_day_span_in_winter() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 24).unwrap();
        let (start, end) = ops_day_span(date, toronto());
        assert_eq!(utc_iso(start), "2025-02-24T08:00:00Z");
        assert_eq!(utc_iso(end), "2025-02-25T07:59:59Z");
    }

    #[test]
    fn local_round_trip_holds_across_dst() {
        let tz = toronto();
        // Fall-back morning: 01:30 occurs twice; we take the earlier.
        let date = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
        let time = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
        let utc_dt = local_to_utc(tz, date, time);
        assert_eq!(utc_iso(utc_dt), "2025-11-02T05:30:00Z");
        let local = utc_dt.with_timezone(&tz);
        assert_eq!(local.date_naive(), date);
        assert_eq!(local.time(), time);

        // Ordinary winter instant round-trips exactly.
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let time = NaiveTime::from_hms_opt(1, 30, 0).unwrap();
        let local = local_to_utc(tz, date, time).with_timezone(&tz);
        assert_eq!((local.date_naive(), local.time()), (date, time));
    }

    #[test]
    fn spring_forward_gap_shifts_an_hour() {
        // 02:30 on 2025-03-09 does not exist in Toronto.
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let time = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let utc_dt = local_to_utc(toronto(), date, time);
        assert_eq!(utc_iso(utc_dt), "2025-03-09T07:30:00Z");
    }

    #[test]
    fn default_window_caps_lookback_to_one_hour() {
        // 10:00 local; ops day started at 03:00 local.
        let now = utc("2025-02-25T15:00:00Z");
        let (start, end) = query_window(now, toronto(), None, None, None).unwrap();
        assert_eq!(utc_iso(start), "2025-02-25T14:00:00Z");
        assert_eq!(utc_iso(end), "2025-02-26T07:59:59Z");
    }

    #[test]
    fn early_morning_default_window_has_no_cap_effect() {
        // 03:30 local: now - 1h predates the ops-day start, so the start
        // stays at 03:00 local.
        let now = utc("2025-02-25T08:30:00Z");
        let (start, _) = query_window(now, toronto(), None, None, None).unwrap();
        assert_eq!(utc_iso(start), "2025-02-25T08:00:00Z");
    }

    #[test]
    fn explicit_from_time_disables_the_cap() {
        let now = utc("2025-02-25T15:00:00Z");
        let (start, _) = query_window(now, toronto(), Some("04:00"), None, None).unwrap();
        assert_eq!(utc_iso(start), "2025-02-25T09:00:00Z");
    }

    #[test]
    fn small_hours_from_time_lands_on_next_calendar_day() {
        let now = utc("2025-02-25T15:00:00Z");
        let (start, end) =
            query_window(now, toronto(), Some("01:30"), Some("02:15"), None).unwrap();
        assert_eq!(utc_iso(start), "2025-02-26T06:30:00Z");
        assert_eq!(utc_iso(end), "2025-02-26T07:15:59Z");
    }

    #[test]
    fn to_time_extends_to_end_of_minute() {
        let now = utc("2025-02-25T15:00:00Z");
        let (_, end) = query_window(now, toronto(), None, Some("13:45"), None).unwrap();
        assert_eq!(utc_iso(end), "2025-02-25T18:45:59Z");
    }

    #[test]
    fn next_ops_day_shifts_base_and_skips_cap() {
        let now = utc("2025-02-25T15:00:00Z");
        let (start, end) = query_window(now, toronto(), None, None, Some("next")).unwrap();
        assert_eq!(utc_iso(start), "2025-02-26T08:00:00Z");
        assert_eq!(utc_iso(end), "2025-02-27T07:59:59Z");
    }

    #[test]
    fn malformed_times_are_rejected() {
        let now = utc("2025-02-25T15:00:00Z");
        assert!(query_window(now, toronto(), Some("25:00"), None, None).is_err());
        assert!(query_window(now, toronto(), Some("bogus"), None, None).is_err());
    }

    #[test]
    fn sync_window_preloads_tomorrow_after_noon() {
        // 10:00 local: one ops day only.
        let (s, e) = sync_window(utc("2025-02-25T15:00:00Z"), toronto());
        assert_eq!(utc_iso(s), "2025-02-25T08:00:00Z");
        assert_eq!(utc_iso(e), "2025-02-26T07:59:59Z");

        // 13:00 local: extends through tomorrow's ops day.
        let (s, e) = sync_window(utc("2025-02-25T18:00:00Z"), toronto());
        assert_eq!(utc_iso(s), "2025-02-25T08:00:00Z");
        assert_eq!(utc_iso(e), "2025-02-27T07:59:59Z");

        // 01:00 local: previous ops day is the base, still pre-loading.
        let (s, e) = sync_window(utc("2025-02-25T06:00:00Z"), toronto());
        assert_eq!(utc_iso(s), "2025-02-24T08:00:00Z");
        assert_eq!(utc_iso(e), "2025-02-26T07:59:59Z");
    }
}
