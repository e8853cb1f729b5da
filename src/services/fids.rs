//! FIDS retrieval from AeroDataBox.
//!
//! The provider caps each request at a 12-hour window, so the full sync
//! window is fetched as back-to-back segments, each paged at 300 records.
//! Only watched-airline, non-codeshare flights are kept, deduped by
//! (normalized number, scheduled time) per direction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

pub const AIRPORT: &str = "YYZ";
const HOST: &str = "https://aerodatabox.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "aerodatabox.p.rapidapi.com";

const SEGMENT_HOURS: i64 = 12;
const PAGE_LIMIT: usize = 300;
const MAX_PAGES: usize = 4;
const MAX_KEPT: usize = 500;
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Carriers this service tracks; everything else is filtered at ingestion.
pub const WATCHED_AIRLINES: [&str; 24] = [
    "AF", "BG", "2T", "BW", "CA", "MU", "HU", "AU", "DL", "LH", "EY", "BR", "F8", "AZ", "KL",
    "PR", "PD", "S4", "SV", "LX", "TK", "TS", "VS", "WS",
];

#[derive(Debug, Error)]
pub enum FidsError {
    #[error("FIDS provider returned HTTP {0}")]
    Provider(u16),
    #[error("FIDS transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FidsPage {
    #[serde(default)]
    pub arrivals: Vec<FidsRecord>,
    #[serde(default)]
    pub departures: Vec<FidsRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FidsRecord {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub codeshare_status: String,
    pub movement: Option<FidsMovement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FidsMovement {
    pub scheduled_time: Option<FidsTime>,
    pub revised_time: Option<FidsTime>,
    pub airport: Option<FidsAirport>,
    #[serde(default)]
    pub terminal: String,
    #[serde(default)]
    pub gate: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FidsTime {
    pub utc: Option<String>,
    pub local: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FidsAirport {
    pub iata: Option<String>,
}

/// One kept flight, reshaped for the sync engine. Times are provider
/// strings, preferring the airport-local form; the sync engine normalizes
/// them to UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct FidsFlight {
    pub flight: String,
    pub origin_dest: String,
    pub sched: String,
    pub est: String,
    pub terminal: String,
    pub gate: String,
}

#[derive(Debug, Default)]
pub struct FidsBatch {
    pub arrivals: Vec<FidsFlight>,
    pub departures: Vec<FidsFlight>,
}

#[async_trait]
pub trait FidsProvider: Send + Sync {
    async fn fetch_page(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<FidsPage, FidsError>;
}

pub struct AeroDataBox {
    client: reqwest::Client,
    api_key: String,
    tz: Tz,
}

impl AeroDataBox {
    pub fn new(api_key: String, tz: Tz) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("reqwest client");
        AeroDataBox {
            client,
            api_key,
            tz,
        }
    }
}

#[async_trait]
impl FidsProvider for AeroDataBox {
    async fn fetch_page(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<FidsPage, FidsError> {
        let from_local = from.with_timezone(&self.tz).format("%Y-%m-%dT%H:%M");
        let to_local = to.with_timezone(&self.tz).format("%Y-%m-%dT%H:%M");
        let url = format!("{HOST}/flights/airports/iata/{AIRPORT}/{from_local}/{to_local}");

        let res = self
            .client
            .get(&url)
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("direction", "Both".to_string()),
                ("withCodeshared", "true".to_string()),
                ("withCancelled", "false".to_string()),
            ])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(FidsError::Provider(res.status().as_u16()));
        }

        Ok(res.json::<FidsPage>().await?)
    }
}

/// Uppercases and strips whitespace: "ws 816" -> "WS816".
pub fn normalize_flight_no(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Display form with a space after the two-letter carrier code.
pub fn format_flight_no(raw: &str) -> String {
    let normalized = normalize_flight_no(raw);
    if normalized.len() > 2 {
        format!("{} {}", &normalized[..2], &normalized[2..])
    } else {
        normalized
    }
}

fn is_watched(normalized: &str) -> bool {
    normalized.len() >= 2 && WATCHED_AIRLINES.contains(&&normalized[..2])
}

fn reshape_record(rec: &FidsRecord) -> Option<FidsFlight> {
    let movement = rec.movement.as_ref()?;
    let sched_time = movement.scheduled_time.as_ref()?;
    let sched = sched_time
        .local
        .clone()
        .or_else(|| sched_time.utc.clone())?;
    let est = movement
        .revised_time
        .as_ref()
        .and_then(|t| t.local.clone().or_else(|| t.utc.clone()))
        .unwrap_or_else(|| sched.clone());

    Some(FidsFlight {
        flight: format_flight_no(&rec.number),
        origin_dest: movement
            .airport
            .as_ref()
            .and_then(|a| a.iata.clone())
            .unwrap_or_default(),
        sched,
        est,
        terminal: movement.terminal.clone(),
        gate: movement.gate.clone(),
    })
}

fn keep_records(
    records: &[FidsRecord],
    out: &mut Vec<FidsFlight>,
    seen: &mut HashSet<(String, String)>,
    kept: &mut usize,
) {
    for rec in records {
        let normalized = normalize_flight_no(&rec.number);
        if !is_watched(&normalized) {
            continue;
        }
        if rec.codeshare_status.to_lowercase().contains("codeshared") {
            continue;
        }
        let Some(flight) = reshape_record(rec) else {
            continue;
        };
        if !seen.insert((normalized, flight.sched.clone())) {
            continue;
        }
        out.push(flight);
        *kept += 1;
    }
}

/// Fetches and reshapes the whole window. Paging stops early on a short page
/// or once 500 kept records have accumulated across the run.
pub async fn fetch_window(
    provider: &dyn FidsProvider,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<FidsBatch, FidsError> {
    let mut batch = FidsBatch::default();
    let mut seen_arr: HashSet<(String, String)> = HashSet::new();
    let mut seen_dep: HashSet<(String, String)> = HashSet::new();
    let mut kept = 0usize;

    let mut seg_start = from;
    while seg_start < to && kept < MAX_KEPT {
        let seg_end = (seg_start + Duration::hours(SEGMENT_HOURS)).min(to);

        for page in 0..MAX_PAGES {
            let result = provider
                .fetch_page(seg_start, seg_end, page * PAGE_LIMIT, PAGE_LIMIT)
                .await?;
            let combined = result.arrivals.len() + result.departures.len();

            keep_records(&result.arrivals, &mut batch.arrivals, &mut seen_arr, &mut kept);
            keep_records(&result.departures, &mut batch.departures, &mut seen_dep, &mut kept);

            if combined < PAGE_LIMIT || kept >= MAX_KEPT {
                break;
            }
        }

        seg_start = seg_end;
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record(number: &str, sched_local: &str) -> FidsRecord {
        FidsRecord {
            number: number.to_string(),
            codeshare_status: String::new(),
            movement: Some(FidsMovement {
                scheduled_time: Some(FidsTime {
                    utc: Some("2025-02-25 11:30Z".to_string()),
                    local: Some(sched_local.to_string()),
                }),
                revised_time: None,
                airport: Some(FidsAirport {
                    iata: Some("YEG".to_string()),
                }),
                terminal: "1".to_string(),
                gate: "B3".to_string(),
            }),
        }
    }

    struct FakeProvider {
        pages: Mutex<Vec<FidsPage>>,
        calls: Mutex<usize>,
    }

    impl FakeProvider {
        fn new(pages: Vec<FidsPage>) -> Self {
            FakeProvider {
                pages: Mutex::new(pages),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl FidsProvider for FakeProvider {
        async fn fetch_page(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
            _offset: usize,
            _limit: usize,
        ) -> Result<FidsPage, FidsError> {
            *self.calls.lock().unwrap() += 1;
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(FidsPage::default())
            } else {
                Ok(pages.remove(0))
            }
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            "2025-02-25T08:00:00Z".parse().unwrap(),
            "2025-02-26T07:59:59Z".parse().unwrap(),
        )
    }

    #[test]
    fn flight_number_formatting() {
        assert_eq!(normalize_flight_no(" ws 816 "), "WS816");
        assert_eq!(format_flight_no("WS816"), "WS 816");
        assert_eq!(format_flight_no("ws 816"), "WS 816");
        assert_eq!(format_flight_no("WS"), "WS");
    }

    #[tokio::test]
    async fn unwatched_airlines_are_dropped() {
        let provider = FakeProvider::new(vec![FidsPage {
            arrivals: vec![record("WS816", "2025-02-25 06:30-05:00"), record("AC101", "2025-02-25 07:00-05:00")],
            departures: vec![],
        }]);
        let (from, to) = window();
        let batch = fetch_window(&provider, from, to).await.unwrap();
        assert_eq!(batch.arrivals.len(), 1);
        assert_eq!(batch.arrivals[0].flight, "WS 816");
    }

    #[tokio::test]
    async fn codeshares_are_dropped() {
        let mut codeshare = record("DL123", "2025-02-25 06:30-05:00");
        codeshare.codeshare_status = "IsCodeshared".to_string();
        let provider = FakeProvider::new(vec![FidsPage {
            arrivals: vec![codeshare, record("DL124", "2025-02-25 07:00-05:00")],
            departures: vec![],
        }]);
        let (from, to) = window();
        let batch = fetch_window(&provider, from, to).await.unwrap();
        assert_eq!(batch.arrivals.len(), 1);
        assert_eq!(batch.arrivals[0].flight, "DL 124");
    }

    #[tokio::test]
    async fn duplicates_dedupe_per_direction() {
        let provider = FakeProvider::new(vec![FidsPage {
            arrivals: vec![
                record("WS816", "2025-02-25 06:30-05:00"),
                record("ws 816", "2025-02-25 06:30-05:00"),
            ],
            departures: vec![record("WS816", "2025-02-25 06:30-05:00")],
        }]);
        let (from, to) = window();
        let batch = fetch_window(&provider, from, to).await.unwrap();
        assert_eq!(batch.arrivals.len(), 1);
        // Same number on the departure side is a different movement.
        assert_eq!(batch.departures.len(), 1);
    }

    #[tokio::test]
    async fn estimated_falls_back_to_scheduled() {
        let provider = FakeProvider::new(vec![FidsPage {
            arrivals: vec![record("WS816", "2025-02-25 06:30-05:00")],
            departures: vec![],
        }]);
        let (from, to) = window();
        let batch = fetch_window(&provider, from, to).await.unwrap();
        assert_eq!(batch.arrivals[0].est, batch.arrivals[0].sched);
    }

    #[tokio::test]
    async fn short_page_stops_paging_within_segment() {
        // 24h window = two segments; each short first page ends its segment.
        let provider = FakeProvider::new(vec![FidsPage::default(), FidsPage::default()]);
        let (from, to) = window();
        fetch_window(&provider, from, to).await.unwrap();
        assert_eq!(*provider.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn full_pages_keep_paging_up_to_the_cap() {
        // A full page of unwatched records keeps the pager going to the
        // 4-page maximum for the first segment.
        let full_page = || FidsPage {
            arrivals: (0..PAGE_LIMIT)
                .map(|i| record("AC999", &format!("2025-02-25 06:{:02}-05:00", i % 60)))
                .collect(),
            departures: vec![],
        };
        let pages = (0..MAX_PAGES).map(|_| full_page()).collect();
        let provider = FakeProvider::new(pages);
        let (from, to) = window();
        let batch = fetch_window(&provider, from, to).await.unwrap();
        assert!(batch.arrivals.is_empty());
        // 4 pages in segment one, then one short page in segment two.
        assert_eq!(*provider.calls.lock().unwrap(), MAX_PAGES + 1);
    }

    #[tokio::test]
    async fn provider_error_aborts_the_fetch() {
        struct FailingProvider;

        #[async_trait]
        impl FidsProvider for FailingProvider {
            async fn fetch_page(
                &self,
                _from: DateTime<Utc>,
                _to: DateTime<Utc>,
                _offset: usize,
                _limit: usize,
            ) -> Result<FidsPage, FidsError> {
                Err(FidsError::Provider(502))
            }
        }

        let (from, to) = window();
        let err = fetch_window(&FailingProvider, from, to).await.unwrap_err();
        assert!(matches!(err, FidsError::Provider(502)));
    }
}
