//! Open-Meteo hourly forecast client
//!
//! Uses ureq (sync HTTP); fetches run on rayon workers, so no async
//! runtime is involved.

use super::retry::{with_retry, RetryPolicy};
use super::{FetchError, FetchResult, WeatherSource};
use crate::models::{HourlySeries, Location};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const HOURLY_FIELDS: &str = "temperature_2m,snowfall,wind_speed_10m,snow_depth";

/// Open-Meteo hourly timestamps carry no seconds and no offset
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Sync Open-Meteo client
pub struct OpenMeteoClient {
    agent: ureq::Agent,
    base_url: String,
    past_days: u32,
    forecast_days: u32,
    retry: RetryPolicy,
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // Status codes are classified below
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

impl OpenMeteoClient {
    pub fn new(
        base_url: impl Into<String>,
        past_days: u32,
        forecast_days: u32,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            agent: make_agent(timeout),
            base_url: base_url.into(),
            past_days,
            forecast_days,
            retry,
        }
    }

    fn fetch_once(&self, location: &Location, elevation_m: f64) -> FetchResult<HourlySeries> {
        let response = self
            .agent
            .get(&self.base_url)
            .query("latitude", location.latitude.to_string())
            .query("longitude", location.longitude.to_string())
            .query("elevation", format!("{:.0}", elevation_m))
            .query("hourly", HOURLY_FIELDS)
            .query("past_days", self.past_days.to_string())
            .query("forecast_days", self.forecast_days.to_string())
            .query("timezone", "UTC")
            .call()
            .map_err(classify)?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(FetchError::Status { status, message });
        }

        let body: OpenMeteoResponse = response
            .into_body()
            .read_json()
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        parse_hourly(body)
    }
}

impl WeatherSource for OpenMeteoClient {
    fn fetch(&self, location: &Location, elevation_m: f64) -> FetchResult<HourlySeries> {
        let series = with_retry(&self.retry, || self.fetch_once(location, elevation_m))?;
        debug!(
            "Fetched {} hours for {} at {:.0}m",
            series.len(),
            location.id,
            elevation_m
        );
        Ok(series)
    }
}

fn classify(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Timeout(_) => FetchError::Timeout,
        ureq::Error::Io(e) => FetchError::Connection(e.to_string()),
        ureq::Error::ConnectionFailed => FetchError::Connection("connection failed".to_string()),
        ureq::Error::HostNotFound => FetchError::Connection("host not found".to_string()),
        ureq::Error::StatusCode(status) => FetchError::Status {
            status,
            message: String::new(),
        },
        other => FetchError::Request(other.to_string()),
    }
}

/// Response envelope; only the hourly block is read
#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    pub hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
pub struct HourlyBlock {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub snowfall: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub snow_depth: Option<Vec<Option<f64>>>,
}

/// Convert an Open-Meteo hourly block into a validated series.
///
/// Null snowfall counts as none. A null temperature repeats the previous
/// hour; a series that starts with one is rejected.
pub fn parse_hourly(body: OpenMeteoResponse) -> FetchResult<HourlySeries> {
    let hourly = body.hourly;
    let len = hourly.time.len();

    let times = hourly
        .time
        .iter()
        .map(|t| parse_time(t))
        .collect::<FetchResult<Vec<_>>>()?;

    let mut temperature_c = Vec::with_capacity(len);
    let mut last: Option<f64> = None;
    for (i, value) in hourly.temperature_2m.iter().enumerate() {
        match value.or(last) {
            Some(t) => {
                temperature_c.push(t);
                last = Some(t);
            }
            None => return Err(FetchError::Parse(format!("temperature missing at hour {}", i))),
        }
    }

    let snowfall_cm = hourly.snowfall.iter().map(|s| s.unwrap_or(0.0).max(0.0)).collect();

    let series = HourlySeries::new(
        times,
        temperature_c,
        snowfall_cm,
        hourly.wind_speed_10m.unwrap_or_else(|| vec![None; len]),
        hourly.snow_depth.unwrap_or_else(|| vec![None; len]),
    )?;
    Ok(series)
}

fn parse_time(raw: &str) -> FetchResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| FetchError::Parse(format!("bad timestamp '{}': {}", raw, e)))
}
