//! Hourly weather retrieval
//!
//! The scorer never fetches on its own; the batch runner asks a
//! [`WeatherSource`] for each unit's series. [`OpenMeteoClient`] is the
//! production source.

mod client;
pub mod retry;

pub use client::{parse_hourly, OpenMeteoClient, OpenMeteoResponse, DEFAULT_BASE_URL};
pub use retry::{with_retry, RetryPolicy};

use crate::models::{Location, SeriesError};
use thiserror::Error;

/// Errors raised while fetching a series
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse upstream response: {0}")]
    Parse(String),

    #[error("upstream series is malformed: {0}")]
    Series(#[from] SeriesError),
}

impl FetchError {
    /// Timeouts, connection errors, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connection(_) => true,
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Source of aligned hourly series for a location at an elevation
pub trait WeatherSource: Send + Sync {
    fn fetch(&self, location: &Location, elevation_m: f64) -> FetchResult<crate::models::HourlySeries>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_set() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Connection("reset".into()).is_retryable());
        for status in [429, 500, 502, 503, 599] {
            let err = FetchError::Status {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "{status}");
        }
        for status in [400, 401, 404, 422] {
            let err = FetchError::Status {
                status,
                message: String::new(),
            };
            assert!(!err.is_retryable(), "{status}");
        }
        assert!(!FetchError::Parse("bad".into()).is_retryable());
    }
}
