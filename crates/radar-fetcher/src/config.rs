//! Fetcher configuration.

use std::time::Duration;

/// Versionless URL of the newest RV composite.
pub const DEFAULT_URL: &str =
    "https://opendata.dwd.de/weather/radar/composite/rv/DE1200_RV_LATEST.tar.bz2";

/// Configuration for [`RadarFetcher`](crate::RadarFetcher).
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Archive URL
    pub url: String,
    /// Whole-request timeout, body included
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("rain-radar/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetcherConfig {
    /// Default configuration pointing at another URL.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
