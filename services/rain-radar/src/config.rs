//! Service configuration.
//!
//! Loaded from an optional YAML file; command line values override it.
//!
//! ```yaml
//! location:
//!   latitude: 48.0753
//!   longitude: 11.32589
//! source:
//!   url: https://opendata.dwd.de/weather/radar/composite/rv/DE1200_RV_LATEST.tar.bz2
//!   request_timeout_secs: 60
//! schedule:
//!   poll_interval_secs: 300
//! server:
//!   port: 8081
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use projection::PolarStereographic;
use radar_common::grid::{DE1200_HEIGHT, DE1200_WIDTH};
use radar_common::GridCoordinate;
use radar_fetcher::{FetcherConfig, DEFAULT_URL};
use serde::Deserialize;
use tracing::debug;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub location: LocationConfig,
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
}

/// Point to forecast for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Where the radar archive comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }
}

/// Polling schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between fetches
    pub poll_interval_secs: u64,
    /// Upper bound for one fetch, download and decode included
    pub fetch_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            fetch_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8081 }
    }
}

/// A validated location and the grid cell it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub grid: GridCoordinate,
}

impl ServiceConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServiceConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded service config");
        Ok(config)
    }

    /// Apply command line values on top of the file.
    pub fn apply_overrides(
        &mut self,
        latitude: Option<f64>,
        longitude: Option<f64>,
        port: Option<u16>,
    ) {
        if latitude.is_some() {
            self.location.latitude = latitude;
        }
        if longitude.is_some() {
            self.location.longitude = longitude;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
    }

    /// Check the configuration and resolve the location's grid cell.
    pub fn validate(&self) -> Result<Location> {
        let (Some(latitude), Some(longitude)) = (self.location.latitude, self.location.longitude)
        else {
            bail!("Location is not configured: set latitude and longitude");
        };

        ensure!(
            latitude.is_finite() && (-90.0..=90.0).contains(&latitude),
            "Latitude {} is outside [-90, 90]",
            latitude
        );
        ensure!(
            longitude.is_finite() && (-180.0..=180.0).contains(&longitude),
            "Longitude {} is outside [-180, 180]",
            longitude
        );
        ensure!(
            self.schedule.poll_interval_secs > 0,
            "poll_interval_secs must be positive"
        );
        ensure!(
            self.schedule.fetch_timeout_secs > 0,
            "fetch_timeout_secs must be positive"
        );

        let grid = PolarStereographic::radolan()
            .project(latitude, longitude)
            .with_context(|| format!("Location {}, {} cannot be projected", latitude, longitude))?;
        ensure!(
            grid.is_within(DE1200_WIDTH, DE1200_HEIGHT),
            "Location {}, {} maps to cell {} outside the {}x{} radar composite",
            latitude,
            longitude,
            grid,
            DE1200_WIDTH,
            DE1200_HEIGHT
        );

        Ok(Location {
            latitude,
            longitude,
            grid,
        })
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            url: self.source.url.clone(),
            request_timeout: Duration::from_secs(self.source.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.source.connect_timeout_secs),
            ..FetcherConfig::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.fetch_timeout_secs)
    }
}
