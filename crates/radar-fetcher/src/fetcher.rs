//! Conditional fetch of the RV archive.
//!
//! Each call issues one GET against the configured URL. The ETag of the
//! last good response is sent as `If-None-Match`, and a 304 answer returns
//! the previous result without touching the archive again.

use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use projection::PolarStereographic;
use radar_common::forecast::sort_chronologically;
use radar_common::{ForecastPoint, GridCoordinate, RadarError, RadarResult};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::config::FetcherConfig;

/// Fetches and decodes the RV forecast for one location.
///
/// `fetch` takes `&mut self`, so one instance never runs two fetches at
/// once. Share it behind a `tokio::sync::Mutex` if several tasks need it.
pub struct RadarFetcher {
    client: Client,
    config: FetcherConfig,
    grid: GridCoordinate,
    etag: Option<String>,
    last_result: Option<Vec<ForecastPoint>>,
}

impl RadarFetcher {
    /// Create a fetcher for a location, projecting it onto the grid once.
    pub fn new(config: FetcherConfig, latitude: f64, longitude: f64) -> RadarResult<Self> {
        let grid = PolarStereographic::radolan()
            .project(latitude, longitude)
            .map_err(|e| RadarError::Projection(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(RadarError::transport)?;

        info!(
            latitude = latitude,
            longitude = longitude,
            grid = %grid,
            url = %config.url,
            "Radar fetcher ready"
        );

        Ok(Self {
            client,
            config,
            grid,
            etag: None,
            last_result: None,
        })
    }

    /// Grid cell the configured location maps to.
    pub fn grid(&self) -> GridCoordinate {
        self.grid
    }

    /// Validation token sent with the next request.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Result of the last successful fetch.
    pub fn last_result(&self) -> Option<&[ForecastPoint]> {
        self.last_result.as_deref()
    }

    /// Fetch the archive and return the forecast ascending by time.
    ///
    /// State is only updated once a 200 response has been fully decoded,
    /// so dropping the returned future leaves the fetcher unchanged.
    #[instrument(skip(self), fields(url = %self.config.url, grid = %self.grid))]
    pub async fn fetch(&mut self) -> RadarResult<Vec<ForecastPoint>> {
        let result = self.fetch_inner().await;
        let outcome = match &result {
            Ok(FetchOutcome::Updated(_)) => "updated",
            Ok(FetchOutcome::NotModified(_)) => "not_modified",
            Err(_) => "error",
        };
        counter!("radar_fetch_total", "outcome" => outcome).increment(1);

        match result {
            Ok(FetchOutcome::Updated(points)) | Ok(FetchOutcome::NotModified(points)) => Ok(points),
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Radar fetch failed");
                Err(e)
            }
        }
    }

    async fn fetch_inner(&mut self) -> RadarResult<FetchOutcome> {
        let mut request = self.client.get(&self.config.url);
        if let Some(etag) = &self.etag {
            request = request.header(header::IF_NONE_MATCH, etag.as_str());
        }

        let response = request.send().await.map_err(RadarError::transport)?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return match (&self.etag, &self.last_result) {
                (Some(etag), Some(points)) => {
                    debug!(etag = %etag, "Radar archive not modified");
                    Ok(FetchOutcome::NotModified(points.clone()))
                }
                _ => Err(self.unexpected(status)),
            };
        }
        if status != StatusCode::OK {
            return Err(self.unexpected(status));
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(RadarError::transport)?;

        let points = decode(body, self.grid).await?;

        match &etag {
            Some(etag) => info!(etag = %etag, frames = points.len(), "Radar archive updated"),
            None => warn!(
                frames = points.len(),
                "Radar archive served without ETag, next request is unconditional"
            ),
        }

        self.etag = etag;
        self.last_result = Some(points.clone());
        Ok(FetchOutcome::Updated(points))
    }

    fn unexpected(&self, status: StatusCode) -> RadarError {
        RadarError::UnexpectedStatus {
            status: status.as_u16(),
            url: self.config.url.clone(),
        }
    }
}

enum FetchOutcome {
    Updated(Vec<ForecastPoint>),
    NotModified(Vec<ForecastPoint>),
}

/// Decode on the blocking pool and sort the frames.
async fn decode(body: Bytes, grid: GridCoordinate) -> RadarResult<Vec<ForecastPoint>> {
    let size = body.len();
    let start = Instant::now();

    let mut points = tokio::task::spawn_blocking(move || radolan_parser::decode_archive(&body, grid))
        .await
        .map_err(|e| RadarError::Task(e.to_string()))??;
    sort_chronologically(&mut points);

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!("radar_decode_duration_ms").record(elapsed_ms);
    counter!("radar_frames_decoded_total").increment(points.len() as u64);
    debug!(bytes = size, frames = points.len(), elapsed_ms = elapsed_ms, "Decoded radar archive");

    Ok(points)
}
