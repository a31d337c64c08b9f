//! Periodic radar polling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use radar_common::ForecastPoint;
use radar_fetcher::RadarFetcher;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, instrument};

/// Latest forecast as seen by the status API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Forecast ascending by prediction time; kept across failed polls
    pub forecasts: Vec<ForecastPoint>,
    /// Time of the last successful poll
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl Snapshot {
    pub fn record_success(&mut self, forecasts: Vec<ForecastPoint>, at: DateTime<Utc>) {
        self.forecasts = forecasts;
        self.updated_at = Some(at);
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self, error: String) {
        self.last_error = Some(error);
        self.consecutive_failures += 1;
    }
}

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

/// Drives a [`RadarFetcher`] on a fixed interval.
pub struct Poller {
    fetcher: RadarFetcher,
    snapshot: SharedSnapshot,
    poll_interval: Duration,
    fetch_timeout: Duration,
}

impl Poller {
    pub fn new(fetcher: RadarFetcher, poll_interval: Duration, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            snapshot: SharedSnapshot::default(),
            poll_interval,
            fetch_timeout,
        }
    }

    /// Handle to the published snapshot.
    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Run one fetch and publish its outcome.
    ///
    /// A fetch exceeding the timeout is dropped, which leaves the fetcher's
    /// cached state as it was.
    #[instrument(skip(self))]
    pub async fn poll_once(&mut self) -> Result<()> {
        let result = match time::timeout(self.fetch_timeout, self.fetcher.fetch()).await {
            Ok(Ok(points)) => Ok(points),
            Ok(Err(e)) => Err(anyhow!(e)),
            Err(_) => Err(anyhow!(
                "radar fetch timed out after {}s",
                self.fetch_timeout.as_secs_f64()
            )),
        };

        let mut snapshot = self.snapshot.write().await;
        let result = match result {
            Ok(points) => {
                info!(frames = points.len(), "Radar forecast refreshed");
                snapshot.record_success(points, Utc::now());
                Ok(())
            }
            Err(e) => {
                snapshot.record_failure(e.to_string());
                error!(
                    error = %e,
                    consecutive_failures = snapshot.consecutive_failures,
                    "Radar poll failed"
                );
                Err(e)
            }
        };
        record_poll_metrics(&snapshot, result.is_ok());
        result
    }

    /// Poll until a shutdown signal arrives. The first poll runs immediately.
    pub async fn run_forever(&mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Starting radar polling"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down poller");
                    break;
                }
                _ = interval.tick() => {
                    // Failures are already recorded in the snapshot.
                    let _ = self.poll_once().await;
                }
            }
        }
    }
}

fn record_poll_metrics(snapshot: &Snapshot, success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!("radar_polls_total", "outcome" => outcome).increment(1);
    gauge!("radar_poll_consecutive_failures").set(snapshot.consecutive_failures as f64);
    if let Some(updated_at) = snapshot.updated_at {
        gauge!("radar_last_success_timestamp_seconds").set(updated_at.timestamp() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use radar_fetcher::FetcherConfig;
    use tokio::net::TcpListener;

    fn point(minute: u32, mm: f64) -> ForecastPoint {
        ForecastPoint::new(
            Utc.with_ymd_and_hms(2024, 8, 8, 15, minute, 0).unwrap(),
            Some(mm),
        )
    }

    fn poller(url: String, fetch_timeout: Duration) -> Poller {
        let fetcher =
            RadarFetcher::new(FetcherConfig::with_url(url), 48.07530, 11.32589).unwrap();
        Poller::new(fetcher, Duration::from_secs(300), fetch_timeout)
    }

    #[test]
    fn test_failure_keeps_forecast() {
        let mut snapshot = Snapshot::default();
        let now = Utc::now();
        snapshot.record_success(vec![point(50, 0.84)], now);
        snapshot.record_failure("boom".to_string());
        snapshot.record_failure("boom again".to_string());

        assert_eq!(snapshot.forecasts, vec![point(50, 0.84)]);
        assert_eq!(snapshot.updated_at, Some(now));
        assert_eq!(snapshot.last_error.as_deref(), Some("boom again"));
        assert_eq!(snapshot.consecutive_failures, 2);

        snapshot.record_success(vec![point(55, 0.12)], now);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_poll_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let mut snapshot = Snapshot::default();

        metrics::with_local_recorder(&recorder, || {
            snapshot.record_failure("boom".to_string());
            record_poll_metrics(&snapshot, false);
            snapshot.record_failure("boom again".to_string());
            record_poll_metrics(&snapshot, false);
        });
        let rendered = handle.render();
        assert!(rendered.contains("radar_polls_total{outcome=\"error\"} 2"));
        assert!(rendered.contains("radar_poll_consecutive_failures 2"));
        assert!(!rendered.contains("radar_last_success_timestamp_seconds"));

        let at = Utc.with_ymd_and_hms(2024, 8, 8, 15, 50, 0).unwrap();
        metrics::with_local_recorder(&recorder, || {
            snapshot.record_success(vec![point(50, 0.84)], at);
            record_poll_metrics(&snapshot, true);
        });
        let rendered = handle.render();
        assert!(rendered.contains("radar_polls_total{outcome=\"success\"} 1"));
        assert!(rendered.contains("radar_poll_consecutive_failures 0"));
        assert!(rendered.contains(&format!(
            "radar_last_success_timestamp_seconds {}",
            at.timestamp()
        )));
    }

    #[tokio::test]
    async fn test_poll_failure_is_published() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut poller = poller(format!("http://{}/rv", addr), Duration::from_secs(5));
        assert!(poller.poll_once().await.is_err());

        let snapshot = poller.snapshot();
        let snapshot = snapshot.read().await;
        assert_eq!(snapshot.consecutive_failures, 1);
        assert!(snapshot.last_error.is_some());
        assert!(snapshot.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        // Accepts connections into the backlog but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut poller = poller(format!("http://{}/rv", addr), Duration::from_millis(100));
        let err = poller.poll_once().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let snapshot = poller.snapshot();
        assert_eq!(snapshot.read().await.consecutive_failures, 1);
        drop(listener);
    }

    #[tokio::test]
    async fn test_run_forever_stops_on_shutdown() {
        let mut poller = poller("http://127.0.0.1:9/rv".to_string(), Duration::from_millis(100));
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        time::timeout(Duration::from_secs(5), poller.run_forever(rx))
            .await
            .unwrap();
    }
}
