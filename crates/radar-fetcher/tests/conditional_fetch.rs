//! Fetcher behaviour against a local HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use radar_common::{ErrorKind, FormatError, RadarError};
use radar_fetcher::{FetcherConfig, RadarFetcher};
use test_utils::{
    archive_valid_at, bzip2_compress, rv_forecast_archive, ArchiveBuilder, RvFrameBuilder,
    REFERENCE_CELL, REFERENCE_LAT, REFERENCE_LON, REFERENCE_RAW_VALUES,
};
use tokio::net::TcpListener;

const ETAG: &str = "\"abc\"";

/// Serves one archive with an optional ETag and records every request.
#[derive(Default)]
struct MockServer {
    body: Mutex<Vec<u8>>,
    etag: Mutex<Option<String>>,
    forced_status: Mutex<Option<StatusCode>>,
    requests: AtomicUsize,
    conditions: Mutex<Vec<Option<String>>>,
}

impl MockServer {
    fn new(body: Vec<u8>, etag: Option<&str>) -> Arc<Self> {
        let mock = Self::default();
        *mock.body.lock().unwrap() = body;
        *mock.etag.lock().unwrap() = etag.map(str::to_string);
        Arc::new(mock)
    }

    fn serve(&self, body: Vec<u8>, etag: Option<&str>) {
        *self.body.lock().unwrap() = body;
        *self.etag.lock().unwrap() = etag.map(str::to_string);
    }

    fn force_status(&self, status: StatusCode) {
        *self.forced_status.lock().unwrap() = Some(status);
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn conditions(&self) -> Vec<Option<String>> {
        self.conditions.lock().unwrap().clone()
    }
}

async fn serve_archive(State(mock): State<Arc<MockServer>>, headers: HeaderMap) -> Response {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    let sent = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.conditions.lock().unwrap().push(sent.clone());

    if let Some(status) = *mock.forced_status.lock().unwrap() {
        return status.into_response();
    }

    let etag = mock.etag.lock().unwrap().clone();
    if sent.is_some() && sent == etag {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let body = mock.body.lock().unwrap().clone();
    let mut response = body.into_response();
    if let Some(etag) = etag {
        response
            .headers_mut()
            .insert(header::ETAG, HeaderValue::from_str(&etag).unwrap());
    }
    response
}

async fn start(mock: Arc<MockServer>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/rv/DE1200_RV_LATEST.tar.bz2", get(serve_archive))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/rv/DE1200_RV_LATEST.tar.bz2", addr)
}

fn reference_archive() -> Vec<u8> {
    let order: Vec<usize> = (0..REFERENCE_RAW_VALUES.len()).rev().collect();
    rv_forecast_archive(
        660,
        260,
        REFERENCE_CELL,
        archive_valid_at(),
        &REFERENCE_RAW_VALUES,
        &order,
    )
}

fn single_frame_archive(raw: u16) -> Vec<u8> {
    let (x, y) = REFERENCE_CELL;
    let frame = RvFrameBuilder::new(660, 260).cell(x, y, raw).build();
    ArchiveBuilder::new().file("DE1200_RV_000", &frame).finish()
}

fn fetcher(url: String) -> RadarFetcher {
    RadarFetcher::new(FetcherConfig::with_url(url), REFERENCE_LAT, REFERENCE_LON).unwrap()
}

#[tokio::test]
async fn test_fetch_sorts_and_stores_etag() {
    let mock = MockServer::new(reference_archive(), Some(ETAG));
    let mut fetcher = fetcher(start(mock.clone()).await);

    let points = fetcher.fetch().await.unwrap();
    assert_eq!(points.len(), 25);
    assert!(points
        .windows(2)
        .all(|w| w[0].prediction_time < w[1].prediction_time));
    assert_eq!(points[0].precipitation_mm, Some(0.84));
    assert_eq!(points[1].precipitation_mm, Some(0.12));
    assert_eq!(fetcher.etag(), Some(ETAG));
    assert_eq!(fetcher.last_result(), Some(points.as_slice()));
}

#[tokio::test]
async fn test_not_modified_returns_previous_result() {
    let mock = MockServer::new(reference_archive(), Some(ETAG));
    let mut fetcher = fetcher(start(mock.clone()).await);

    let first = fetcher.fetch().await.unwrap();
    // Anything parsed now would fail, so a 304 must not touch the body.
    mock.serve(b"garbage".to_vec(), Some(ETAG));
    let second = fetcher.fetch().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.requests(), 2);
    assert_eq!(mock.conditions(), vec![None, Some(ETAG.to_string())]);
}

#[tokio::test]
async fn test_changed_archive_replaces_result() {
    let mock = MockServer::new(single_frame_archive(100), Some(ETAG));
    let mut fetcher = fetcher(start(mock.clone()).await);

    let first = fetcher.fetch().await.unwrap();
    assert_eq!(first[0].precipitation_mm, Some(1.0));

    mock.serve(single_frame_archive(250), Some("\"def\""));
    let second = fetcher.fetch().await.unwrap();
    assert_eq!(second[0].precipitation_mm, Some(2.5));
    assert_eq!(fetcher.etag(), Some("\"def\""));
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let mock = MockServer::new(single_frame_archive(1), Some(ETAG));
    let url = start(mock.clone()).await;
    let mut fetcher = fetcher(url.clone());

    fetcher.fetch().await.unwrap();
    mock.force_status(StatusCode::INTERNAL_SERVER_ERROR);

    let err = fetcher.fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    match err {
        RadarError::UnexpectedStatus { status, url: failed } => {
            assert_eq!(status, 500);
            assert_eq!(failed, url);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fetcher.etag(), Some(ETAG));
    assert!(fetcher.last_result().is_some());
}

#[tokio::test]
async fn test_not_modified_without_previous_result() {
    let mock = MockServer::new(Vec::new(), None);
    mock.force_status(StatusCode::NOT_MODIFIED);
    let mut fetcher = fetcher(start(mock.clone()).await);

    let err = fetcher.fetch().await.unwrap_err();
    assert!(matches!(
        err,
        RadarError::UnexpectedStatus { status: 304, .. }
    ));
}

#[tokio::test]
async fn test_malformed_archive_keeps_state() {
    let mock = MockServer::new(reference_archive(), Some(ETAG));
    let mut fetcher = fetcher(start(mock.clone()).await);
    let good = fetcher.fetch().await.unwrap();

    mock.serve(b"<html>maintenance</html>".to_vec(), Some("\"def\""));
    let err = fetcher.fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Archive);
    assert_eq!(fetcher.etag(), Some(ETAG));
    assert_eq!(fetcher.last_result(), Some(good.as_slice()));

    // The old token is still offered on the next attempt.
    mock.serve(reference_archive(), Some(ETAG));
    assert_eq!(fetcher.fetch().await.unwrap(), good);
    assert_eq!(mock.conditions().last().unwrap().as_deref(), Some(ETAG));
}

#[tokio::test]
async fn test_empty_bzip2_body_keeps_state() {
    let mock = MockServer::new(reference_archive(), Some(ETAG));
    let mut fetcher = fetcher(start(mock.clone()).await);
    let good = fetcher.fetch().await.unwrap();

    mock.serve(bzip2_compress(&[]), Some("\"def\""));
    let err = fetcher.fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Archive);
    assert_eq!(fetcher.etag(), Some(ETAG));
    assert_eq!(fetcher.last_result(), Some(good.as_slice()));
}

#[tokio::test]
async fn test_malformed_frame_aborts_fetch() {
    let (x, y) = REFERENCE_CELL;
    let good = RvFrameBuilder::new(660, 260).cell(x, y, 5).build();
    let bad = RvFrameBuilder::new(660, 260).terminator(b' ').build();
    let body = ArchiveBuilder::new()
        .file("a", &good)
        .file("b", &bad)
        .finish();

    let mock = MockServer::new(body, Some(ETAG));
    let mut fetcher = fetcher(start(mock.clone()).await);

    let err = fetcher.fetch().await.unwrap_err();
    assert_eq!(
        err.as_format(),
        Some(&FormatError::MissingTerminator { found: Some(b' ') })
    );
    assert!(fetcher.etag().is_none());
    assert!(fetcher.last_result().is_none());
}

#[tokio::test]
async fn test_missing_etag_disables_conditional_request() {
    let mock = MockServer::new(single_frame_archive(3), None);
    let mut fetcher = fetcher(start(mock.clone()).await);

    fetcher.fetch().await.unwrap();
    assert!(fetcher.etag().is_none());
    fetcher.fetch().await.unwrap();

    assert_eq!(mock.requests(), 2);
    assert_eq!(mock.conditions(), vec![None, None]);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut fetcher = fetcher(format!("http://{}/rv", addr));
    let err = fetcher.fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(fetcher.last_result().is_none());
}
