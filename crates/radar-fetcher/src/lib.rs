//! HTTP client for the DWD RV radar composite.
//!
//! [`RadarFetcher`] downloads the latest RV archive with a conditional GET,
//! decodes it off the async runtime and returns the precipitation forecast
//! for a single location in chronological order.
//!
//! # Example
//!
//! ```no_run
//! use radar_fetcher::{FetcherConfig, RadarFetcher};
//!
//! # async fn run() -> radar_common::RadarResult<()> {
//! let mut fetcher = RadarFetcher::new(FetcherConfig::default(), 48.0753, 11.32589)?;
//! for point in fetcher.fetch().await? {
//!     println!("{} {:?}", point.prediction_time, point.precipitation_mm);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fetcher;

pub use config::{FetcherConfig, DEFAULT_URL};
pub use fetcher::RadarFetcher;
