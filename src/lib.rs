//! Download CHIRPS daily precipitation rasters for a single date or a date
//! range, with a bounded number of requests in flight.

pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod progress;
pub mod service;
pub mod sink;

use batch::{Batch, Report};
use config::Config;
use error::Error;
use fetcher::Fetcher;
use service::DownloadService;

/// Fetches every selected date and hands each raster to the configured sink.
pub async fn run(config: &Config) -> Result<Report, Error> {
    let service = DownloadService::new(Fetcher::client()?, config);
    Batch::from_config(service, config).run(config.selection.dates()).await
}
