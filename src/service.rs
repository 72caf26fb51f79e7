use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::config::Config;
use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::model::Outcome;
use crate::sink::Sink;

/// Handles one date of a batch from request to persisted bytes.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    async fn process(&self, date: NaiveDate) -> Result<Outcome, Error>;
}

pub struct DownloadService {
    pub fetcher: Fetcher,
    pub sink: Sink,
}

impl DownloadService {
    pub fn new(client: Client, config: &Config) -> Self {
        DownloadService { fetcher: Fetcher::new(client, config), sink: Sink::from_config(config) }
    }
}

#[async_trait]
impl Worker for DownloadService {
    async fn process(&self, date: NaiveDate) -> Result<Outcome, Error> {
        let payload = match self.fetcher.fetch(date).await {
            Ok(payload) => payload,
            Err(e) if e.is_not_found() => return Ok(Outcome::Missing),
            Err(e) => return Err(e),
        };
        let bytes = self.sink.consume(date, payload).await?;
        Ok(Outcome::Saved { bytes })
    }
}
