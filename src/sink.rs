use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::fetcher::Payload;
use crate::model::file_name;

/// Where fetched rasters end up.
pub enum Sink {
    /// One file per date under this directory, created on demand.
    Directory(PathBuf),
    /// Process stdout. The lock is held for a whole payload so concurrent
    /// tasks never interleave their bytes.
    Stdout(Mutex<()>),
}

impl Sink {
    pub fn from_config(config: &Config) -> Self {
        match &config.save_directory {
            Some(directory) => Sink::Directory(directory.clone()),
            None => Sink::Stdout(Mutex::new(())),
        }
    }

    /// Writes the whole payload and returns the bytes received for it.
    pub async fn consume(&self, date: NaiveDate, payload: Payload) -> Result<u64, Error> {
        match self {
            Sink::Directory(directory) => Self::save(directory, date, payload).await,
            Sink::Stdout(lock) => {
                let _guard = lock.lock().await;
                payload.write_to(io::stdout()).await
            }
        }
    }

    async fn save(directory: &Path, date: NaiveDate, payload: Payload) -> Result<u64, Error> {
        fs::create_dir_all(directory)?;
        let path = directory.join(file_name(date, payload.is_compressed()));
        let mut file = File::create(&path)?;
        let received = payload.write_to(&mut file).await?;
        file.sync_all()?;
        debug!(path = %path.display(), received, "Saved");
        Ok(received)
    }
}
