use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;

use crate::error::Error;
use crate::error::Error::Config as ConfigError;
use crate::model::{DateSelection, Precision};

pub const DEFAULT_BASE_URL: &str = "https://data.chc.ucsb.edu/products/CHIRPS-2.0/global_daily/tifs";
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 128;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Unvalidated user input, one field per command line flag.
#[derive(Debug, Clone)]
pub struct Options {
    pub date: String,
    pub concurrency_limit: usize,
    pub save_directory: Option<PathBuf>,
    pub max_attempts: u32,
    pub skip_decompression: bool,
    pub quiet: bool,
    pub precision: String,
    pub base_url: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            date: String::new(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            save_directory: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            skip_decompression: false,
            quiet: false,
            precision: Precision::default().to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub selection: DateSelection,
    pub concurrency_limit: NonZeroUsize,
    pub save_directory: Option<PathBuf>,
    pub max_attempts: NonZeroU32,
    pub decompress: bool,
    pub quiet: bool,
    pub precision: Precision,
    pub base_url: String,
}

impl Config {
    pub fn from_options(options: Options) -> Result<Config, Error> {
        let precision = options.precision.parse::<Precision>()?;
        let selection = options.date.parse::<DateSelection>()?;
        let concurrency_limit = NonZeroUsize::new(options.concurrency_limit).ok_or_else(|| {
            ConfigError("concurrency limit must be greater than 0".to_string())
        })?;
        // Only one raster can stream to stdout at a time; more requests in
        // flight would leave their bodies unread until their turn comes.
        let concurrency_limit = match options.save_directory {
            Some(_) => concurrency_limit,
            None => NonZeroUsize::MIN,
        };
        let max_attempts = NonZeroU32::new(options.max_attempts)
            .ok_or_else(|| ConfigError("max attempts must be greater than 0".to_string()))?;

        // Raster bytes own stdout when a range is not saved to disk.
        let quiet =
            options.quiet || (selection.is_range() && options.save_directory.is_none());

        Ok(Config {
            selection,
            concurrency_limit,
            save_directory: options.save_directory,
            max_attempts,
            decompress: !options.skip_decompression,
            quiet,
            precision,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }
}
