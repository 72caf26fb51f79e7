use std::path::PathBuf;

use chirps::config::{Options, DEFAULT_BASE_URL};
use clap::Parser;

/// Fetching CHIRPS-2.0 global daily precipitation rasters (GeoTIFF) for a single date or
/// for every day of a date range.
#[derive(Parser)]
pub(crate) struct Cli {
    /// The date or date range to be fetched (e.g. `2022-01-01` or `2022-01-01..2022-01-31`).
    /// Both ends of a range are included.
    #[clap(long, short, env = "CHIRPS_DATE")]
    pub(crate) date: String,
    /// The maximum number of files downloaded at once. Must be greater than 0. Without
    /// `--save-directory` files are fetched one at a time.
    #[clap(long, short, env = "CHIRPS_CONCURRENCY_LIMIT", default_value = "128")]
    pub(crate) concurrency_limit: usize,
    /// Save the downloaded files into this directory, created if missing. If not specified,
    /// the rasters are written to stdout.
    #[clap(long, short, env = "CHIRPS_SAVE_DIRECTORY")]
    pub(crate) save_directory: Option<PathBuf>,
    /// The number of attempts made to reach the archive for each file. Only connection
    /// failures are retried, an error status from the archive is final.
    #[clap(long, short = 'a', env = "CHIRPS_MAX_ATTEMPTS", default_value = "3")]
    pub(crate) max_attempts: u32,
    /// Keep the files gzipped as served by the archive (saved as `<date>.tif.gz`).
    #[clap(long, env = "CHIRPS_SKIP_DECOMPRESSION")]
    pub(crate) skip_decompression: bool,
    /// Do not show download progress. Always on for a date range without `--save-directory`.
    #[clap(long, short, env = "CHIRPS_QUIET")]
    pub(crate) quiet: bool,
    /// The grid resolution of the data: `p05` (0.05°) or `p25` (0.25°).
    #[clap(long, short, env = "CHIRPS_PRECISION", default_value = "p05")]
    pub(crate) precision: String,
    /// Root of the daily GeoTIFF archive, for mirrors.
    #[clap(long, env = "CHIRPS_BASE_URL", default_value = DEFAULT_BASE_URL, hide = true)]
    pub(crate) base_url: String,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        Options {
            date: cli.date,
            concurrency_limit: cli.concurrency_limit,
            save_directory: cli.save_directory,
            max_attempts: cli.max_attempts,
            skip_decompression: cli.skip_decompression,
            quiet: cli.quiet,
            precision: cli.precision,
            base_url: cli.base_url,
        }
    }
}
