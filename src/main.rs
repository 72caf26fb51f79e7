mod cli;

use chirps::config::Config;
use chirps::error::Error;
use clap::Parser;
use cli::Cli;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chirps=info"));

    // stdout may carry raster bytes
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = Config::from_options(Cli::parse().into())?;
    let report = chirps::run(&config).await?;

    if config.selection.is_range() {
        info!(
            total = report.total,
            saved = report.saved,
            missing = report.missing,
            bytes = report.bytes,
            "Batch finished"
        );
    }
    Ok(())
}
