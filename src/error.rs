use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no data at {url}")]
    NotFound { url: String },
    #[error("response status is not 2xx: {status} ({url})")]
    Status { url: String, status: StatusCode },
    #[error("too many attempts ({attempts}) fetching {url}: {source}")]
    TooManyAttempts {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("download task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("admission gate closed: {0}")]
    Gate(#[from] tokio::sync::AcquireError),
}

impl Error {
    /// The only per-task failure a batch tolerates.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
