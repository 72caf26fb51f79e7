use std::io::Write;
use std::num::NonZeroU32;

use chrono::{Datelike, NaiveDate};
use flate2::write::GzDecoder;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Error;
use crate::model::Precision;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A successful response whose body has not been read yet.
///
/// The body is pulled chunk by chunk while writing, through a gzip decoder
/// unless the raw archive bytes were requested. Dropping the payload drops the
/// response and with it the connection's body stream.
pub struct Payload {
    response: Response,
    decompress: bool,
}

impl Payload {
    pub fn new(response: Response, decompress: bool) -> Self {
        Payload { response, decompress }
    }

    pub fn is_compressed(&self) -> bool {
        !self.decompress
    }

    /// Copies the whole body into `writer` and returns the number of bytes
    /// received from the remote.
    pub async fn write_to<W: Write + Send>(mut self, writer: W) -> Result<u64, Error> {
        if self.decompress {
            let mut decoder = GzDecoder::new(writer);
            let received = self.pump(&mut decoder).await?;
            let mut writer = decoder.finish()?;
            writer.flush()?;
            Ok(received)
        } else {
            let mut writer = writer;
            let received = self.pump(&mut writer).await?;
            writer.flush()?;
            Ok(received)
        }
    }

    async fn pump<W: Write + Send>(&mut self, writer: &mut W) -> Result<u64, Error> {
        let mut received = 0;
        while let Some(chunk) = self.response.chunk().await? {
            writer.write_all(&chunk)?;
            received += chunk.len() as u64;
        }
        Ok(received)
    }
}

pub struct Fetcher {
    client: Client,
    base_url: String,
    precision: Precision,
    max_attempts: NonZeroU32,
    decompress: bool,
}

impl Fetcher {
    pub fn new(client: Client, config: &Config) -> Self {
        Fetcher {
            client,
            base_url: config.base_url.clone(),
            precision: config.precision,
            max_attempts: config.max_attempts,
            decompress: config.decompress,
        }
    }

    pub fn client() -> Result<Client, Error> {
        Ok(Client::builder().user_agent(USER_AGENT).build()?)
    }

    pub fn url(&self, date: NaiveDate) -> String {
        let (year, month, day) = (date.year(), date.month(), date.day());
        format!(
            "{base}/{precision}/{year:04}/chirps-v2.0.{year:04}.{month:02}.{day:02}.tif.gz",
            base = self.base_url,
            precision = self.precision,
        )
    }

    /// Requests the raster for `date`.
    ///
    /// Transport failures (the request cannot be built or sent) are retried
    /// immediately, up to the configured number of attempts. Any response that
    /// arrives is final: a non-2xx status is returned as an error without retry,
    /// 404 as [`Error::NotFound`].
    pub async fn fetch(&self, date: NaiveDate) -> Result<Payload, Error> {
        let url = self.url(date);
        let attempts = self.max_attempts.get();
        let mut attempt = 1;

        loop {
            match self.send(&url).await {
                Ok(response) => return self.accept(url, response),
                Err(source) if attempt >= attempts => {
                    return Err(Error::TooManyAttempts { url, attempts, source });
                }
                Err(e) => {
                    warn!(%url, attempt, attempts, error = %e, "Fetch attempt failed, retrying");
                    attempt += 1;
                }
            }
        }
    }

    async fn send(&self, url: &str) -> Result<Response, reqwest::Error> {
        let request = self.client.get(url).build()?;
        self.client.execute(request).await
    }

    fn accept(&self, url: String, response: Response) -> Result<Payload, Error> {
        match response.status() {
            status if status.is_success() => {
                debug!(%url, %status, "Fetched");
                Ok(Payload::new(response, self.decompress))
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound { url }),
            status => Err(Error::Status { url, status }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::NaiveDate;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use reqwest::{Client, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::{Fetcher, Payload};
    use crate::config::{Config, Options};
    use crate::error::Error;

    pub(crate) const RASTER_PATH: &str = "/p05/2022/chirps-v2.0.2022.01.01.tif.gz";

    pub(crate) fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    pub(crate) fn config(base_url: &str, overrides: Options) -> Config {
        Config::from_options(Options {
            base_url: base_url.to_string(),
            date: "2022-01-01".to_string(),
            ..overrides
        })
        .unwrap()
    }

    fn fetcher(base_url: &str, overrides: Options) -> Fetcher {
        Fetcher::new(Client::new(), &config(base_url, overrides))
    }

    fn new_year() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
    }

    #[test]
    fn given_precision_and_date_when_url_then_archive_layout() {
        // Given
        let fetcher = fetcher(
            "https://data.example.org/tifs",
            Options { precision: "p25".to_string(), ..Options::default() },
        );

        // When
        let url = fetcher.url(NaiveDate::from_ymd_opt(1999, 3, 7).unwrap());

        // Then
        assert_eq!(url, "https://data.example.org/tifs/p25/1999/chirps-v2.0.1999.03.07.tif.gz");
    }

    #[tokio::test]
    async fn given_gzipped_raster_when_fetch_then_payload_is_decompressed() {
        // Given
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", RASTER_PATH)
            .with_status(200)
            .with_body(gzip(b"raster bytes"))
            .expect(1)
            .create_async()
            .await;
        let mut out = Vec::new();

        // When
        let payload = fetcher(&server.url(), Options::default()).fetch(new_year()).await.unwrap();
        payload.write_to(&mut out).await.unwrap();

        // Then
        m.assert_async().await;
        assert_eq!(out, b"raster bytes");
    }

    #[tokio::test]
    async fn given_skip_decompression_when_fetch_then_payload_is_raw_archive() {
        // Given
        let archive = gzip(b"raster bytes");
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", RASTER_PATH)
            .with_status(200)
            .with_body(archive.clone())
            .create_async()
            .await;
        let mut out = Vec::new();

        // When
        let payload = fetcher(
            &server.url(),
            Options { skip_decompression: true, ..Options::default() },
        )
        .fetch(new_year())
        .await
        .unwrap();
        assert!(payload.is_compressed());
        let received = payload.write_to(&mut out).await.unwrap();

        // Then
        assert_eq!(out, archive);
        assert_eq!(received, archive.len() as u64);
    }

    #[tokio::test]
    async fn given_missing_raster_when_fetch_then_not_found_without_retry() {
        // Given
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", RASTER_PATH)
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        // When
        let error = fetcher(&server.url(), Options::default()).fetch(new_year()).await.err().unwrap();

        // Then
        m.assert_async().await;
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn given_server_error_when_fetch_then_status_error_without_retry() {
        // Given
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", RASTER_PATH)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        // When
        let error = fetcher(&server.url(), Options::default()).fetch(new_year()).await.err().unwrap();

        // Then
        m.assert_async().await;
        assert!(matches!(
            error,
            Error::Status { status: StatusCode::SERVICE_UNAVAILABLE, .. }
        ));
    }

    /// Serves raw HTTP on a local port: the first `dropped` connections are
    /// closed after reading the request, later ones get `body` with a 200.
    async fn flaky_server(dropped: usize, body: Vec<u8>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let body = body.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buffer = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buffer).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buffer[..n]),
                        }
                    }
                    if seen <= dropped {
                        return;
                    }
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    socket.write_all(head.as_bytes()).await.unwrap();
                    socket.write_all(&body).await.unwrap();
                    socket.shutdown().await.unwrap();
                });
            }
        });

        (url, accepted)
    }

    #[tokio::test]
    async fn given_connections_dropped_twice_when_fetch_then_third_attempt_succeeds() {
        // Given
        let (url, accepted) = flaky_server(2, gzip(b"raster bytes")).await;
        let fetcher = fetcher(&url, Options { max_attempts: 3, ..Options::default() });
        let mut out = Vec::new();

        // When
        let payload = fetcher.fetch(new_year()).await.unwrap();
        payload.write_to(&mut out).await.unwrap();

        // Then
        assert_eq!(out, b"raster bytes");
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn given_connections_always_dropped_when_fetch_then_too_many_attempts_after_each_try() {
        // Given
        let (url, accepted) = flaky_server(usize::MAX, Vec::new()).await;
        let fetcher = fetcher(&url, Options { max_attempts: 2, ..Options::default() });

        // When
        let error = fetcher.fetch(new_year()).await.err().unwrap();

        // Then
        assert!(matches!(error, Error::TooManyAttempts { attempts: 2, .. }));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn given_corrupt_archive_when_write_to_then_io_error() {
        // Given
        let response = http::Response::new(b"definitely not gzip".to_vec());
        let payload = Payload::new(response.into(), true);
        let mut out = Vec::new();

        // When
        let result = payload.write_to(&mut out).await;

        // Then
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn given_same_archive_twice_when_write_to_then_identical_output() {
        // Given
        let archive = gzip(&(0..=255u8).cycle().take(64 * 1024).collect::<Vec<_>>());
        let (mut first, mut second) = (Vec::new(), Vec::new());

        // When
        Payload::new(http::Response::new(archive.clone()).into(), true)
            .write_to(&mut first)
            .await
            .unwrap();
        Payload::new(http::Response::new(archive).into(), true)
            .write_to(&mut second)
            .await
            .unwrap();

        // Then
        assert_eq!(first.len(), 64 * 1024);
        assert_eq!(first, second);
    }
}
