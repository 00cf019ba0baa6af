//! Blocking HTTP helpers over a shared async client.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface to the sequential pipeline.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::LazyLock;
use std::task::Context;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, ReadBuf};

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for stream operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Io(_) => None,
        }
    }
}

impl crate::retry::Retryable for StreamError {
    /// Every HTTP-level failure is worth another attempt, including error
    /// statuses: GROBID answers 503 while its worker pool is saturated.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            // Disk full is not retryable, timeout IS retryable
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// HTTP GET → sync reader over the response body.
///
/// Non-2xx statuses are errors. Each read on the returned reader stalls for
/// at most `read_timeout` before failing with `TimedOut`.
///
/// Returns (reader, content_length)
pub fn open_reader(
    url: &str,
    read_timeout: Duration,
) -> Result<(TimeoutReader, Option<u64>), StreamError> {
    SHARED_RUNTIME.handle().block_on(async {
        let send = SHARED_CLIENT.get(url).send();
        let response = match tokio::time::timeout(read_timeout, send).await {
            Ok(result) => result
                .and_then(|r| r.error_for_status())
                .map_err(|e| StreamError::from_reqwest(&e))?,
            Err(_) => {
                return Err(StreamError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no response within {}s", read_timeout.as_secs()),
                )));
            }
        };

        let total_bytes = response.content_length();

        // Convert response body stream to AsyncRead
        let stream = response.bytes_stream();
        let async_reader = tokio_util::io::StreamReader::new(
            stream.map(|result| result.map_err(io::Error::other)),
        );

        Ok((
            TimeoutReader::new(Box::pin(async_reader), read_timeout),
            total_bytes,
        ))
    })
}

/// POST a multipart form and return the response body as text.
///
/// `timeout` bounds the whole exchange, from connecting until the body is read.
pub fn post_multipart(
    url: &str,
    form: reqwest::multipart::Form,
    timeout: Duration,
) -> Result<String, StreamError> {
    SHARED_RUNTIME.handle().block_on(async {
        let resp = SHARED_CLIENT
            .post(url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| StreamError::from_reqwest(&e))?;
        resp.text().await.map_err(|e| StreamError::from_reqwest(&e))
    })
}

/// HTTP GET returning only the status code.
pub fn probe(url: &str, timeout: Duration) -> Result<u16, StreamError> {
    SHARED_RUNTIME.handle().block_on(async {
        let resp = SHARED_CLIENT
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| StreamError::from_reqwest(&e))?;
        Ok(resp.status().as_u16())
    })
}

/// Async-to-sync bridge with read timeout.
///
/// Wraps an async reader and provides sync Read interface.
/// Each read operation has a timeout - if no data arrives within
/// the configured window, returns TimedOut error.
pub struct TimeoutReader {
    inner: Pin<Box<dyn AsyncRead + Send + Sync>>,
    timeout: Duration,
}

impl TimeoutReader {
    fn new(inner: Pin<Box<dyn AsyncRead + Send + Sync>>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Read for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    Pin::as_mut(&mut self.inner).poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read timeout ({}s with no data)", timeout.as_secs()),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;

    fn http_err(status: u16) -> StreamError {
        StreamError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_503_retryable() {
        assert!(http_err(503).is_retryable());
    }

    #[test]
    fn http_404_retryable() {
        assert!(http_err(404).is_retryable());
    }

    #[test]
    fn io_timeout_retryable() {
        let err = StreamError::Io(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
        assert!(err.is_retryable());
    }

    #[test]
    fn io_storage_full_not_retryable() {
        let err = StreamError::Io(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_accessor() {
        assert_eq!(http_err(500).status(), Some(500));
        let err = StreamError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.status(), None);
        assert_eq!(StreamError::Io(io::Error::other("x")).status(), None);
    }

    #[test]
    fn display_http_with_status() {
        let err = http_err(404);
        assert_eq!(format!("{err}"), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = StreamError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
    }

    #[test]
    fn open_reader_reports_status() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/missing.pdf").with_status(404).create();

        let url = format!("{}/missing.pdf", server.url());
        let err = open_reader(&url, Duration::from_secs(5)).err().unwrap();
        assert_eq!(err.status(), Some(404));
        mock.assert();
    }

    #[test]
    fn open_reader_streams_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/paper.pdf")
            .with_body("%PDF-1.4 body")
            .create();

        let url = format!("{}/paper.pdf", server.url());
        let (mut reader, _) = open_reader(&url, Duration::from_secs(5)).unwrap();
        let mut body = String::new();
        reader.read_to_string(&mut body).unwrap();
        assert_eq!(body, "%PDF-1.4 body");
        mock.assert();
    }
}
