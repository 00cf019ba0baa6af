//! PDF fetcher: streaming HTTP GET into an atomic file sink
//!
//! No retry here: a failed download surfaces immediately and is recorded
//! by the runner. The next run starts that download again from zero.

use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use grobline_core::{FileSink, StreamError, open_reader};

/// Maximum bytes written per chunk
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Stall timeout for the PDF host
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Why a download failed
#[derive(Debug)]
pub enum FetchError {
    /// Nothing to fetch
    EmptyUrl,
    /// Request, status or body read failed
    Stream(StreamError),
    /// Local write failed
    Io(io::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "empty URL"),
            Self::Stream(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Retrieves a URL into a local file.
pub trait Downloader {
    /// Fetch `url` into `destination`, replacing nothing that is already
    /// complete: callers check for an existing file first. Returns bytes written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;
}

impl<T: Downloader + ?Sized> Downloader for &T {
    fn download(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        (**self).download(url, destination)
    }
}

/// Downloader over the shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    read_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DOWNLOAD_TIMEOUT)
    }
}

impl Downloader for HttpFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        if url.is_empty() {
            return Err(FetchError::EmptyUrl);
        }

        let mut sink = FileSink::new(destination).map_err(FetchError::Io)?;
        let (mut reader, total_bytes) =
            open_reader(url, self.read_timeout).map_err(FetchError::Stream)?;
        log::debug!("GET {url}: {total_bytes:?} bytes announced");

        copy_chunks(&mut reader, &mut sink)?;
        sink.finalize().map_err(FetchError::Io)
    }
}

/// Pump `reader` into `sink` in chunks of at most [`CHUNK_SIZE`] bytes,
/// skipping empty reads. Read failures are network failures.
fn copy_chunks(reader: &mut impl Read, sink: &mut FileSink) -> Result<u64, FetchError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(copied),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FetchError::Stream(StreamError::Io(e))),
        };
        sink.write_chunk(&buf[..n]).map_err(FetchError::Io)?;
        copied += n as u64;
    }
}
