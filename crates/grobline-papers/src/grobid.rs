//! GROBID client: PDF in, TEI XML out
//!
//! Transport failures are retried with linear backoff. A response that is not
//! a TEI document (GROBID can answer an HTML error page with status 200) is
//! rejected without retry.

use std::io;
use std::path::Path;
use std::time::Duration;

use quick_xml::events::Event;
use reqwest::multipart::{Form, Part};

use grobline_core::{
    RetryPolicy, Retryable, StreamError, post_multipart, probe, retry_with_backoff, write_atomic,
};

/// Default service location
pub const DEFAULT_GROBID_URL: &str = "http://localhost:8070";

/// Full-text extraction endpoint, relative to the base URL
const FULLTEXT_PATH: &str = "api/processFulltextDocument";

/// Liveness endpoint, relative to the base URL
const ISALIVE_PATH: &str = "api/isalive";

/// Extraction is slow on large PDFs
pub const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

const ISALIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an extraction failed
#[derive(Debug)]
pub enum ExtractError {
    /// Reading the PDF or writing the TEI file failed
    Io(io::Error),
    /// Request or status failure, after retries
    Http(StreamError),
    /// Service answered, but not with a TEI document
    InvalidResponse(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Http(e) => write!(f, "{e}"),
            Self::InvalidResponse(msg) => write!(f, "invalid GROBID response: {msg}"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl Retryable for ExtractError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retryable(),
            Self::Io(_) | Self::InvalidResponse(_) => false,
        }
    }
}

/// Converts a local PDF into a structured document on disk.
pub trait Extractor {
    fn extract(&self, pdf_path: &Path, output_path: &Path) -> Result<(), ExtractError>;

    /// Whether the backing service looks reachable.
    fn is_ready(&self) -> bool {
        true
    }
}

impl<T: Extractor + ?Sized> Extractor for &T {
    fn extract(&self, pdf_path: &Path, output_path: &Path) -> Result<(), ExtractError> {
        (**self).extract(pdf_path, output_path)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Client for a running GROBID service
#[derive(Debug, Clone)]
pub struct GrobidClient {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GrobidClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: EXTRACT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Whether the service answers its liveness probe.
    pub fn is_alive(&self) -> bool {
        match probe(&self.url(ISALIVE_PATH), ISALIVE_TIMEOUT) {
            Ok(status) => (200..300).contains(&status),
            Err(e) => {
                log::debug!("GROBID liveness probe failed: {e}");
                false
            }
        }
    }

    /// One POST of the PDF; the form is rebuilt per attempt.
    fn submit(&self, pdf: &[u8], filename: &str) -> Result<String, ExtractError> {
        let part = Part::bytes(pdf.to_vec())
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ExtractError::Http(StreamError::from_reqwest(&e)))?;
        let form = Form::new()
            .part("input", part)
            .text("consolidateHeader", "1")
            .text("consolidateCitations", "0");

        post_multipart(&self.url(FULLTEXT_PATH), form, self.timeout).map_err(ExtractError::Http)
    }
}

impl Extractor for GrobidClient {
    fn extract(&self, pdf_path: &Path, output_path: &Path) -> Result<(), ExtractError> {
        let pdf = std::fs::read(pdf_path).map_err(ExtractError::Io)?;
        let filename = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string());

        let body = retry_with_backoff(&filename, &self.retry, |attempt| {
            log::debug!("{filename}: POST attempt {attempt}");
            self.submit(&pdf, &filename)
        })?;

        let tei = body.trim();
        if !is_tei_document(tei) {
            return Err(ExtractError::InvalidResponse(format!(
                "empty or non-TEI body ({})",
                preview(tei)
            )));
        }

        write_atomic(output_path, tei.as_bytes()).map_err(ExtractError::Io)?;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.is_alive()
    }
}

/// True when the document's root element is `TEI`.
pub fn is_tei_document(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let mut reader = quick_xml::Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e.local_name().as_ref() == b"TEI";
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => {}
        }
    }
}

/// First few characters of a body, for error messages
fn preview(text: &str) -> String {
    const MAX: usize = 60;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None if text.is_empty() => "empty".to_string(),
        None => text.to_string(),
    }
}
