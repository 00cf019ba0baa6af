//! Harvest pipeline configuration

use std::path::PathBuf;
use std::time::Duration;

use grobline_core::RetryPolicy;

use crate::fetch::DOWNLOAD_TIMEOUT;
use crate::grobid::{DEFAULT_GROBID_URL, EXTRACT_TIMEOUT};
use crate::manifest::Batch;

/// Runtime configuration for one harvest run
#[derive(Debug, Clone)]
pub struct Config {
    /// CSV manifest to read
    pub manifest: PathBuf,
    /// Root under which per-paper folders are created
    pub output_dir: PathBuf,
    /// GROBID base URL
    pub grobid_url: String,
    /// Pause after each GROBID extraction
    pub sleep: Duration,
    /// Slice of the manifest to process
    pub batch: Batch,
    /// GROBID retry policy
    pub retry: RetryPolicy,
    /// Stall timeout for PDF downloads
    pub download_timeout: Duration,
    /// Whole-request timeout for GROBID calls
    pub extract_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("2025_iclr_pdfs_urls.csv"),
            output_dir: PathBuf::from("ICLR2025_papers"),
            grobid_url: DEFAULT_GROBID_URL.to_string(),
            sleep: Duration::from_millis(200),
            batch: Batch::default(),
            retry: RetryPolicy::default(),
            download_timeout: DOWNLOAD_TIMEOUT,
            extract_timeout: EXTRACT_TIMEOUT,
        }
    }
}
