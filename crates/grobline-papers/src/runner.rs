//! Two-pass harvest runner
//!
//! Pass 1 downloads every PDF, pass 2 runs GROBID and writes `meta.json`.
//! Every artifact is existence-gated, so re-running after a partial run only
//! redoes what is missing. Row failures are recorded and never abort the run.

use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use grobline_core::{SharedProgress, cleanup_tmp_files, fmt_num, shutdown_flag};

use crate::config::Config;
use crate::fetch::{Downloader, FetchError, HttpFetcher};
use crate::grobid::{ExtractError, Extractor, GrobidClient};
use crate::layout::PaperPaths;
use crate::manifest::{ManifestRow, read_manifest};
use crate::meta::PaperMeta;
use crate::report::{ErrorLog, ErrorRecord};

/// Why a row did not make it through a pass
#[derive(Debug)]
pub enum RowError {
    MissingPdfUrl,
    MissingIds,
    PdfNotDownloaded,
    Download(FetchError),
    Extract(ExtractError),
    Metadata(io::Error),
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPdfUrl => write!(f, "missing_pdf_url"),
            Self::MissingIds => write!(f, "missing_ids"),
            Self::PdfNotDownloaded => write!(f, "pdf_not_downloaded"),
            Self::Download(e) => write!(f, "download failed: {e}"),
            Self::Extract(e) => write!(f, "extraction failed: {e}"),
            Self::Metadata(e) => write!(f, "metadata write failed: {e}"),
        }
    }
}

impl std::error::Error for RowError {}

/// Result of one row in one pass
#[derive(Debug)]
pub enum RowOutcome {
    /// Work was performed
    Done,
    /// Artifacts already present
    Skipped,
    Failed(RowError),
}

/// Pipeline execution summary
#[derive(Debug, Default)]
pub struct Summary {
    pub total_rows: usize,
    pub downloaded: usize,
    pub skipped_downloads: usize,
    pub parsed: usize,
    pub skipped_parses: usize,
    pub errors: ErrorLog,
    /// Set when a shutdown signal stopped the run early
    pub interrupted: bool,
    /// Written error log, if any row failed
    pub error_log: Option<PathBuf>,
    pub elapsed: Duration,
}

impl Summary {
    pub fn download_errors(&self) -> usize {
        self.errors.download_errors.len()
    }

    pub fn parse_errors(&self) -> usize {
        self.errors.parse_errors.len()
    }

    pub fn log(&self) {
        log::info!("=== Harvest Summary ===");
        log::info!("Total rows: {}", fmt_num(self.total_rows));
        log::info!(
            "Downloads: {} new, {} present, {} errors",
            fmt_num(self.downloaded),
            fmt_num(self.skipped_downloads),
            fmt_num(self.download_errors())
        );
        log::info!(
            "Parses: {} new, {} present, {} errors",
            fmt_num(self.parsed),
            fmt_num(self.skipped_parses),
            fmt_num(self.parse_errors())
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if let Some(path) = &self.error_log {
            log::info!("Error details written to: {}", path.display());
        }
    }
}

/// Row either rejected up front or resolved to its identifier
fn validate(row: &ManifestRow) -> Result<&str, RowError> {
    if row.pdf_url.is_empty() {
        return Err(RowError::MissingPdfUrl);
    }
    row.identifier().ok_or(RowError::MissingIds)
}

/// Sequential two-pass pipeline over a fetcher and an extractor
pub struct Pipeline<'a, D, E> {
    config: &'a Config,
    downloader: D,
    extractor: E,
    progress: SharedProgress,
    stop: &'a AtomicBool,
    /// Set once the extractor's readiness has been checked
    readiness_checked: Cell<bool>,
}

impl<'a, D: Downloader, E: Extractor> Pipeline<'a, D, E> {
    pub fn new(config: &'a Config, downloader: D, extractor: E, progress: SharedProgress) -> Self {
        Self {
            config,
            downloader,
            extractor,
            progress,
            stop: shutdown_flag(),
            readiness_checked: Cell::new(false),
        }
    }

    /// Use `stop` instead of the process-wide shutdown flag.
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = stop;
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Run both passes over `rows`, then write the error log if needed.
    ///
    /// Creates the output root and removes `*.tmp` leftovers of a killed run
    /// before the first pass.
    pub fn run(&self, rows: &[ManifestRow]) -> Result<Summary> {
        let start = Instant::now();
        let root = &self.config.output_dir;
        std::fs::create_dir_all(root)
            .with_context(|| format!("Cannot create output directory {}", root.display()))?;
        let removed = cleanup_stale_tmp(root).context("Failed to clean stale tmp files")?;
        if removed > 0 {
            log::info!("Removed {removed} stale tmp files");
        }

        let mut summary = Summary {
            total_rows: rows.len(),
            ..Default::default()
        };

        self.download_pass(rows, &mut summary);
        if !summary.interrupted {
            self.parse_pass(rows, &mut summary);
        }

        summary.error_log = summary
            .errors
            .write_if_any(root)
            .context("Failed to write error log")?;
        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    fn download_pass(&self, rows: &[ManifestRow], summary: &mut Summary) {
        log::info!("Pass 1: downloading {} PDFs", fmt_num(rows.len()));
        let pb = self.progress.pass_bar("Download", rows.len());

        for (idx, row) in rows.iter().enumerate().map(|(i, r)| (i + 1, r)) {
            if self.stop_requested() {
                log::warn!("Shutdown requested, stopping before row {idx}");
                summary.interrupted = true;
                break;
            }
            pb.set_message(row.identifier().unwrap_or("?").to_string());

            match self.download_row(row) {
                RowOutcome::Done => summary.downloaded += 1,
                RowOutcome::Skipped => summary.skipped_downloads += 1,
                RowOutcome::Failed(e) => {
                    log::warn!("row {idx} ({}): {e}", row.paper_id);
                    summary.errors.download_errors.push(ErrorRecord(
                        idx,
                        row.paper_id.clone(),
                        e.to_string(),
                    ));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    fn download_row(&self, row: &ManifestRow) -> RowOutcome {
        let id = match validate(row) {
            Ok(id) => id,
            Err(e) => return RowOutcome::Failed(e),
        };
        let paths = PaperPaths::new(&self.config.output_dir, id);
        if paths.pdf.exists() {
            log::debug!("{id}: PDF present");
            return RowOutcome::Skipped;
        }

        match self.downloader.download(&row.pdf_url, &paths.pdf) {
            Ok(bytes) => {
                log::info!("{id}: downloaded {} bytes", fmt_num(bytes as usize));
                RowOutcome::Done
            }
            Err(e) => RowOutcome::Failed(RowError::Download(e)),
        }
    }

    fn parse_pass(&self, rows: &[ManifestRow], summary: &mut Summary) {
        log::info!("Pass 2: parsing PDFs with GROBID");
        let pb = self.progress.pass_bar("Parse", rows.len());

        for (idx, row) in rows.iter().enumerate().map(|(i, r)| (i + 1, r)) {
            if self.stop_requested() {
                log::warn!("Shutdown requested, stopping before row {idx}");
                summary.interrupted = true;
                break;
            }
            // Already recorded as `missing_pdf_url` in pass 1
            if row.pdf_url.is_empty() && row.identifier().is_some() {
                pb.inc(1);
                continue;
            }
            pb.set_message(row.identifier().unwrap_or("?").to_string());

            match self.parse_row(row) {
                RowOutcome::Done => summary.parsed += 1,
                RowOutcome::Skipped => summary.skipped_parses += 1,
                RowOutcome::Failed(e) => {
                    log::warn!("row {idx} ({}): {e}", row.paper_id);
                    summary.errors.parse_errors.push(ErrorRecord(
                        idx,
                        row.paper_id.clone(),
                        e.to_string(),
                    ));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
    }

    fn parse_row(&self, row: &ManifestRow) -> RowOutcome {
        let Some(id) = row.identifier() else {
            return RowOutcome::Failed(RowError::MissingIds);
        };
        let paths = PaperPaths::new(&self.config.output_dir, id);
        if !paths.pdf.exists() {
            return RowOutcome::Failed(RowError::PdfNotDownloaded);
        }

        let mut extracted = false;
        if !paths.tei.exists() {
            self.check_readiness_once();
            if let Err(e) = self.extractor.extract(&paths.pdf, &paths.tei) {
                return RowOutcome::Failed(RowError::Extract(e));
            }
            log::info!("{id}: TEI written");
            extracted = true;
            if !self.config.sleep.is_zero() {
                std::thread::sleep(self.config.sleep);
            }
        }

        if !paths.meta.exists() {
            if let Err(e) = PaperMeta::from(row).write(&paths.meta) {
                return RowOutcome::Failed(RowError::Metadata(e));
            }
        }

        if extracted {
            RowOutcome::Done
        } else {
            RowOutcome::Skipped
        }
    }

    /// Warn when the extractor is unreachable, at most once per pipeline.
    fn check_readiness_once(&self) {
        if self.readiness_checked.replace(true) {
            return;
        }
        if !self.extractor.is_ready() {
            log::warn!("Extraction service is not answering; parse pass will record failures");
        }
    }
}

/// Remove `*.tmp` leftovers of a killed run from every paper directory.
fn cleanup_stale_tmp(output_root: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(output_root)? {
        let path = entry?.path();
        if path.is_dir() {
            removed += cleanup_tmp_files(&path)?;
        }
    }
    Ok(removed)
}

/// Startup lines naming the service, pacing, input, output and batch slice.
fn banner(config: &Config, selected: usize, manifest_rows: usize) -> Vec<String> {
    let mut lines = vec![
        format!("Using GROBID at: {}", config.grobid_url),
        format!("GROBID sleep between calls: {}s", config.sleep.as_secs_f64()),
        format!("Reading URLs from: {}", config.manifest.display()),
        format!("Writing per-paper folders under: {}", config.output_dir.display()),
    ];
    if let Some(end) = config.batch.end() {
        lines.push(format!(
            "Processing batch rows [{}:{end}] ({} of {} rows)",
            config.batch.start,
            fmt_num(selected),
            fmt_num(manifest_rows)
        ));
    }
    lines
}

/// Run the harvest described by `config` against live services.
pub fn run(config: &Config, progress: SharedProgress) -> Result<Summary> {
    let rows = read_manifest(&config.manifest)?;
    let manifest_rows = rows.len();
    let rows = config.batch.apply(rows);

    for line in banner(config, rows.len(), manifest_rows) {
        progress.println(line);
    }

    let grobid = GrobidClient::new(&config.grobid_url)
        .with_retry(config.retry)
        .with_timeout(config.extract_timeout);

    let pipeline = Pipeline::new(
        config,
        HttpFetcher::new(config.download_timeout),
        grobid,
        progress,
    );
    let summary = pipeline.run(&rows)?;
    summary.log();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(paper_id: &str, forum: &str, pdf_url: &str) -> ManifestRow {
        ManifestRow {
            paper_id: paper_id.into(),
            forum: forum.into(),
            title: String::new(),
            pdf_url: pdf_url.into(),
        }
    }

    #[test]
    fn validate_checks_url_before_ids() {
        assert!(matches!(
            validate(&row("", "", "")),
            Err(RowError::MissingPdfUrl)
        ));
        assert!(matches!(
            validate(&row("", "", "http://x")),
            Err(RowError::MissingIds)
        ));
        assert_eq!(validate(&row("", "f1", "http://x")).unwrap(), "f1");
    }

    #[test]
    fn row_error_reasons() {
        assert_eq!(RowError::MissingPdfUrl.to_string(), "missing_pdf_url");
        assert_eq!(RowError::MissingIds.to_string(), "missing_ids");
        assert_eq!(RowError::PdfNotDownloaded.to_string(), "pdf_not_downloaded");
        assert_eq!(
            RowError::Download(FetchError::EmptyUrl).to_string(),
            "download failed: empty URL"
        );
    }

    #[test]
    fn banner_names_batch_slice_only_when_sliced() {
        let mut config = Config {
            grobid_url: "http://grobid:8070".into(),
            sleep: Duration::from_millis(500),
            ..Default::default()
        };
        let lines = banner(&config, 10, 10);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Using GROBID at: http://grobid:8070");
        assert_eq!(lines[1], "GROBID sleep between calls: 0.5s");

        config.batch = crate::manifest::Batch {
            start: 1_000,
            size: Some(500),
        };
        let lines = banner(&config, 500, 11_672);
        assert_eq!(
            lines.last().unwrap(),
            "Processing batch rows [1000:1500] (500 of 11,672 rows)"
        );
    }

    #[test]
    fn cleanup_walks_paper_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let paper = dir.path().join("p1");
        std::fs::create_dir_all(&paper).unwrap();
        std::fs::write(paper.join("p1.pdf.tmp"), b"half").unwrap();
        std::fs::write(dir.path().join("grobid_errors.json"), b"{}").unwrap();

        assert_eq!(cleanup_stale_tmp(dir.path()).unwrap(), 1);
        assert!(!paper.join("p1.pdf.tmp").exists());
    }
}
