//! Grobline Papers - PDF harvest and GROBID TEI extraction
//!
//! Reads a CSV manifest of papers, downloads each PDF, converts it to TEI XML
//! with a GROBID service and keeps one folder per paper:
//!
//! ```text
//! {output}/{id}/{id}.pdf
//! {output}/{id}/{id}.tei.xml
//! {output}/{id}/meta.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grobline_papers::{Config, run};
//!
//! let config = Config {
//!     manifest: "papers.csv".into(),
//!     output_dir: "papers".into(),
//!     ..Default::default()
//! };
//!
//! let summary = run(&config, progress)?;
//! println!("{} download errors", summary.download_errors());
//! ```

pub mod config;
pub mod fetch;
pub mod grobid;
pub mod layout;
pub mod manifest;
pub mod meta;
pub mod report;
pub mod runner;

// Re-exports
pub use config::Config;
pub use fetch::{Downloader, FetchError, HttpFetcher};
pub use grobid::{ExtractError, Extractor, GrobidClient};
pub use layout::PaperPaths;
pub use manifest::{Batch, ManifestRow, read_manifest};
pub use report::{ErrorLog, ErrorRecord};
pub use runner::{Pipeline, RowError, RowOutcome, Summary, run};
