//! CSV manifest listing the papers to harvest
//!
//! Columns are matched by header name (`paper_id`, `forum`, `title`,
//! `pdf_url`); order does not matter and extra columns are ignored.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One manifest row. Fields are trimmed; absent columns read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManifestRow {
    pub paper_id: String,
    pub forum: String,
    pub title: String,
    pub pdf_url: String,
}

impl ManifestRow {
    /// Folder/file key: `paper_id`, falling back to `forum`.
    pub fn identifier(&self) -> Option<&str> {
        [self.paper_id.as_str(), self.forum.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}

/// Contiguous slice of the manifest for chunked runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Batch {
    /// 0-based index of the first row
    pub start: usize,
    /// Number of rows; `None` processes the whole manifest
    pub size: Option<usize>,
}

impl Batch {
    /// Keep rows `[start, start + size)`, clamped to the manifest length.
    ///
    /// Without a size every row is kept and `start` is ignored.
    pub fn apply(&self, rows: Vec<ManifestRow>) -> Vec<ManifestRow> {
        let Some(size) = self.size else {
            return rows;
        };
        rows.into_iter().skip(self.start).take(size).collect()
    }

    /// Exclusive end index, when sliced
    pub fn end(&self) -> Option<usize> {
        self.size.map(|size| self.start.saturating_add(size))
    }
}

/// Read every row of the manifest at `path`.
///
/// A missing file is fatal; so is a record the CSV reader cannot decode.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>> {
    anyhow::ensure!(path.exists(), "Manifest not found at {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open manifest {}", path.display()))?;

    let rows = reader
        .deserialize::<ManifestRow>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Malformed manifest {}", path.display()))?;

    log::debug!("{}: {} rows", path.display(), rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn row(paper_id: &str, forum: &str) -> ManifestRow {
        ManifestRow {
            paper_id: paper_id.to_string(),
            forum: forum.to_string(),
            ..Default::default()
        }
    }

    fn write_csv(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("manifest.csv");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn identifier_prefers_paper_id() {
        assert_eq!(row("p1", "f1").identifier(), Some("p1"));
        assert_eq!(row("", "f1").identifier(), Some("f1"));
        assert_eq!(row("", "").identifier(), None);
    }

    #[test]
    fn reads_columns_by_name() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "title,pdf_url,extra,forum,paper_id\n\
             \"Attention, Again\", https://x.org/p1.pdf ,zz,f1,p1\n\
             Second,,,f2,\n",
        );

        let rows = read_manifest(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            ManifestRow {
                paper_id: "p1".into(),
                forum: "f1".into(),
                title: "Attention, Again".into(),
                pdf_url: "https://x.org/p1.pdf".into(),
            }
        );
        assert_eq!(rows[1].identifier(), Some("f2"));
        assert!(rows[1].pdf_url.is_empty());
    }

    #[test]
    fn missing_column_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "paper_id,pdf_url\np1,https://x.org/p1.pdf\n");

        let rows = read_manifest(&path).unwrap();
        assert_eq!(rows[0].forum, "");
        assert_eq!(rows[0].title, "");
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = read_manifest(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("Manifest not found"));
    }

    #[test]
    fn batch_slices_range() {
        let rows: Vec<_> = (0..5).map(|i| row(&format!("p{i}"), "")).collect();
        let batch = Batch {
            start: 1,
            size: Some(2),
        };
        let ids: Vec<_> = batch
            .apply(rows)
            .iter()
            .map(|r| r.paper_id.clone())
            .collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert_eq!(batch.end(), Some(3));
    }

    #[test]
    fn batch_clamps_past_end() {
        let rows: Vec<_> = (0..3).map(|i| row(&format!("p{i}"), "")).collect();
        let batch = Batch {
            start: 2,
            size: Some(10),
        };
        assert_eq!(batch.apply(rows).len(), 1);
    }

    #[test]
    fn batch_without_size_keeps_all() {
        let rows: Vec<_> = (0..3).map(|i| row(&format!("p{i}"), "")).collect();
        let batch = Batch {
            start: 2,
            size: None,
        };
        assert_eq!(batch.apply(rows).len(), 3);
        assert_eq!(batch.end(), None);
    }
}
