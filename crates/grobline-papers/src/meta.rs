//! Metadata sidecar (`meta.json`) recording the manifest row

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::manifest::ManifestRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMeta {
    pub paper_id: String,
    pub forum: String,
    pub title: String,
    pub pdf_url: String,
}

impl From<&ManifestRow> for PaperMeta {
    fn from(row: &ManifestRow) -> Self {
        Self {
            paper_id: row.paper_id.clone(),
            forum: row.forum.clone(),
            title: row.title.clone(),
            pdf_url: row.pdf_url.clone(),
        }
    }
}

impl PaperMeta {
    /// Pretty-printed JSON, non-ASCII kept as-is.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        grobline_core::write_atomic(path, json.as_bytes())?;
        Ok(())
    }
}
