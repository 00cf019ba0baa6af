//! Per-row error records and the JSON error log

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::layout::ERROR_LOG_NAME;

/// `(row_index, paper_id, reason)`, serialized as a 3-element array.
///
/// `row_index` is 1-based within the processed rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord(pub usize, pub String, pub String);

impl ErrorRecord {
    pub fn index(&self) -> usize {
        self.0
    }

    pub fn paper_id(&self) -> &str {
        &self.1
    }

    pub fn reason(&self) -> &str {
        &self.2
    }
}

/// Errors collected over both passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLog {
    pub download_errors: Vec<ErrorRecord>,
    pub parse_errors: Vec<ErrorRecord>,
}

impl ErrorLog {
    pub fn is_empty(&self) -> bool {
        self.download_errors.is_empty() && self.parse_errors.is_empty()
    }

    /// Write `{output_root}/grobid_errors.json` if anything failed.
    ///
    /// Returns the path written, or `None` when there was nothing to report.
    pub fn write_if_any(&self, output_root: &Path) -> std::io::Result<Option<PathBuf>> {
        if self.is_empty() {
            return Ok(None);
        }
        let path = output_root.join(ERROR_LOG_NAME);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        grobline_core::write_atomic(&path, json.as_bytes())?;
        Ok(Some(path))
    }
}
