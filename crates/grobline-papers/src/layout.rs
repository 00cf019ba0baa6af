//! On-disk layout of a harvested paper

use std::path::{Path, PathBuf};

/// Error log written at the output root when any row failed
pub const ERROR_LOG_NAME: &str = "grobid_errors.json";

/// Metadata sidecar name inside each paper directory
pub const META_NAME: &str = "meta.json";

/// Paths of the three artifacts kept for one identifier:
///
/// ```text
/// {root}/{id}/{id}.pdf
/// {root}/{id}/{id}.tei.xml
/// {root}/{id}/meta.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperPaths {
    pub dir: PathBuf,
    pub pdf: PathBuf,
    pub tei: PathBuf,
    pub meta: PathBuf,
}

impl PaperPaths {
    pub fn new(output_root: &Path, identifier: &str) -> Self {
        let dir = output_root.join(identifier);
        Self {
            pdf: dir.join(format!("{identifier}.pdf")),
            tei: dir.join(format!("{identifier}.tei.xml")),
            meta: dir.join(META_NAME),
            dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_share_one_directory() {
        let paths = PaperPaths::new(Path::new("out"), "abc123");
        assert_eq!(paths.dir, PathBuf::from("out/abc123"));
        assert_eq!(paths.pdf, PathBuf::from("out/abc123/abc123.pdf"));
        assert_eq!(paths.tei, PathBuf::from("out/abc123/abc123.tei.xml"));
        assert_eq!(paths.meta, PathBuf::from("out/abc123/meta.json"));
    }
}
