//! Output sinks with atomic tmp→rename
//!
//! A finished artifact only ever appears under its final name, so an
//! existence check on the final path implies the file is complete.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the final filename while writing
const TMP_SUFFIX: &str = "tmp";

/// Buffered file writer with atomic tmp→rename.
///
/// Dropping the sink without calling [`FileSink::finalize`] removes the
/// temporary file.
pub struct FileSink {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("final_path", &self.final_path)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl FileSink {
    /// Create a new sink writing to `{final_path}.tmp`.
    ///
    /// Creates missing parent directories.
    pub fn new(final_path: &Path) -> io::Result<Self> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(final_path);

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            tmp_path,
            final_path: final_path.to_path_buf(),
            bytes_written: 0,
        })
    }

    /// Append a chunk
    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("sink already finalized"))?;
        writer.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and atomically rename tmp → final. Returns bytes written.
    pub fn finalize(mut self) -> io::Result<u64> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(self.bytes_written)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Only reached with a live writer when finalize was never called
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Write a whole buffer through a [`FileSink`].
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<u64> {
    let mut sink = FileSink::new(path)?;
    sink.write_chunk(contents)?;
    sink.finalize()
}

/// `paper.pdf` → `paper.pdf.tmp`
pub fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".");
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Remove stale .tmp files in the given directory. Returns how many were removed.
pub fn cleanup_tmp_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == TMP_SUFFIX) {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finalize_renames_into_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/paper.pdf");

        let mut sink = FileSink::new(&path).unwrap();
        sink.write_chunk(b"%PDF").unwrap();
        sink.write_chunk(b"-1.7").unwrap();
        assert!(!path.exists());
        assert!(tmp_path_for(&path).exists());

        assert_eq!(sink.finalize().unwrap(), 8);
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7");
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn drop_without_finalize_removes_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        {
            let mut sink = FileSink::new(&path).unwrap();
            sink.write_chunk(b"partial").unwrap();
        }
        assert!(!path.exists());
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn write_atomic_whole_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path_for(Path::new("out/p1/p1.tei.xml")),
            PathBuf::from("out/p1/p1.tei.xml.tmp")
        );
    }

    #[test]
    fn cleanup_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("p1.pdf.tmp"), b"x").unwrap();
        fs::write(dir.path().join("p1.pdf"), b"x").unwrap();

        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 1);
        assert!(dir.path().join("p1.pdf").exists());
        assert!(!dir.path().join("p1.pdf.tmp").exists());
    }
}
