use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ReportError;

pub const DEFAULT_FILE_STEM: &str = "incident-report";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_file_stem(title: &str) -> String {
    title
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// `<sanitized title>.pdf`, or `<fallback>.pdf` for an empty title.
pub fn output_file_name(title: &str, fallback: &str) -> String {
    let stem = sanitize_file_stem(title);
    if stem.is_empty() {
        format!("{}.pdf", sanitize_file_stem(fallback))
    } else {
        format!("{stem}.pdf")
    }
}

/// A finished PDF held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl RenderedReport {
    /// Write the PDF into `dir` under its file name. The bytes go to a
    /// temporary file in the same directory that is renamed into place, so
    /// readers never observe a partial file.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
        let dir = dir.as_ref();
        let target = dir.join(&self.file_name);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&self.bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|err| ReportError::Output(err.error))?;
        tracing::info!(
            path = %target.display(),
            bytes = self.bytes.len(),
            pages = self.page_count,
            "wrote report"
        );
        Ok(target)
    }
}
