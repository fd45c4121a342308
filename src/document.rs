//! Source document loading and validity checks

use crate::PdfError;
use lopdf::Document;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A staged PDF that passed the validity check
#[derive(Debug)]
pub struct SourceDocument {
    path: PathBuf,
    byte_size: u64,
    page_count: u32,
    doc: Document,
}

impl SourceDocument {
    /// Open and validate a PDF: it must exist, be non-empty, parse, and
    /// have at least one page.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PdfError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PdfError::NotFound(path.to_path_buf()));
        }

        let byte_size = std::fs::metadata(path)?.len();
        if byte_size == 0 {
            return Err(PdfError::EmptyFile);
        }

        let doc = Document::load(path)?;
        let page_count = doc.get_pages().len() as u32;
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        Ok(Self {
            path: path.to_path_buf(),
            byte_size,
            page_count,
            doc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// File stem used to name output artifacts
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }

    pub fn details(&self) -> FileDetails {
        FileDetails {
            file_name: self
                .path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_kb: self.byte_size as f64 / 1024.0,
            absolute_path: std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone()),
            page_count: self.page_count,
        }
    }
}

/// What the user is shown about a staged file before extraction
#[derive(Debug, Clone, Serialize)]
pub struct FileDetails {
    pub file_name: String,
    pub size_kb: f64,
    pub absolute_path: PathBuf,
    pub page_count: u32,
}

impl fmt::Display for FileDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File: {}", self.file_name)?;
        writeln!(f, "Size: {:.2} KB", self.size_kb)?;
        writeln!(f, "Path: {}", self.absolute_path.display())?;
        write!(f, "Pages: {}", self.page_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file() {
        let err = SourceDocument::open("/nonexistent/report.pdf").unwrap_err();
        assert!(matches!(err, PdfError::NotFound(_)));
    }

    #[test]
    fn test_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = SourceDocument::open(file.path()).unwrap_err();
        assert!(matches!(err, PdfError::EmptyFile));
    }

    #[test]
    fn test_corrupt_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a pdf at all").unwrap();
        let err = SourceDocument::open(file.path()).unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn test_details_display() {
        let details = FileDetails {
            file_name: "report.pdf".into(),
            size_kb: 12.5,
            absolute_path: PathBuf::from("/tmp/report.pdf"),
            page_count: 3,
        };
        let shown = details.to_string();
        assert!(shown.contains("Size: 12.50 KB"));
        assert!(shown.contains("Pages: 3"));
    }
}
