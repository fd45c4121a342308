//! Table and text extraction from PDFs using lopdf
//!
//! This crate provides:
//! - File intake into a per-session scratch directory, with a validity check
//! - Page-by-page table detection with option fallbacks, through a native
//!   layout detector or the tabula-java runtime
//! - Plain text extraction per page
//! - Spreadsheet output, one sheet per detected table

pub mod document;
pub mod extractor;
pub mod fallback;
pub mod intake;
pub mod options;
pub mod session;
pub mod table;
pub mod tables;
pub mod tabula;
pub mod text;
pub mod workbook;

pub use document::{FileDetails, SourceDocument};
pub use fallback::{extract_page_tables, extract_range_tables, PageTables};
pub use intake::{sanitize_filename, SourceInput};
pub use options::{ExtractionOptions, FallbackPolicy, PageRange};
pub use session::{ActionReport, Artifact, Session};
pub use table::Table;
pub use tables::{LayoutConfig, LayoutDetector, TableDetector};
pub use tabula::{TabulaConfig, TabulaDetector, TabulaPage};
pub use text::{extract_range_text, PageText};
pub use workbook::{write_workbook, TableSet};

use std::path::{Path, PathBuf};

/// Extract tables from a PDF on disk with the native detector and return
/// the `Table_<M>` labelled set
pub fn extract_tables<P: AsRef<Path>>(
    path: P,
    range: PageRange,
    options: ExtractionOptions,
) -> Result<TableSet, PdfError> {
    let source = SourceDocument::open(path)?;
    let pages = extract_range_tables(
        &LayoutDetector::default(),
        &source,
        range,
        FallbackPolicy::ThreeTier(options),
    )?;
    Ok(workbook::label_by_position(&pages))
}

/// Extract page text and `Page<N>_Table<M>` labelled tables from a PDF on
/// disk with the native detector
pub fn extract_site_info<P: AsRef<Path>>(
    path: P,
    range: PageRange,
) -> Result<(Vec<PageText>, TableSet), PdfError> {
    let source = SourceDocument::open(path)?;
    let text = extract_range_text(&source, range)?;
    let pages = extract_range_tables(
        &LayoutDetector::default(),
        &source,
        range,
        FallbackPolicy::LatticeThenStream,
    )?;
    Ok((text, workbook::label_by_page(&pages)))
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("PDF file is empty")]
    EmptyFile,
    #[error("PDF has no pages")]
    NoPages,
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),
    #[error("Page {page} is out of range, document has {page_count} pages")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("Text extraction failed on page {page}: {reason}")]
    TextExtraction { page: u32, reason: String },
    #[error("Spreadsheet error: {0}")]
    Workbook(String),
    #[error("Tabula error: {0}")]
    Tabula(String),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for PdfError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        PdfError::Workbook(e.to_string())
    }
}
