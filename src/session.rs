//! One user session: stage an input, run an action, hand back artifacts
//!
//! The scratch directory is wiped after every action whether it succeeded
//! or not. Artifacts are held in memory so they outlive the wipe.

use crate::document::{FileDetails, SourceDocument};
use crate::fallback::extract_range_tables;
use crate::intake::{ScratchDir, SourceInput};
use crate::options::{ExtractionOptions, FallbackPolicy, PageRange};
use crate::tables::{LayoutDetector, TableDetector};
use crate::text::{extract_range_text, render_text_file, PageText};
use crate::workbook::{label_by_page, label_by_position, write_workbook, TableSet};
use crate::PdfError;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub const TEXT_MIME: &str = "text/plain";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A generated file offered for download
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl Artifact {
    fn text(stem: &str, pages: &[PageText]) -> Self {
        Self {
            file_name: format!("{}_text.txt", stem),
            mime_type: TEXT_MIME,
            data: render_text_file(pages).into_bytes(),
        }
    }

    fn workbook(stem: &str, tables: &TableSet) -> Result<Self, PdfError> {
        Ok(Self {
            file_name: format!("{}_tables.xlsx", stem),
            mime_type: XLSX_MIME,
            data: write_workbook(tables)?,
        })
    }

    /// Write the artifact into `dir`, returning the path written
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf, PdfError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.data)?;
        Ok(path)
    }
}

/// Everything one action produced
#[derive(Debug)]
pub struct ActionReport {
    pub details: FileDetails,
    pub range: PageRange,
    /// Non-empty tables by sheet label
    pub tables: TableSet,
    pub pages: Vec<PageText>,
    pub text: Option<Artifact>,
    pub workbook: Option<Artifact>,
}

impl ActionReport {
    fn new(details: FileDetails, range: PageRange) -> Self {
        Self {
            details,
            range,
            tables: TableSet::new(),
            pages: Vec::new(),
            text: None,
            workbook: None,
        }
    }

    /// Artifacts in the order they are offered
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.text.iter().chain(self.workbook.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.workbook.is_none()
    }
}

/// Runs actions against a private scratch directory
pub struct Session<D = LayoutDetector> {
    scratch: ScratchDir,
    detector: D,
}

impl Session<LayoutDetector> {
    pub fn new() -> Result<Self, PdfError> {
        Self::with_detector(LayoutDetector::default())
    }
}

impl<D: TableDetector> Session<D> {
    pub fn with_detector(detector: D) -> Result<Self, PdfError> {
        Ok(Self {
            scratch: ScratchDir::new()?,
            detector,
        })
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Stage and validate the input, reporting its file details
    pub fn inspect(&mut self, input: &SourceInput) -> Result<FileDetails, PdfError> {
        self.run(input, |_, source| Ok(source.details()))
    }

    /// Table action: every page is tried with `options`, then with
    /// lattice/stream inverted, then without auto-detect. Sheets are
    /// labelled `Table_<M>`.
    pub fn extract_tables(
        &mut self,
        input: &SourceInput,
        range: PageRange,
        options: ExtractionOptions,
    ) -> Result<ActionReport, PdfError> {
        self.run(input, |detector, source| {
            info!("extracting tables from pages {} with {}", range, options);
            let mut report = ActionReport::new(source.details(), range);

            let pages =
                extract_range_tables(detector, source, range, FallbackPolicy::ThreeTier(options))?;
            report.tables = label_by_position(&pages);
            if !report.tables.is_empty() {
                report.workbook = Some(Artifact::workbook(&source.stem(), &report.tables)?);
            }
            Ok(report)
        })
    }

    /// Site-information action: page text for the whole range, then tables
    /// with lattice and then stream detection. Sheets are labelled
    /// `Page<N>_Table<M>`. A text failure abandons the whole action.
    pub fn extract_site_info(
        &mut self,
        input: &SourceInput,
        range: PageRange,
    ) -> Result<ActionReport, PdfError> {
        self.run(input, |detector, source| {
            info!("extracting site information from pages {}", range);
            let mut report = ActionReport::new(source.details(), range);
            let stem = source.stem();

            report.pages = extract_range_text(source, range)?;
            let pages =
                extract_range_tables(detector, source, range, FallbackPolicy::LatticeThenStream)?;
            report.tables = label_by_page(&pages);

            if !report.pages.is_empty() {
                report.text = Some(Artifact::text(&stem, &report.pages));
            }
            if !report.tables.is_empty() {
                report.workbook = Some(Artifact::workbook(&stem, &report.tables)?);
            }
            if report.is_empty() {
                warn!("nothing could be extracted from pages {}", range);
            }
            Ok(report)
        })
    }

    fn run<T, F>(&mut self, input: &SourceInput, action: F) -> Result<T, PdfError>
    where
        F: FnOnce(&D, &SourceDocument) -> Result<T, PdfError>,
    {
        let result = self
            .scratch
            .stage(input)
            .and_then(SourceDocument::open)
            .and_then(|source| action(&self.detector, &source));
        self.scratch.reset();
        result
    }
}
