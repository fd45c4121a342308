//! Page-by-page table extraction with option fallbacks
//!
//! Each page is handled on its own: a page that yields nothing, or whose
//! detector call fails, contributes no tables and the range carries on.

use crate::document::SourceDocument;
use crate::options::{FallbackPolicy, PageRange};
use crate::table::Table;
use crate::tables::TableDetector;
use crate::PdfError;
use log::{info, warn};

/// Tables returned for one page by the attempt that succeeded
#[derive(Debug, Clone)]
pub struct PageTables {
    pub page: u32,
    pub tables: Vec<Table>,
}

/// Run the detector on one page, walking the policy's option sets until one
/// yields a non-empty table.
///
/// The page is loaded once for all attempts. The successful attempt's whole
/// list is returned, empty tables included. An error while loading the page
/// or from any attempt ends the page with no tables.
pub fn extract_page_tables<D: TableDetector + ?Sized>(
    detector: &D,
    source: &SourceDocument,
    page: u32,
    policy: FallbackPolicy,
) -> Vec<Table> {
    let loaded = match detector.load_page(source, page) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("page {}: table extraction failed: {}", page, e);
            return Vec::new();
        }
    };

    for (tier, options) in policy.attempts().into_iter().enumerate() {
        if tier > 0 {
            info!("page {}: no tables found, retrying with {}", page, options);
        }

        let tables = match detector.detect(&loaded, options) {
            Ok(tables) => tables,
            Err(e) => {
                warn!("page {}: table extraction failed: {}", page, e);
                return Vec::new();
            }
        };

        if tables.iter().any(|t| !t.is_empty()) {
            info!("page {}: found {} table(s)", page, tables.len());
            return tables;
        }
    }

    warn!("page {}: no tables found", page);
    Vec::new()
}

/// Extract tables from every page in `range`, in page order.
///
/// Pages with no tables are omitted. Only a failing
/// [`TableDetector::prepare`] fails the range.
pub fn extract_range_tables<D: TableDetector + ?Sized>(
    detector: &D,
    source: &SourceDocument,
    range: PageRange,
    policy: FallbackPolicy,
) -> Result<Vec<PageTables>, PdfError> {
    detector.prepare()?;

    let mut pages = Vec::new();
    for page in range.pages() {
        info!("processing page {}", page);
        let tables = extract_page_tables(detector, source, page, policy);
        if !tables.is_empty() {
            pages.push(PageTables { page, tables });
        }
    }

    if pages.is_empty() {
        warn!("no tables found in pages {}", range);
    }
    Ok(pages)
}
