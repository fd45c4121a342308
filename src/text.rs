//! Page text extraction for the text artifact

use crate::document::SourceDocument;
use crate::extractor::extract_page_text;
use crate::options::PageRange;
use crate::PdfError;
use log::{debug, info};

/// Plain text of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

impl PageText {
    /// The page's section in the text file
    pub fn block(&self) -> String {
        format!("=== Page {} ===\n{}\n", self.page, self.text)
    }
}

/// Extract the text of every page in `range`.
///
/// Pages past the end of the document are skipped. Any page that fails to
/// extract, or yields no text, fails the whole range.
pub fn extract_range_text(
    source: &SourceDocument,
    range: PageRange,
) -> Result<Vec<PageText>, PdfError> {
    let mut pages = Vec::new();

    for page in range.pages() {
        if page > source.page_count() {
            debug!(
                "page {} skipped, document has {} pages",
                page,
                source.page_count()
            );
            continue;
        }

        let text = extract_page_text(source.document(), page).map_err(|e| {
            PdfError::TextExtraction {
                page,
                reason: e.to_string(),
            }
        })?;
        if text.trim().is_empty() {
            return Err(PdfError::TextExtraction {
                page,
                reason: "page has no extractable text".to_string(),
            });
        }

        info!("page {}: extracted {} characters", page, text.len());
        pages.push(PageText { page, text });
    }

    Ok(pages)
}

/// Contents of the `<name>_text.txt` artifact
pub fn render_text_file(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(PageText::block)
        .collect::<Vec<_>>()
        .join("\n")
}
