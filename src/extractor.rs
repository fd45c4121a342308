//! Page content extraction using lopdf
//!
//! This module walks a page's content stream and collects positioned text
//! items and ruling lines for table detection, and pulls plain page text
//! for the text extractor.

use crate::PdfError;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// A text item with position information
#[derive(Debug, Clone)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Font resource name
    pub font: String,
    /// Rendered font size
    pub font_size: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

impl TextItem {
    /// Horizontal midpoint
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    /// Vertical midpoint of the glyph box above the baseline
    pub fn center_y(&self) -> f32 {
        self.y + self.font_size * 0.35
    }
}

/// An axis-aligned line segment drawn on the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Ruling {
    const AXIS_TOLERANCE: f32 = 0.5;
    const MIN_LENGTH: f32 = 1.0;

    /// Build a ruling from a stroked segment. Diagonal and very short
    /// segments are not rulings.
    pub fn from_segment(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Self> {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        let horizontal = y1 - y0 <= Self::AXIS_TOLERANCE && x1 - x0 >= Self::MIN_LENGTH;
        let vertical = x1 - x0 <= Self::AXIS_TOLERANCE && y1 - y0 >= Self::MIN_LENGTH;
        if !horizontal && !vertical {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }

    pub fn is_horizontal(&self) -> bool {
        self.y1 - self.y0 <= Self::AXIS_TOLERANCE
    }

    pub fn is_vertical(&self) -> bool {
        self.x1 - self.x0 <= Self::AXIS_TOLERANCE
    }

    /// Y of a horizontal ruling
    pub fn y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// X of a vertical ruling
    pub fn x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Whether the two rulings touch, allowing `tolerance` of slack
    pub fn touches(&self, other: &Ruling, tolerance: f32) -> bool {
        self.x0 - tolerance <= other.x1
            && other.x0 - tolerance <= self.x1
            && self.y0 - tolerance <= other.y1
            && other.y0 - tolerance <= self.y1
    }
}

/// Everything table detection needs from one page
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub page: u32,
    pub items: Vec<TextItem>,
    pub rulings: Vec<Ruling>,
}

/// Look up a page object by its 1-indexed number
fn page_id(doc: &Document, page_num: u32) -> Result<ObjectId, PdfError> {
    doc.get_pages()
        .get(&page_num)
        .copied()
        .ok_or(PdfError::PageOutOfRange {
            page: page_num,
            page_count: doc.get_pages().len() as u32,
        })
}

/// Extract plain text of a single page
pub fn extract_page_text(doc: &Document, page_num: u32) -> Result<String, PdfError> {
    page_id(doc, page_num)?;
    doc.extract_text(&[page_num])
        .map_err(|e| PdfError::Parse(e.to_string()))
}

/// Extract positioned text and rulings from a single page
pub fn extract_page_layout(doc: &Document, page_num: u32) -> Result<PageLayout, PdfError> {
    let page_id = page_id(doc, page_num)?;

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| PdfError::Parse(e.to_string()))?;

    let mut walker = ContentWalker::new(doc, &fonts, page_num);
    for op in &content.operations {
        walker.apply(op.operator.as_str(), &op.operands);
    }

    Ok(PageLayout {
        page: page_num,
        items: walker.items,
        rulings: walker.rulings,
    })
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn transform_point(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Content stream interpreter state for one page
struct ContentWalker<'a> {
    doc: &'a Document,
    fonts: &'a BTreeMap<Vec<u8>, &'a lopdf::Dictionary>,
    page: u32,

    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,

    font: String,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,

    // Path under construction, in page space
    segments: Vec<(f32, f32, f32, f32)>,
    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,

    items: Vec<TextItem>,
    rulings: Vec<Ruling>,
}

impl<'a> ContentWalker<'a> {
    fn new(
        doc: &'a Document,
        fonts: &'a BTreeMap<Vec<u8>, &'a lopdf::Dictionary>,
        page: u32,
    ) -> Self {
        Self {
            doc,
            fonts,
            page,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
            segments: Vec::new(),
            current_point: None,
            subpath_start: None,
            items: Vec::new(),
            rulings: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(saved) = self.ctm_stack.pop() {
                    self.ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.ctm = multiply_matrices(&m, &self.ctm);
                }
            }

            // Text objects
            "BT" => {
                self.in_text_block = true;
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.in_text_block = false,
            "Tf" => {
                if operands.len() >= 2 {
                    if let Ok(name) = operands[0].as_name() {
                        self.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&operands[1]) {
                        self.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    self.leading = leading;
                }
            }
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if operator == "TD" {
                        self.leading = -ty;
                    }
                    self.line_matrix = multiply_matrices(
                        &[1.0, 0.0, 0.0, 1.0, tx, ty],
                        &self.line_matrix,
                    );
                    self.text_matrix = self.line_matrix;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                    self.push_text(text);
                }
            }
            "TJ" => {
                if let Some(Ok(array)) = operands.first().map(|o| o.as_array()) {
                    let text: String = array.iter().filter_map(|o| self.decode(o)).collect();
                    self.push_text(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                    self.push_text(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(text) = operands.get(2).and_then(|o| self.decode(o)) {
                    self.push_text(text);
                }
            }

            // Path construction
            "m" => {
                if let Some((x, y)) = point_operand(operands) {
                    let p = transform_point(&self.ctm, x, y);
                    self.current_point = Some(p);
                    self.subpath_start = Some(p);
                }
            }
            "l" => {
                if let Some((x, y)) = point_operand(operands) {
                    let p = transform_point(&self.ctm, x, y);
                    if let Some((cx, cy)) = self.current_point {
                        self.segments.push((cx, cy, p.0, p.1));
                    }
                    self.current_point = Some(p);
                }
            }
            "c" | "v" | "y" => {
                // Curves never form rulings; only the end point matters
                if operands.len() >= 2 {
                    let n = operands.len();
                    if let Some((x, y)) = point_operand(&operands[n - 2..]) {
                        self.current_point = Some(transform_point(&self.ctm, x, y));
                    }
                }
            }
            "h" => {
                if let (Some((cx, cy)), Some((sx, sy))) = (self.current_point, self.subpath_start)
                {
                    self.segments.push((cx, cy, sx, sy));
                    self.current_point = Some((sx, sy));
                }
            }
            "re" => {
                if operands.len() >= 4 {
                    let x = get_number(&operands[0]).unwrap_or(0.0);
                    let y = get_number(&operands[1]).unwrap_or(0.0);
                    let w = get_number(&operands[2]).unwrap_or(0.0);
                    let h = get_number(&operands[3]).unwrap_or(0.0);
                    let corners = [
                        transform_point(&self.ctm, x, y),
                        transform_point(&self.ctm, x + w, y),
                        transform_point(&self.ctm, x + w, y + h),
                        transform_point(&self.ctm, x, y + h),
                    ];
                    for i in 0..4 {
                        let (a, b) = (corners[i], corners[(i + 1) % 4]);
                        self.segments.push((a.0, a.1, b.0, b.1));
                    }
                    self.current_point = Some(corners[0]);
                    self.subpath_start = Some(corners[0]);
                }
            }

            // Path painting
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => self.flush_path(true),
            "n" => self.flush_path(false),
            _ => {}
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, 0.0, -leading], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn flush_path(&mut self, painted: bool) {
        if painted {
            self.rulings.extend(
                self.segments
                    .iter()
                    .filter_map(|&(x0, y0, x1, y1)| Ruling::from_segment(x0, y0, x1, y1)),
            );
        }
        self.segments.clear();
        self.current_point = None;
        self.subpath_start = None;
    }

    fn decode(&self, obj: &Object) -> Option<String> {
        extract_text_from_operand(obj, self.doc, self.fonts, &self.font)
    }

    fn push_text(&mut self, text: String) {
        if !self.in_text_block || text.trim().is_empty() {
            return;
        }
        let rendered_size = effective_font_size(self.font_size, &self.text_matrix);
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        let glyphs = text.chars().count() as f32;
        self.items.push(TextItem {
            width: glyphs * rendered_size * 0.5,
            x: combined[4],
            y: combined[5],
            text,
            font: self.font.clone(),
            font_size: rendered_size,
            page: self.page,
        });
    }
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn point_operand(operands: &[Object]) -> Option<(f32, f32)> {
    if operands.len() < 2 {
        return None;
    }
    Some((get_number(&operands[0])?, get_number(&operands[1])?))
}

fn matrix_operand(operands: &[Object]) -> Option<[f32; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (i, operand) in operands.iter().take(6).enumerate() {
        m[i] = get_number(operand).unwrap_or(IDENTITY[i]);
    }
    Some(m)
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Extract text from a text operand, handling encoding
fn extract_text_from_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    // Latin-1
    Some(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ruling_orientation() {
        let h = Ruling::from_segment(200.0, 100.0, 50.0, 100.2).unwrap();
        assert!(h.is_horizontal());
        assert_eq!(h.x0, 50.0);
        assert_eq!(h.x1, 200.0);

        let v = Ruling::from_segment(80.0, 10.0, 80.0, 90.0).unwrap();
        assert!(v.is_vertical());
        assert_eq!(v.x(), 80.0);
    }

    #[test]
    fn test_diagonal_and_tiny_segments_rejected() {
        assert!(Ruling::from_segment(0.0, 0.0, 50.0, 50.0).is_none());
        assert!(Ruling::from_segment(10.0, 10.0, 10.3, 10.0).is_none());
    }

    #[test]
    fn test_rulings_touch() {
        let h = Ruling::from_segment(50.0, 100.0, 200.0, 100.0).unwrap();
        let v = Ruling::from_segment(200.0, 100.0, 200.0, 300.0).unwrap();
        let far = Ruling::from_segment(400.0, 500.0, 400.0, 600.0).unwrap();
        assert!(h.touches(&v, 1.0));
        assert!(!h.touches(&far, 1.0));
    }

    #[test]
    fn test_transform_point_with_translation() {
        let m = [2.0, 0.0, 0.0, 2.0, 10.0, 20.0];
        assert_eq!(transform_point(&m, 5.0, 5.0), (20.0, 30.0));
    }

    #[test]
    fn test_rectangle_path_produces_four_rulings() {
        let doc = Document::with_version("1.5");
        let fonts = BTreeMap::new();
        let mut walker = ContentWalker::new(&doc, &fonts, 1);
        walker.apply(
            "re",
            &[
                Object::Integer(10),
                Object::Integer(20),
                Object::Integer(100),
                Object::Integer(50),
            ],
        );
        walker.apply("S", &[]);
        assert_eq!(walker.rulings.len(), 4);
        assert_eq!(walker.rulings.iter().filter(|r| r.is_horizontal()).count(), 2);
    }

    #[test]
    fn test_unpainted_path_discarded() {
        let doc = Document::with_version("1.5");
        let fonts = BTreeMap::new();
        let mut walker = ContentWalker::new(&doc, &fonts, 1);
        walker.apply("m", &[Object::Integer(0), Object::Integer(0)]);
        walker.apply("l", &[Object::Integer(100), Object::Integer(0)]);
        walker.apply("n", &[]);
        assert!(walker.rulings.is_empty());
    }

    #[test]
    fn test_text_outside_text_block_ignored() {
        let doc = Document::with_version("1.5");
        let fonts = BTreeMap::new();
        let mut walker = ContentWalker::new(&doc, &fonts, 1);
        walker.apply("Tj", &[Object::string_literal("stray")]);
        assert!(walker.items.is_empty());

        walker.apply("BT", &[]);
        walker.apply("Td", &[Object::Integer(72), Object::Integer(700)]);
        walker.apply("Tj", &[Object::string_literal("kept")]);
        walker.apply("ET", &[]);
        assert_eq!(walker.items.len(), 1);
        assert_eq!(walker.items[0].text, "kept");
        assert_eq!(walker.items[0].x, 72.0);
        assert_eq!(walker.items[0].y, 700.0);
    }

    #[test]
    fn test_items_carry_font_resource_and_size() {
        let doc = Document::with_version("1.5");
        let fonts = BTreeMap::new();
        let mut walker = ContentWalker::new(&doc, &fonts, 1);
        walker.apply("BT", &[]);
        walker.apply("Tf", &[Object::Name(b"F2".to_vec()), Object::Integer(9)]);
        walker.apply("Tj", &[Object::string_literal("Total")]);
        walker.apply("Tf", &[Object::Name(b"F1".to_vec()), Object::Integer(12)]);
        walker.apply("Tj", &[Object::string_literal("42")]);
        walker.apply("ET", &[]);

        let fonts: Vec<(&str, f32)> = walker
            .items
            .iter()
            .map(|item| (item.font.as_str(), item.font_size))
            .collect();
        assert_eq!(fonts, vec![("F2", 9.0), ("F1", 12.0)]);
    }
}
