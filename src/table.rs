//! Extracted table data
//!
//! Detectors produce raw grids of cell text; a [`Table`] takes the first
//! grid row as its header, the way a dataframe reader with `header=0` would.

use serde::Serialize;
use std::collections::HashMap;

/// A table found on one page, in one detected region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Page number (1-indexed)
    pub page: u32,
    /// Column names, if the table has a header row
    pub header: Option<Vec<String>>,
    /// Data rows; every row has the same width as the header
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from a raw grid, promoting the first row to header
    pub fn from_grid(page: u32, grid: Vec<Vec<String>>) -> Self {
        let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut rows: Vec<Vec<String>> = grid
            .into_iter()
            .map(|mut row| {
                row.iter_mut().for_each(|c| *c = c.trim().to_string());
                row.resize(width, String::new());
                row
            })
            .collect();

        if rows.is_empty() {
            return Self::headerless(page, rows);
        }

        let header = normalize_header(rows.remove(0));
        Self {
            page,
            header: Some(header),
            rows,
        }
    }

    /// Build a table with no header row, as for a detected area with no text
    pub fn headerless(page: u32, rows: Vec<Vec<String>>) -> Self {
        Self {
            page,
            header: None,
            rows,
        }
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.header
            .as_ref()
            .map(|h| h.len())
            .unwrap_or_else(|| self.rows.iter().map(|r| r.len()).max().unwrap_or(0))
    }

    /// Number of data rows (the header is not counted)
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no data rows or no columns
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width() == 0
    }
}

/// Name blank header cells `Unnamed: <i>` and suffix repeated names
/// with `.1`, `.2`, ...
fn normalize_header(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = if name.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let label = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            label
        })
        .collect()
}
