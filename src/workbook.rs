//! Result assembly and spreadsheet output

use crate::fallback::PageTables;
use crate::table::Table;
use crate::PdfError;
use indexmap::IndexMap;
use log::debug;
use rust_xlsxwriter::{Workbook, Worksheet};

/// Sheet label to table, in insertion order
pub type TableSet = IndexMap<String, Table>;

/// Label tables `Table_<M>` by their position across the whole range.
/// Empty tables are skipped but still take up a position.
pub fn label_by_position(pages: &[PageTables]) -> TableSet {
    let mut set = TableSet::new();
    let all = pages.iter().flat_map(|p| p.tables.iter());
    for (i, table) in all.enumerate() {
        if !table.is_empty() {
            set.insert(format!("Table_{}", i + 1), table.clone());
        }
    }
    set
}

/// Label tables `Page<N>_Table<M>` by page and position within the page
pub fn label_by_page(pages: &[PageTables]) -> TableSet {
    let mut set = TableSet::new();
    for page in pages {
        for (i, table) in page.tables.iter().enumerate() {
            if !table.is_empty() {
                set.insert(format!("Page{}_Table{}", page.page, i + 1), table.clone());
            }
        }
    }
    set
}

/// Serialize the non-empty tables into an xlsx workbook, one sheet each
pub fn write_workbook(tables: &TableSet) -> Result<Vec<u8>, PdfError> {
    let mut workbook = Workbook::new();
    let mut sheets = 0;

    for (label, table) in tables.iter().filter(|(_, t)| !t.is_empty()) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(label.as_str())?;
        write_table(sheet, table)?;
        debug!(
            "sheet {}: {} rows x {} columns",
            label,
            table.height(),
            table.width()
        );
        sheets += 1;
    }

    if sheets == 0 {
        return Err(PdfError::Workbook("no non-empty tables to write".into()));
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_table(sheet: &mut Worksheet, table: &Table) -> Result<(), PdfError> {
    let mut row: u32 = 0;

    if let Some(header) = &table.header {
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(row, col as u16, name.as_str())?;
        }
        row += 1;
    }

    for cells in &table.rows {
        for (col, cell) in cells.iter().enumerate() {
            write_cell(sheet, row, col as u16, cell)?;
        }
        row += 1;
    }
    Ok(())
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &str) -> Result<(), PdfError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(());
    }
    match parse_number(cell) {
        Some(n) => sheet.write_number(row, col, n)?,
        None => sheet.write_string(row, col, cell)?,
    };
    Ok(())
}

/// Plain decimal numbers only; no exponents, `inf` or `NaN`
fn parse_number(s: &str) -> Option<f64> {
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(page: u32, rows: &[&[&str]]) -> Table {
        Table::from_grid(
            page,
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_position_labels_count_empty_tables() {
        let pages = vec![
            PageTables {
                page: 1,
                tables: vec![table(1, &[&["a"], &["1"]]), table(1, &[&["header only"]])],
            },
            PageTables {
                page: 3,
                tables: vec![table(3, &[&["b"], &["2"]])],
            },
        ];
        let set = label_by_position(&pages);
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Table_1", "Table_3"]);
    }

    #[test]
    fn test_page_labels() {
        let pages = vec![
            PageTables {
                page: 2,
                tables: vec![table(2, &[&["a"], &["1"]]), table(2, &[&["b"], &["2"]])],
            },
            PageTables {
                page: 5,
                tables: vec![table(5, &[]), table(5, &[&["c"], &["3"]])],
            },
        ];
        let set = label_by_page(&pages);
        assert_eq!(
            set.keys().collect::<Vec<_>>(),
            vec!["Page2_Table1", "Page2_Table2", "Page5_Table2"]
        );
    }

    #[test]
    fn test_label_collision_last_write_wins() {
        let mut set = TableSet::new();
        set.insert("Table_1".into(), table(1, &[&["first"], &["1"]]));
        set.insert("Table_2".into(), table(1, &[&["second"], &["2"]]));
        set.insert("Table_1".into(), table(2, &[&["third"], &["3"]]));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_index(0).unwrap().0, "Table_1");
        assert_eq!(set["Table_1"].page, 2);
    }

    #[test]
    fn test_empty_set_is_an_error() {
        let mut set = TableSet::new();
        set.insert("Table_1".into(), table(1, &[&["only header"]]));
        assert!(matches!(write_workbook(&set), Err(PdfError::Workbook(_))));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.50"), Some(12.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number("1e5"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("1,000"), None);
        assert_eq!(parse_number("-"), None);
    }
}
