//! Table detection
//!
//! [`TableDetector`] is the seam between the extraction pipeline and whatever
//! engine finds tables on a page. [`LayoutDetector`] is the native engine: it
//! reads ruling lines and positioned text from the content stream and
//! rebuilds cell grids from them.

use crate::document::SourceDocument;
use crate::extractor::{extract_page_layout, PageLayout, Ruling, TextItem};
use crate::options::ExtractionOptions;
use crate::table::Table;
use crate::PdfError;
use log::debug;
use std::collections::HashMap;

/// Finds tables on a single page under one option set
pub trait TableDetector {
    /// What the engine reads from one page. Loaded once and shared by
    /// every option set tried on that page.
    type Page;

    /// Called once before a page range is processed. An error here aborts
    /// the whole range.
    fn prepare(&self) -> Result<(), PdfError> {
        Ok(())
    }

    /// Load `page` (1-indexed). An error here ends the page with no tables.
    fn load_page(&self, source: &SourceDocument, page: u32) -> Result<Self::Page, PdfError>;

    /// Detect tables on a loaded page. Tables come back in the order the
    /// engine found them.
    fn detect(&self, page: &Self::Page, options: ExtractionOptions) -> Result<Vec<Table>, PdfError>;
}

/// Tolerances for the native layout detector
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Slack when deciding whether two rulings belong to the same table
    pub ruling_join_tolerance: f32,
    /// Ruling positions closer than this are treated as one grid line
    pub ruling_merge_tolerance: f32,
    /// Items whose baselines differ by less than this share a row
    pub row_tolerance: f32,
    /// Minimum horizontal distance between column clusters within a row
    pub column_gap: f32,
    /// Largest vertical gap between rows of the same table region
    pub region_row_gap: f32,
    /// Column starts closer than this are considered aligned across rows
    pub alignment_tolerance: f32,
    /// Minimum average cross-row alignment for a stream region
    pub min_alignment_score: f32,
    /// Minimum rows for a stream region
    pub min_region_rows: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            ruling_join_tolerance: 3.0,
            ruling_merge_tolerance: 2.0,
            row_tolerance: 8.0,
            column_gap: 20.0,
            region_row_gap: 25.0,
            alignment_tolerance: 10.0,
            min_alignment_score: 0.5,
            min_region_rows: 2,
        }
    }
}

/// Native detector working from the page's content stream
#[derive(Debug, Clone, Default)]
pub struct LayoutDetector {
    config: LayoutConfig,
}

impl TableDetector for LayoutDetector {
    type Page = PageLayout;

    fn load_page(&self, source: &SourceDocument, page: u32) -> Result<PageLayout, PdfError> {
        extract_page_layout(source.document(), page)
    }

    fn detect(&self, layout: &PageLayout, options: ExtractionOptions) -> Result<Vec<Table>, PdfError> {
        Ok(self.detect_in_layout(layout, options))
    }
}

impl LayoutDetector {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Detect tables in an already extracted page layout.
    ///
    /// Lattice takes precedence when both strategy flags are set; with
    /// neither set the stream strategy is used.
    pub fn detect_in_layout(&self, layout: &PageLayout, options: ExtractionOptions) -> Vec<Table> {
        let grids = if options.lattice {
            self.lattice_grids(layout, options.guess)
        } else {
            self.stream_grids(layout, options.guess)
        };
        debug!(
            "page {}: {} grid(s) with {} ({} items, {} rulings)",
            layout.page,
            grids.len(),
            options,
            layout.items.len(),
            layout.rulings.len()
        );
        grids
            .into_iter()
            .map(|grid| Table::from_grid(layout.page, grid))
            .collect()
    }

    // === Lattice: cells bounded by ruling lines ===

    fn lattice_grids(&self, layout: &PageLayout, guess: bool) -> Vec<Vec<Vec<String>>> {
        let areas: Vec<Vec<Ruling>> = if guess {
            group_rulings(&layout.rulings, self.config.ruling_join_tolerance)
        } else if layout.rulings.is_empty() {
            vec![]
        } else {
            vec![layout.rulings.clone()]
        };

        let mut grids = Vec::new();
        for area in &areas {
            if let Some(grid) = self.lattice_grid(area, &layout.items) {
                grids.push(grid);
            }
        }
        grids
    }

    fn lattice_grid(&self, rulings: &[Ruling], items: &[TextItem]) -> Option<Vec<Vec<String>>> {
        let tol = self.config.ruling_merge_tolerance;
        let xs = merge_positions(
            rulings.iter().filter(|r| r.is_vertical()).map(|r| r.x()).collect(),
            tol,
        );
        let mut ys = merge_positions(
            rulings.iter().filter(|r| r.is_horizontal()).map(|r| r.y()).collect(),
            tol,
        );
        ys.reverse(); // top row first

        if xs.len() < 2 || ys.len() < 2 {
            return None;
        }

        let mut cell_items: Vec<Vec<Vec<&TextItem>>> =
            vec![vec![Vec::new(); xs.len() - 1]; ys.len() - 1];
        for item in items {
            let (cx, cy) = (item.center_x(), item.center_y());
            let col = xs.windows(2).position(|w| cx >= w[0] && cx < w[1]);
            let row = ys.windows(2).position(|w| cy <= w[0] && cy > w[1]);
            if let (Some(row), Some(col)) = (row, col) {
                cell_items[row][col].push(item);
            }
        }

        let grid: Vec<Vec<String>> = cell_items
            .iter_mut()
            .map(|row| {
                row.iter_mut()
                    .map(|cell| {
                        cell.sort_by(|a, b| {
                            b.y.partial_cmp(&a.y)
                                .unwrap_or(std::cmp::Ordering::Equal)
                                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
                        });
                        join_cell_items(cell)
                    })
                    .collect()
            })
            .collect();

        let grid = drop_empty_columns(drop_empty_rows(grid));
        if grid.is_empty() {
            None
        } else {
            Some(grid)
        }
    }

    // === Stream: columns inferred from text alignment ===

    fn stream_grids(&self, layout: &PageLayout, guess: bool) -> Vec<Vec<Vec<String>>> {
        if layout.items.is_empty() {
            return vec![];
        }

        if !guess {
            // Whole page is the table area
            let items: Vec<&TextItem> = layout.items.iter().collect();
            return self.stream_grid(&items).into_iter().collect();
        }

        let mut grids = Vec::new();
        for (y_min, y_max) in self.find_table_regions(&layout.items) {
            let region_items: Vec<&TextItem> = layout
                .items
                .iter()
                .filter(|item| item.y >= y_min && item.y <= y_max)
                .collect();

            let Some(grid) = self.stream_grid(&region_items) else {
                continue;
            };
            if looks_like_table(&grid) {
                grids.push(grid);
            } else {
                debug!("rejected stream region {:.1}..{:.1}", y_min, y_max);
            }
        }
        grids
    }

    fn stream_grid(&self, items: &[&TextItem]) -> Option<Vec<Vec<String>>> {
        let columns = find_column_boundaries(items);
        let rows = find_row_boundaries(items, self.config.row_tolerance);
        if columns.is_empty() || rows.is_empty() {
            return None;
        }

        let mut cell_items: Vec<Vec<Vec<&TextItem>>> =
            vec![vec![Vec::new(); columns.len()]; rows.len()];
        for &item in items {
            let col = find_column_index(&columns, item.x);
            let row = find_row_index(&rows, item.y);
            cell_items[row][col].push(item);
        }

        let grid: Vec<Vec<String>> = cell_items
            .iter_mut()
            .map(|row| {
                row.iter_mut()
                    .map(|cell| {
                        cell.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
                        join_cell_items(cell)
                    })
                    .collect()
            })
            .collect();

        let grid = drop_empty_rows(grid);
        if grid.is_empty() {
            None
        } else {
            Some(grid)
        }
    }

    /// Find Y-regions whose rows have several aligned column clusters.
    /// Tables keep the same column starts from row to row; paragraph text
    /// does not.
    ///
    /// A region spans the baselines of every item in its rows, so cells
    /// sitting a little above or below their row's first item stay inside.
    fn find_table_regions(&self, items: &[TextItem]) -> Vec<(f32, f32)> {
        let cfg = &self.config;

        // Group item X positions by row
        let mut row_groups: Vec<RowGroup> = Vec::new();
        for item in items {
            match row_groups
                .iter_mut()
                .find(|row| (item.y - row.y).abs() < cfg.row_tolerance)
            {
                Some(row) => {
                    row.starts.push(item.x);
                    row.bottom = row.bottom.min(item.y);
                    row.top = row.top.max(item.y);
                }
                None => row_groups.push(RowGroup {
                    y: item.y,
                    bottom: item.y,
                    top: item.y,
                    starts: vec![item.x],
                }),
            }
        }

        // Rows with 2+ distinct column clusters
        let mut qualifying_rows: Vec<RowGroup> = row_groups
            .into_iter()
            .filter_map(|mut row| {
                let mut xs = std::mem::take(&mut row.starts);
                xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let mut last_x = xs[0];
                row.starts.push(last_x);
                for &x in &xs[1..] {
                    if x - last_x > cfg.column_gap {
                        row.starts.push(x);
                    }
                    last_x = x;
                }
                (row.starts.len() >= 2).then_some(row)
            })
            .collect();

        if qualifying_rows.len() < cfg.min_region_rows {
            return vec![];
        }

        // Contiguous runs of qualifying rows, top to bottom
        qualifying_rows.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));
        let mut runs: Vec<Vec<&RowGroup>> = Vec::new();
        let mut current: Vec<&RowGroup> = Vec::new();
        for row in &qualifying_rows {
            if let Some(prev) = current.last() {
                if prev.y - row.y > cfg.region_row_gap {
                    runs.push(std::mem::take(&mut current));
                }
            }
            current.push(row);
        }
        runs.push(current);

        runs.into_iter()
            .filter(|run| run.len() >= cfg.min_region_rows)
            .filter(|run| alignment_score(run, cfg.alignment_tolerance) >= cfg.min_alignment_score)
            .map(|run| {
                let y_min = run.iter().map(|row| row.bottom).fold(f32::INFINITY, f32::min);
                let y_max = run.iter().map(|row| row.top).fold(f32::NEG_INFINITY, f32::max);
                (y_min, y_max)
            })
            .collect()
    }
}

/// Items sharing a row while searching for stream regions
#[derive(Debug)]
struct RowGroup {
    /// Baseline of the row's first item
    y: f32,
    /// Lowest and highest baselines in the row
    bottom: f32,
    top: f32,
    /// Item X positions, reduced to column starts once the row is complete
    starts: Vec<f32>,
}

/// Average pairwise share of column starts that line up between rows
fn alignment_score(rows: &[&RowGroup], tolerance: f32) -> f32 {
    let mut total = 0.0f32;
    let mut pairs = 0u32;
    for i in 0..rows.len() {
        for j in (i + 1)..rows.len() {
            let (a, b) = (&rows[i].starts, &rows[j].starts);
            let matches_a = a
                .iter()
                .filter(|&&x| b.iter().any(|&y| (x - y).abs() < tolerance))
                .count();
            let matches_b = b
                .iter()
                .filter(|&&y| a.iter().any(|&x| (x - y).abs() < tolerance))
                .count();
            let max_len = a.len().max(b.len());
            if max_len > 0 {
                total += (matches_a + matches_b) as f32 / (2 * max_len) as f32;
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f32
    }
}

/// Split rulings into groups of mutually touching lines; each group is
/// one candidate table area. Groups come back top-to-bottom.
fn group_rulings(rulings: &[Ruling], tolerance: f32) -> Vec<Vec<Ruling>> {
    let mut parent: Vec<usize> = (0..rulings.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..rulings.len() {
        for j in (i + 1)..rulings.len() {
            if rulings[i].touches(&rulings[j], tolerance) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<Ruling>> = HashMap::new();
    for (i, ruling) in rulings.iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(*ruling);
    }

    let mut groups: Vec<Vec<Ruling>> = groups.into_values().collect();
    let top = |g: &Vec<Ruling>| g.iter().map(|r| r.y1).fold(f32::NEG_INFINITY, f32::max);
    let left = |g: &Vec<Ruling>| g.iter().map(|r| r.x0).fold(f32::INFINITY, f32::min);
    groups.sort_by(|a, b| {
        top(b)
            .partial_cmp(&top(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(left(a).partial_cmp(&left(b)).unwrap_or(std::cmp::Ordering::Equal))
    });
    groups
}

/// Sort positions ascending and collapse those within `tolerance`
fn merge_positions(mut positions: Vec<f32>, tolerance: f32) -> Vec<f32> {
    positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut merged: Vec<f32> = Vec::new();
    for p in positions {
        match merged.last() {
            Some(&last) if p - last <= tolerance => {}
            _ => merged.push(p),
        }
    }
    merged
}

fn drop_empty_rows(grid: Vec<Vec<String>>) -> Vec<Vec<String>> {
    grid.into_iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect()
}

fn drop_empty_columns(grid: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let width = grid.first().map(|r| r.len()).unwrap_or(0);
    let keep: Vec<bool> = (0..width)
        .map(|col| grid.iter().any(|row| !row[col].trim().is_empty()))
        .collect();
    grid.into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&keep)
                .filter_map(|(cell, &k)| k.then_some(cell))
                .collect()
        })
        .collect()
}

/// Structural checks applied to auto-detected stream regions
fn looks_like_table(cells: &[Vec<String>]) -> bool {
    let width = cells.first().map(|r| r.len()).unwrap_or(0);
    if cells.len() < 2 || width < 2 {
        return false;
    }

    // Real tables have content in more than one column on most rows
    let multi_col_rows = cells
        .iter()
        .filter(|row| row.iter().filter(|c| !c.is_empty()).count() >= 2)
        .count();
    if multi_col_rows < (cells.len() / 2).max(1) {
        return false;
    }

    has_consistent_columns(cells) && !is_key_value_layout(cells) && !is_table_of_contents(cells)
}

/// Check if this looks like a key-value pair layout rather than a table
fn is_key_value_layout(cells: &[Vec<String>]) -> bool {
    if cells.is_empty() {
        return false;
    }

    let num_cols = cells[0].len();
    let mut label_like_first_col = 0;
    let mut rows_with_two_or_less = 0;

    for row in cells {
        let filled_count = row.iter().filter(|c| !c.is_empty()).count();
        if filled_count <= 2 {
            rows_with_two_or_less += 1;
        }

        let first = row.first().map(|s| s.trim()).unwrap_or("");
        if first.ends_with(':') {
            label_like_first_col += 1;
        }
    }

    let pct_two_or_less = rows_with_two_or_less as f32 / cells.len() as f32;
    let pct_label_like = label_like_first_col as f32 / cells.len() as f32;

    pct_two_or_less > 0.7 && pct_label_like > 0.5 && num_cols <= 3
}

/// Check if columns are consistent across rows (real tables have this)
fn has_consistent_columns(cells: &[Vec<String>]) -> bool {
    if cells.len() < 3 {
        return true;
    }

    let filled_counts: Vec<usize> = cells
        .iter()
        .map(|row| row.iter().filter(|c| !c.is_empty()).count())
        .collect();

    let mut count_freq: HashMap<usize, usize> = HashMap::new();
    for &count in &filled_counts {
        *count_freq.entry(count).or_insert(0) += 1;
    }
    let most_common = count_freq
        .iter()
        .max_by_key(|(count, freq)| (**freq, **count))
        .map(|(count, _)| *count)
        .unwrap_or(0);

    let consistent_rows = filled_counts
        .iter()
        .filter(|&&c| c + 2 >= most_common && c <= most_common + 2)
        .count();

    consistent_rows as f32 / cells.len() as f32 > 0.4
}

/// Leader dots and bare page numbers mark a table of contents
fn is_table_of_contents(cells: &[Vec<String>]) -> bool {
    let mut dot_cells = 0;
    let mut page_number_cells = 0;
    let mut total_cells = 0;

    for cell in cells.iter().flatten() {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            continue;
        }
        total_cells += 1;

        let dot_count = trimmed.chars().filter(|&c| c == '.').count();
        if dot_count > trimmed.len() / 2 && dot_count >= 3 {
            dot_cells += 1;
        }

        let digits: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() <= 4 && digits.chars().all(|c| c.is_ascii_digit()) {
            page_number_cells += 1;
        }
    }

    if total_cells == 0 {
        return false;
    }

    let dot_ratio = dot_cells as f32 / total_cells as f32;
    let page_num_ratio = page_number_cells as f32 / total_cells as f32;
    dot_ratio > 0.15 || (dot_ratio > 0.05 && page_num_ratio > 0.15)
}

/// Find column start positions by clustering item X positions
fn find_column_boundaries(items: &[&TextItem]) -> Vec<f32> {
    let mut x_positions: Vec<f32> = items.iter().map(|i| i.x).collect();
    x_positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let (Some(&first), Some(&last)) = (x_positions.first(), x_positions.last()) else {
        return vec![];
    };

    // Dense layouts get a tighter threshold
    let avg_gap = if x_positions.len() > 1 {
        (last - first) / (x_positions.len() - 1) as f32
    } else {
        60.0
    };
    let cluster_threshold = avg_gap.clamp(25.0, 50.0);

    let mut columns = Vec::new();
    let mut cluster: Vec<f32> = vec![first];
    for &x in &x_positions[1..] {
        let center = cluster.iter().sum::<f32>() / cluster.len() as f32;
        if x - center > cluster_threshold {
            columns.push(cluster[0]);
            cluster = vec![x];
        } else {
            cluster.push(x);
        }
    }
    columns.push(cluster[0]);

    // Stray single items do not open a column of their own
    let min_items = (items.len() / columns.len() / 4).max(1);
    let kept: Vec<f32> = columns
        .iter()
        .copied()
        .filter(|&col_x| {
            items
                .iter()
                .filter(|i| i.x >= col_x && i.x - col_x < cluster_threshold)
                .count()
                >= min_items
        })
        .collect();

    if kept.is_empty() {
        vec![first]
    } else {
        kept
    }
}

/// Find row baselines by clustering Y positions, top to bottom
fn find_row_boundaries(items: &[&TextItem], tolerance: f32) -> Vec<f32> {
    let mut y_positions: Vec<f32> = items.iter().map(|i| i.y).collect();
    y_positions.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let Some(&first) = y_positions.first() else {
        return vec![];
    };

    let mut rows = Vec::new();
    let mut cluster: Vec<f32> = vec![first];
    for &y in &y_positions[1..] {
        let center = cluster.iter().sum::<f32>() / cluster.len() as f32;
        if center - y > tolerance {
            rows.push(center);
            cluster = vec![y];
        } else {
            cluster.push(y);
        }
    }
    rows.push(cluster.iter().sum::<f32>() / cluster.len() as f32);
    rows
}

/// Column whose start is the last one at or left of `x` (first column
/// for items left of every start)
fn find_column_index(columns: &[f32], x: f32) -> usize {
    columns
        .iter()
        .rposition(|&col_x| col_x <= x + 1.0)
        .unwrap_or(0)
}

/// Nearest row baseline
fn find_row_index(rows: &[f32], y: f32) -> usize {
    rows.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (y - *a)
                .abs()
                .partial_cmp(&(y - *b).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

/// Join cell items with subscript/superscript-aware spacing
fn join_cell_items(items: &[&TextItem]) -> String {
    let mut result = String::new();
    let mut prev: Option<&TextItem> = None;

    for &item in items {
        let text = item.text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(prev_item) = prev {
            let hyphen_join =
                result.ends_with('-') || text == "-" || text.starts_with('-');

            // Smaller glyphs offset from the baseline are sub/superscripts
            let y_diff = (item.y - prev_item.y).abs();
            let sub_super = y_diff > 1.0
                && y_diff < prev_item.font_size.max(item.font_size)
                && (item.font_size / prev_item.font_size < 0.85
                    || prev_item.font_size / item.font_size < 0.85);

            if !hyphen_join && !sub_super {
                result.push(' ');
            }
        }
        result.push_str(text);
        prev = Some(item);
    }

    result
}
