//! Coordinate-based table reconstruction.
//!
//! Text boxes are grouped into rows by their vertical centres, each row is
//! ordered left to right, and the most common row width among sufficiently
//! wide rows becomes the column count. Rows of exactly that width form the
//! table; the first one is the header.

use super::TableData;
use crate::engine::BBox;

/// Minimum number of text boxes before a page is considered for a table.
const MIN_BOXES: usize = 6;

/// Rebuilds a table from OCR text boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableReconstructor {
    /// Maximum vertical distance (pixels) between centres on the same row
    pub y_threshold: f32,
    /// Minimum number of columns for a table
    pub min_cols: usize,
}

impl Default for TableReconstructor {
    fn default() -> Self {
        Self {
            y_threshold: 30.0,
            min_cols: 3,
        }
    }
}

#[derive(Debug, Clone)]
struct Cell<'a> {
    text: &'a str,
    x_center: f32,
    y_center: f32,
}

impl TableReconstructor {
    pub fn new(y_threshold: f32, min_cols: usize) -> Self {
        Self {
            y_threshold,
            min_cols,
        }
    }

    /// Attempts to rebuild a table from parallel slices of texts and boxes.
    ///
    /// Returns `None` when the boxes do not form at least a header row and one
    /// data row of `min_cols` columns.
    pub fn reconstruct<S: AsRef<str>>(&self, texts: &[S], boxes: &[BBox]) -> Option<TableData> {
        if texts.is_empty() || boxes.is_empty() || texts.len() != boxes.len() {
            return None;
        }
        if texts.len() < MIN_BOXES {
            return None;
        }

        let mut cells: Vec<Cell<'_>> = texts
            .iter()
            .zip(boxes)
            .map(|(text, bbox)| Cell {
                text: text.as_ref(),
                x_center: (bbox[0] + bbox[2]) / 2.0,
                y_center: (bbox[1] + bbox[3]) / 2.0,
            })
            .collect();

        // Stable sort keeps detection order for equal centres.
        cells.sort_by(|a, b| a.y_center.total_cmp(&b.y_center));

        let rows = self.group_rows(cells);
        if rows.len() < 2 {
            return None;
        }

        let max_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        if max_cols < self.min_cols {
            return None;
        }

        let standard_cols = most_common_width(&rows, self.min_cols)?;

        let mut regular = rows.into_iter().filter(|row| row.len() == standard_cols);
        let headers: Vec<String> = regular.next()?.iter().map(|c| c.text.to_string()).collect();

        let data_rows: Vec<Vec<String>> = regular
            .map(|row| {
                let mut values: Vec<String> = row.iter().map(|c| c.text.to_string()).collect();
                values.resize(headers.len(), String::new());
                values
            })
            .collect();

        if data_rows.is_empty() {
            return None;
        }

        Some(TableData::new(headers, data_rows))
    }

    fn group_rows<'a>(&self, cells: Vec<Cell<'a>>) -> Vec<Vec<Cell<'a>>> {
        let mut rows: Vec<Vec<Cell<'a>>> = Vec::new();
        let mut current: Vec<Cell<'a>> = Vec::new();

        for cell in cells {
            let same_row = current
                .first()
                .is_some_and(|first| (cell.y_center - first.y_center).abs() < self.y_threshold);
            if !same_row && !current.is_empty() {
                rows.push(finish_row(std::mem::take(&mut current)));
            }
            current.push(cell);
        }
        if !current.is_empty() {
            rows.push(finish_row(current));
        }

        rows
    }
}

fn finish_row(mut row: Vec<Cell<'_>>) -> Vec<Cell<'_>> {
    row.sort_by(|a, b| a.x_center.total_cmp(&b.x_center));
    row
}

/// Most frequent row width among rows with at least `min_cols` cells.
/// Ties go to the width seen first, top to bottom.
fn most_common_width(rows: &[Vec<Cell<'_>>], min_cols: usize) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for width in rows.iter().map(Vec::len).filter(|w| *w >= min_cols) {
        match counts.iter_mut().find(|(w, _)| *w == width) {
            Some((_, count)) => *count += 1,
            None => counts.push((width, 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (width, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((width, count));
        }
    }
    best.map(|(width, _)| width)
}
