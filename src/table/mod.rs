//! Table extraction helpers.
//!
//! Two sources of tables are supported:
//!
//! - [`TableReconstructor`] rebuilds rows and columns from plain OCR text boxes
//!   by clustering on their coordinates.
//! - [`parse_html_table`] reads the HTML emitted by table structure recognition.

mod html;
mod reconstruct;

pub use html::parse_html_table;
pub use reconstruct::TableReconstructor;

use serde::{Deserialize, Serialize};

/// A table as a header row plus data rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub total_cols: usize,
}

impl TableData {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let total_rows = rows.len();
        let total_cols = headers.len();
        Self {
            headers,
            rows,
            total_rows,
            total_cols,
        }
    }
}
