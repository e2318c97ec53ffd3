//! Parsing of HTML tables produced by table structure recognition.

use super::TableData;
use once_cell::sync::Lazy;
use regex::Regex;

static ROW_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("Invalid row regex"));

static CELL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</(?:th|td)\s*>").expect("Invalid cell regex")
});

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Converts an HTML table into headers and rows.
///
/// The first row made of `<th>` cells becomes the header; later `<th>` rows
/// are treated as data. Without any `<th>` row, the first row is promoted to
/// the header. Returns `None` for input without rows.
pub fn parse_html_table(html: &str) -> Option<TableData> {
    if html.trim().is_empty() {
        return None;
    }

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut saw_row = false;

    for row in ROW_REGEX.captures_iter(html) {
        saw_row = true;
        let mut header_cells = Vec::new();
        let mut data_cells = Vec::new();

        for cell in CELL_REGEX.captures_iter(&row[1]) {
            let text = cell_text(&cell[2]);
            if cell[1].eq_ignore_ascii_case("th") {
                header_cells.push(text);
            } else {
                data_cells.push(text);
            }
        }

        if !header_cells.is_empty() {
            if headers.is_empty() {
                headers = header_cells;
            } else {
                rows.push(header_cells);
            }
        } else if !data_cells.is_empty() {
            rows.push(data_cells);
        }
    }

    if !saw_row {
        return None;
    }

    if headers.is_empty() && !rows.is_empty() {
        headers = rows.remove(0);
    }

    if headers.is_empty() && rows.is_empty() {
        return None;
    }

    Some(TableData::new(headers, rows))
}

fn cell_text(inner: &str) -> String {
    let stripped = TAG_REGEX.replace_all(inner, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    WHITESPACE_REGEX
        .replace_all(decoded.trim(), " ")
        .into_owned()
}
