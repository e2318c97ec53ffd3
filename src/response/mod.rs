//! Response envelope and the mapping from engine predictions to it.

use crate::engine::{BBox, PageStructure, PageText};
use crate::table::{TableData, TableReconstructor, parse_html_table};
use serde::{Deserialize, Serialize};

/// The JSON wrapper returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub resultcode: u16,
    pub message: String,
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: Vec<T>) -> Self {
        Self {
            resultcode: 200,
            message: message.into(),
            data,
        }
    }

    pub fn failure(resultcode: u16, message: impl Into<String>) -> Self {
        Self {
            resultcode,
            message: message.into(),
            data: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.resultcode == 200
    }
}

/// One recognized region.
///
/// Every field is serialized, absent values as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionItem {
    pub page: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: BBox,
    pub text: Option<String>,
    pub html: Option<String>,
    pub confidence: Option<f32>,
}

/// A table found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTable {
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    pub table: TableData,
}

/// Text lines of every page, pages numbered from 1.
pub fn text_items(pages: &[PageText]) -> Vec<RecognitionItem> {
    pages
        .iter()
        .enumerate()
        .flat_map(|(index, page)| {
            page.lines.iter().map(move |line| RecognitionItem {
                page: index + 1,
                kind: "text".to_string(),
                bbox: line.bbox,
                text: Some(line.text.clone()),
                html: None,
                confidence: Some(line.confidence),
            })
        })
        .collect()
}

/// Regions of one analysed page.
pub fn structure_items(page: usize, structure: &PageStructure) -> Vec<RecognitionItem> {
    structure
        .regions
        .iter()
        .map(|region| RecognitionItem {
            page,
            kind: region.kind.as_str().to_string(),
            bbox: region.bbox,
            text: region.text.clone(),
            html: region.html.clone(),
            confidence: Some(region.confidence),
        })
        .collect()
}

/// Tables rebuilt from text box coordinates. Pages without a table are skipped.
pub fn reconstructed_tables(
    pages: &[PageText],
    reconstructor: &TableReconstructor,
) -> Vec<PageTable> {
    pages
        .iter()
        .enumerate()
        .filter_map(|(index, page)| {
            let table = reconstructor.reconstruct(&page.texts(), &page.boxes());
            tracing::debug!(
                page = index + 1,
                lines = page.lines.len(),
                has_table = table.is_some(),
                "Table reconstruction"
            );
            table.map(|table| PageTable {
                page: index + 1,
                bbox: None,
                table,
            })
        })
        .collect()
}

/// Tables recognised by PP-Structure on one page, one per parsable HTML table.
pub fn structure_tables(page: usize, structure: &PageStructure) -> Vec<PageTable> {
    structure
        .tables()
        .filter_map(|region| {
            let table = parse_html_table(region.html.as_deref()?)?;
            Some(PageTable {
                page,
                bbox: Some(region.bbox),
                table,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RegionKind, StructureRegion, TextLine};
    use serde_json::json;

    fn line(text: &str, bbox: BBox) -> TextLine {
        TextLine {
            bbox,
            text: text.to_string(),
            confidence: 0.5,
        }
    }

    fn grid_page(rows: &[&[&str]]) -> PageText {
        let mut lines = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                let x = c as f32 * 100.0;
                let y = r as f32 * 50.0;
                lines.push(line(text, [x, y, x + 80.0, y + 30.0]));
            }
        }
        PageText {
            width: 400,
            height: 400,
            lines,
        }
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = Envelope::success("Success", vec![1, 2]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"resultcode": 200, "message": "Success", "data": [1, 2]})
        );

        let err: Envelope<u8> = Envelope::failure(400, "bad");
        assert!(!err.is_success());
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"resultcode": 400, "message": "bad", "data": []})
        );
    }

    #[test]
    fn test_text_items_serialize_all_fields() {
        let pages = vec![
            PageText {
                width: 10,
                height: 10,
                lines: vec![line("a", [0.0, 0.0, 1.0, 1.0])],
            },
            PageText {
                width: 10,
                height: 10,
                lines: vec![line("b", [2.0, 2.0, 3.0, 3.0])],
            },
        ];

        let items = text_items(&pages);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].page, 2);
        assert_eq!(
            serde_json::to_value(&items[0]).unwrap(),
            json!({
                "page": 1,
                "type": "text",
                "bbox": [0.0, 0.0, 1.0, 1.0],
                "text": "a",
                "html": null,
                "confidence": 0.5
            })
        );
    }

    #[test]
    fn test_structure_items_and_tables() {
        let structure = PageStructure {
            width: 100,
            height: 100,
            regions: vec![
                StructureRegion {
                    kind: RegionKind::Layout("doc_title".into()),
                    bbox: [0.0, 0.0, 50.0, 10.0],
                    text: Some("Report".into()),
                    html: None,
                    confidence: 0.9,
                },
                StructureRegion {
                    kind: RegionKind::Table,
                    bbox: [0.0, 20.0, 90.0, 80.0],
                    text: None,
                    html: Some(
                        "<table><tr><td>k</td><td>v</td></tr><tr><td>a</td><td>1</td></tr></table>"
                            .into(),
                    ),
                    confidence: 0.8,
                },
                StructureRegion {
                    kind: RegionKind::Table,
                    bbox: [0.0, 85.0, 90.0, 95.0],
                    text: None,
                    html: None,
                    confidence: 0.4,
                },
            ],
        };

        let items = structure_items(3, &structure);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, "doc_title");
        assert_eq!(items[1].page, 3);
        assert!(items[1].html.is_some());

        let tables = structure_tables(3, &structure);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].bbox, Some([0.0, 20.0, 90.0, 80.0]));
        assert_eq!(tables[0].table.headers, vec!["k", "v"]);
    }

    #[test]
    fn test_reconstructed_tables_skip_plain_pages() {
        let pages = vec![
            grid_page(&[&["just a paragraph"]]),
            grid_page(&[&["A", "B", "C"], &["1", "2", "3"], &["4", "5", "6"]]),
        ];

        let tables = reconstructed_tables(&pages, &TableReconstructor::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 2);
        assert_eq!(tables[0].table.total_rows, 2);

        let value = serde_json::to_value(&tables[0]).unwrap();
        assert!(value.get("bbox").is_none());
    }
}
