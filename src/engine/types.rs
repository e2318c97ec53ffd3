//! Engine-neutral prediction types.

use serde::{Deserialize, Serialize};

/// Axis-aligned box as `[x1, y1, x2, y2]` in page pixel coordinates.
pub type BBox = [f32; 4];

/// A recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub bbox: BBox,
    pub text: String,
    pub confidence: f32,
}

/// Text recognition output for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub width: u32,
    pub height: u32,
    pub lines: Vec<TextLine>,
}

impl PageText {
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    pub fn boxes(&self) -> Vec<BBox> {
        self.lines.iter().map(|line| line.bbox).collect()
    }
}

/// Kind of a structure region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    Text,
    Table,
    Formula,
    /// Any other layout label (title, figure, header, ...)
    Layout(String),
}

impl RegionKind {
    pub fn as_str(&self) -> &str {
        match self {
            RegionKind::Text => "text",
            RegionKind::Table => "table",
            RegionKind::Formula => "formula",
            RegionKind::Layout(label) => label,
        }
    }
}

/// A region found by layout analysis.
///
/// Tables carry their structure as HTML; formulas carry LaTeX in `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRegion {
    pub kind: RegionKind,
    pub bbox: BBox,
    pub text: Option<String>,
    pub html: Option<String>,
    pub confidence: f32,
}

/// Structure analysis output for one page, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    pub width: u32,
    pub height: u32,
    pub regions: Vec<StructureRegion>,
}

impl PageStructure {
    pub fn tables(&self) -> impl Iterator<Item = &StructureRegion> {
        self.regions
            .iter()
            .filter(|region| region.kind == RegionKind::Table)
    }
}

/// Sorts regions top to bottom, then left to right.
pub fn sort_reading_order(regions: &mut [StructureRegion]) {
    regions.sort_by(|a, b| {
        a.bbox[1]
            .total_cmp(&b.bbox[1])
            .then(a.bbox[0].total_cmp(&b.bbox[0]))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(kind: RegionKind, x: f32, y: f32) -> StructureRegion {
        StructureRegion {
            kind,
            bbox: [x, y, x + 10.0, y + 10.0],
            text: None,
            html: None,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_region_kind_labels() {
        assert_eq!(RegionKind::Text.as_str(), "text");
        assert_eq!(RegionKind::Table.as_str(), "table");
        assert_eq!(RegionKind::Formula.as_str(), "formula");
        assert_eq!(RegionKind::Layout("doc_title".into()).as_str(), "doc_title");
    }

    #[test]
    fn test_reading_order() {
        let mut regions = vec![
            region(RegionKind::Table, 50.0, 100.0),
            region(RegionKind::Text, 200.0, 10.0),
            region(RegionKind::Formula, 10.0, 100.0),
        ];
        sort_reading_order(&mut regions);
        let kinds: Vec<&str> = regions.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["text", "formula", "table"]);
    }

    #[test]
    fn test_page_text_accessors() {
        let page = PageText {
            width: 100,
            height: 50,
            lines: vec![TextLine {
                bbox: [1.0, 2.0, 3.0, 4.0],
                text: "hello".into(),
                confidence: 0.99,
            }],
        };
        assert_eq!(page.texts(), vec!["hello"]);
        assert_eq!(page.boxes(), vec![[1.0, 2.0, 3.0, 4.0]]);
    }
}
