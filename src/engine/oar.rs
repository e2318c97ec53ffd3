//! Recognition engine backed by `oar-ocr`.

use super::types::{
    BBox, PageStructure, PageText, RegionKind, StructureRegion, TextLine, sort_reading_order,
};
use super::RecognitionEngine;
use crate::core::{
    GatewayError, GatewayResult, ModelConfig, PipelineProfile, parse_device_config,
};
use image::RgbImage;
use oar_ocr::core::config::OrtSessionConfig;
use oar_ocr::domain::structure::{LayoutElement, LayoutElementType, StructureResult};
use oar_ocr::oarocr::{OAROCR, OAROCRBuilder, OAROCRResult, OARStructure, OARStructureBuilder};
use oar_ocr::processors::BoundingBox;
use once_cell::sync::OnceCell;
use std::time::Instant;

/// `oar-ocr` pipelines, built on first use and kept for the process lifetime.
pub struct OarEngine {
    config: ModelConfig,
    session: Option<OrtSessionConfig>,
    general: OnceCell<OAROCR>,
    document: OnceCell<OAROCR>,
    structure: OnceCell<OARStructure>,
}

impl OarEngine {
    /// Creates the engine. Model files are only checked when a pipeline is built.
    pub fn new(config: ModelConfig) -> GatewayResult<Self> {
        let session = parse_device_config(&config.device)?;
        Ok(Self {
            config,
            session,
            general: OnceCell::new(),
            document: OnceCell::new(),
            structure: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Builds the text pipelines (and the structure pipeline when its models
    /// are present) ahead of the first request.
    pub fn warm_up(&self) -> GatewayResult<()> {
        self.ocr_pipeline(PipelineProfile::General)?;
        self.ocr_pipeline(PipelineProfile::Document)?;
        if self.supports_structure() {
            self.structure_pipeline()?;
        }
        Ok(())
    }

    fn ocr_pipeline(&self, profile: PipelineProfile) -> GatewayResult<&OAROCR> {
        let cell = match profile {
            PipelineProfile::General => &self.general,
            PipelineProfile::Document => &self.document,
            PipelineProfile::Structure => {
                return Err(GatewayError::Config(
                    "The structure profile has no standalone OCR pipeline".to_string(),
                ));
            }
        };
        cell.get_or_try_init(|| self.build_ocr(profile))
    }

    fn build_ocr(&self, profile: PipelineProfile) -> GatewayResult<OAROCR> {
        let paths = self.config.resolve_ocr(profile)?;
        let start = Instant::now();

        let mut builder = OAROCRBuilder::new(&paths.det_model, &paths.rec_model, &paths.dict_path);
        if let Some(model) = &paths.doc_orientation_model {
            builder = builder.with_document_image_orientation_classification(model);
        }
        if let Some(model) = &paths.doc_unwarping_model {
            builder = builder.with_document_image_rectification(model);
        }
        if let Some(model) = &paths.textline_orientation_model {
            builder = builder.with_text_line_orientation_classification(model);
        }
        if let Some(session) = &self.session {
            builder = builder.ort_session(session.clone());
        }

        let ocr = builder
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        tracing::info!(
            profile = profile.as_str(),
            language = %self.config.language,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR pipeline ready"
        );
        Ok(ocr)
    }

    fn structure_pipeline(&self) -> GatewayResult<&OARStructure> {
        self.structure.get_or_try_init(|| self.build_structure())
    }

    fn build_structure(&self) -> GatewayResult<OARStructure> {
        let paths = self.config.resolve_structure()?;
        let start = Instant::now();

        let mut builder = OARStructureBuilder::new(&paths.layout_model).with_ocr(
            &paths.ocr.det_model,
            &paths.ocr.rec_model,
            &paths.ocr.dict_path,
        );
        if let Some((model, dict)) = &paths.table {
            builder = builder
                .with_table_structure_recognition(model, "wired")
                .table_structure_dict_path(dict);
        }
        if let Some((model, tokenizer)) = &paths.formula {
            builder = builder.with_formula_recognition(model, tokenizer, "pp_formulanet");
        }
        if let Some(session) = &self.session {
            builder = builder.ort_session(session.clone());
        }

        let structure = builder
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        tracing::info!(
            tables = paths.table.is_some(),
            formulas = paths.formula.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Structure pipeline ready"
        );
        Ok(structure)
    }
}

impl RecognitionEngine for OarEngine {
    fn name(&self) -> &str {
        "oar-ocr"
    }

    fn recognize_text(
        &self,
        profile: PipelineProfile,
        images: Vec<RgbImage>,
    ) -> GatewayResult<Vec<PageText>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let ocr = self.ocr_pipeline(profile)?;
        let results = ocr.predict(images).map_err(GatewayError::recognition)?;
        Ok(results.iter().map(page_text).collect())
    }

    fn analyze_structure(&self, image: RgbImage) -> GatewayResult<PageStructure> {
        if !self.supports_structure() {
            return Err(GatewayError::NotConfigured(format!(
                "Structure analysis is not available: layout model not found at {}",
                self.config.layout_model_path().display()
            )));
        }
        let (width, height) = image.dimensions();
        let result = self
            .structure_pipeline()?
            .predict_image(image)
            .map_err(GatewayError::recognition)?;
        Ok(page_structure(result, width, height))
    }

    fn supports_structure(&self) -> bool {
        self.config.has_structure_models()
    }
}

fn to_bbox(bbox: &BoundingBox) -> BBox {
    [bbox.x_min(), bbox.y_min(), bbox.x_max(), bbox.y_max()]
}

fn page_text(result: &OAROCRResult) -> PageText {
    let lines = result
        .text_regions
        .iter()
        .filter_map(|region| {
            let text = region.text.as_ref()?;
            if text.trim().is_empty() {
                return None;
            }
            Some(TextLine {
                bbox: to_bbox(&region.bounding_box),
                text: text.to_string(),
                confidence: region.confidence.unwrap_or(0.0),
            })
        })
        .collect();

    PageText {
        width: result.input_img.width(),
        height: result.input_img.height(),
        lines,
    }
}

/// Flattens layout elements, tables and formulas into a single region list.
///
/// Layout elements arrive in reading order. A table or formula result takes
/// the place of the layout box it overlaps most; table and formula boxes
/// without a result are kept with their layout text. Results that overlap no
/// layout box follow the layout regions. Pages without any reading order
/// index are sorted top-to-bottom, left-to-right.
fn page_structure(result: StructureResult, width: u32, height: u32) -> PageStructure {
    let elements = result.layout_elements;
    let indexed = elements.iter().any(|element| element.order_index.is_some());
    let boxes: Vec<BBox> = elements.iter().map(|element| to_bbox(&element.bbox)).collect();

    let mut matched: Vec<Vec<StructureRegion>> = elements.iter().map(|_| Vec::new()).collect();
    let mut unanchored = Vec::new();

    for table in result.tables {
        let bbox = to_bbox(&table.bbox);
        let anchor = best_anchor(&elements, &boxes, &bbox, |kind| {
            *kind == LayoutElementType::Table
        });
        let confidence = table
            .confidence()
            .or(anchor.map(|index| elements[index].confidence))
            .unwrap_or(0.0);
        let region = StructureRegion {
            kind: RegionKind::Table,
            bbox,
            text: None,
            html: table.html_structure,
            confidence,
        };
        match anchor {
            Some(index) => matched[index].push(region),
            None => unanchored.push(region),
        }
    }

    for formula in result.formulas {
        let bbox = to_bbox(&formula.bbox);
        let anchor = best_anchor(&elements, &boxes, &bbox, LayoutElementType::is_formula);
        let region = StructureRegion {
            kind: RegionKind::Formula,
            bbox,
            text: Some(formula.latex),
            html: None,
            confidence: formula.confidence,
        };
        match anchor {
            Some(index) => matched[index].push(region),
            None => unanchored.push(region),
        }
    }

    let mut regions = Vec::with_capacity(elements.len() + unanchored.len());
    for ((element, bbox), results) in elements.into_iter().zip(boxes).zip(matched) {
        if !results.is_empty() {
            regions.extend(results);
            continue;
        }
        let kind = match element.element_type {
            LayoutElementType::Text => RegionKind::Text,
            LayoutElementType::Table => RegionKind::Table,
            LayoutElementType::Formula => RegionKind::Formula,
            other => RegionKind::Layout(other.as_str().to_string()),
        };
        regions.push(StructureRegion {
            kind,
            bbox,
            text: element.text,
            html: None,
            confidence: element.confidence,
        });
    }
    regions.extend(unanchored);

    if !indexed {
        sort_reading_order(&mut regions);
    }

    PageStructure {
        width,
        height,
        regions,
    }
}

/// Index of the accepted layout element that overlaps `bbox` most.
fn best_anchor(
    elements: &[LayoutElement],
    boxes: &[BBox],
    bbox: &BBox,
    accepts: impl Fn(&LayoutElementType) -> bool,
) -> Option<usize> {
    elements
        .iter()
        .zip(boxes)
        .enumerate()
        .filter(|(_, (element, _))| accepts(&element.element_type))
        .map(|(index, (_, anchor))| (index, overlap(anchor, bbox)))
        .filter(|(_, area)| *area > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

fn overlap(a: &BBox, b: &BBox) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    w * h
}

#[cfg(test)]
mod tests {
    use super::*;
    use oar_ocr::domain::structure::{FormulaResult, TableResult, TableType};

    #[test]
    fn test_bbox_conversion() {
        let bbox = BoundingBox::from_coords(10.0, 20.0, 110.0, 60.0);
        assert_eq!(to_bbox(&bbox), [10.0, 20.0, 110.0, 60.0]);
    }

    #[test]
    fn test_overlap_area() {
        assert_eq!(overlap(&[0.0, 0.0, 10.0, 10.0], &[5.0, 5.0, 20.0, 20.0]), 25.0);
        assert_eq!(overlap(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    fn element(
        kind: LayoutElementType,
        [x1, y1, x2, y2]: BBox,
        order: Option<u32>,
        text: &str,
    ) -> LayoutElement {
        let mut element = LayoutElement::new(BoundingBox::from_coords(x1, y1, x2, y2), kind, 0.6)
            .with_text(text);
        element.order_index = order;
        element
    }

    fn texts(structure: &PageStructure) -> Vec<&str> {
        structure
            .regions
            .iter()
            .map(|region| region.text.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn test_results_replace_their_layout_boxes() {
        let table = TableResult::new(BoundingBox::from_coords(2.0, 32.0, 98.0, 78.0), TableType::Wired)
            .with_structure_confidence(0.7)
            .with_html_structure("<table><tr><td>1</td></tr></table>");
        let formula = FormulaResult::new(BoundingBox::from_coords(0.0, 90.0, 100.0, 110.0), "x^2", 0.9);
        let result = StructureResult::new("page.png", 0)
            .with_layout_elements(vec![
                element(LayoutElementType::Text, [0.0, 0.0, 100.0, 20.0], Some(1), "intro"),
                element(LayoutElementType::Table, [0.0, 30.0, 100.0, 80.0], Some(2), ""),
                element(LayoutElementType::Formula, [0.0, 90.0, 100.0, 110.0], Some(3), ""),
                element(LayoutElementType::Text, [0.0, 120.0, 100.0, 140.0], Some(4), "outro"),
            ])
            .with_tables(vec![table])
            .with_formulas(vec![formula]);

        let structure = page_structure(result, 100, 150);
        let kinds: Vec<&str> = structure.regions.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["text", "table", "formula", "text"]);
        assert_eq!(texts(&structure), vec!["intro", "", "x^2", "outro"]);
        assert!(structure.regions[1].html.is_some());
        assert_eq!(structure.regions[1].confidence, 0.7);
        assert_eq!(structure.regions[1].bbox, [2.0, 32.0, 98.0, 78.0]);
    }

    #[test]
    fn test_layout_boxes_without_results_are_kept() {
        let result = StructureResult::new("page.png", 0).with_layout_elements(vec![
            element(LayoutElementType::Formula, [0.0, 0.0, 100.0, 20.0], Some(1), "E=mc2"),
            element(LayoutElementType::Table, [0.0, 30.0, 100.0, 80.0], Some(2), "a b"),
        ]);

        let structure = page_structure(result, 100, 100);
        assert_eq!(structure.regions.len(), 2);
        assert_eq!(structure.regions[0].kind, RegionKind::Formula);
        assert_eq!(structure.regions[0].text.as_deref(), Some("E=mc2"));
        assert_eq!(structure.regions[1].kind, RegionKind::Table);
        assert_eq!(structure.regions[1].confidence, 0.6);
        assert!(structure.regions[1].html.is_none());
    }

    #[test]
    fn test_unindexed_elements_keep_layout_order() {
        // Two columns: A and B on the left, C on the right beside A.
        let result = StructureResult::new("page.png", 0).with_layout_elements(vec![
            element(LayoutElementType::Header, [0.0, 0.0, 200.0, 10.0], None, "hdr"),
            element(LayoutElementType::Text, [0.0, 50.0, 90.0, 100.0], Some(1), "A"),
            element(LayoutElementType::Text, [0.0, 200.0, 90.0, 250.0], Some(2), "B"),
            element(LayoutElementType::Text, [110.0, 60.0, 200.0, 110.0], Some(3), "C"),
            element(LayoutElementType::Footer, [0.0, 280.0, 200.0, 290.0], None, "ftr"),
        ]);

        let structure = page_structure(result, 200, 300);
        assert_eq!(texts(&structure), vec!["hdr", "A", "B", "C", "ftr"]);
        assert_eq!(structure.regions[0].kind, RegionKind::Layout("header".into()));
    }

    #[test]
    fn test_geometric_order_without_any_index() {
        let result = StructureResult::new("page.png", 0).with_layout_elements(vec![
            element(LayoutElementType::Text, [0.0, 100.0, 50.0, 120.0], None, "second"),
            element(LayoutElementType::Text, [0.0, 0.0, 50.0, 20.0], None, "first"),
        ]);

        let structure = page_structure(result, 100, 200);
        assert_eq!(texts(&structure), vec!["first", "second"]);
    }

    #[test]
    fn test_formula_numbers_anchor_their_results() {
        let result = StructureResult::new("page.png", 0)
            .with_layout_elements(vec![
                element(LayoutElementType::Formula, [0.0, 0.0, 80.0, 20.0], Some(1), ""),
                element(LayoutElementType::FormulaNumber, [85.0, 0.0, 100.0, 20.0], None, ""),
                element(LayoutElementType::Text, [0.0, 40.0, 100.0, 60.0], Some(2), "after"),
            ])
            .with_formulas(vec![
                FormulaResult::new(BoundingBox::from_coords(0.0, 0.0, 80.0, 20.0), "a+b", 0.9),
                FormulaResult::new(BoundingBox::from_coords(85.0, 0.0, 100.0, 20.0), "(1)", 0.8),
            ]);

        let structure = page_structure(result, 100, 100);
        assert_eq!(texts(&structure), vec!["a+b", "(1)", "after"]);
        assert!(structure.regions[..2]
            .iter()
            .all(|region| region.kind == RegionKind::Formula));
    }

    #[test]
    fn test_table_confidence_falls_back_to_layout_score() {
        let result = StructureResult::new("page.png", 0)
            .with_layout_elements(vec![element(
                LayoutElementType::Table,
                [0.0, 0.0, 100.0, 50.0],
                Some(1),
                "",
            )])
            .with_tables(vec![TableResult::new(
                BoundingBox::from_coords(0.0, 0.0, 100.0, 50.0),
                TableType::Unknown,
            )]);

        let structure = page_structure(result, 100, 100);
        assert_eq!(structure.regions.len(), 1);
        assert_eq!(structure.regions[0].confidence, 0.6);
    }

    #[test]
    fn test_structure_profile_has_no_ocr_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OarEngine::new(ModelConfig::new(dir.path())).unwrap();

        let err = engine
            .recognize_text(PipelineProfile::Structure, vec![RgbImage::new(8, 8)])
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_structure_unavailable_without_layout_model() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OarEngine::new(ModelConfig::new(dir.path())).unwrap();
        assert!(!engine.supports_structure());

        let err = engine
            .analyze_structure(RgbImage::new(8, 8))
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_missing_models_fail_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OarEngine::new(ModelConfig::new(dir.path())).unwrap();

        let err = engine
            .recognize_text(PipelineProfile::General, vec![RgbImage::new(8, 8)])
            .unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotFound(_)));

        // No pages means no pipeline is needed.
        assert!(engine
            .recognize_text(PipelineProfile::General, Vec::new())
            .unwrap()
            .is_empty());
    }
}
