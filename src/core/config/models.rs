//! Model selection and pipeline profiles.
//!
//! Model files are looked up by their PaddleOCR names inside a single model
//! directory. Any path can be overridden individually.

use crate::core::errors::{GatewayError, GatewayResult};
use std::path::PathBuf;

/// Default OCR language, matching PaddleOCR's default.
pub const DEFAULT_LANGUAGE: &str = "ch";

/// Languages served by the multilingual PP-OCRv5 base recognizer.
const BASE_LANGUAGES: [&str; 3] = ["ch", "chinese_cht", "japan"];

const DOC_ORIENTATION_MODEL: &str = "PP-LCNet_x1_0_doc_ori.onnx";
const DOC_UNWARPING_MODEL: &str = "UVDoc.onnx";
const TEXTLINE_ORIENTATION_MODEL: &str = "PP-LCNet_x1_0_textline_ori.onnx";
const LAYOUT_MODEL: &str = "PP-DocLayout_plus-L.onnx";
const TABLE_STRUCTURE_MODEL: &str = "SLANeXt_wired.onnx";
const TABLE_STRUCTURE_DICT: &str = "table_structure_dict_ch.txt";
const FORMULA_MODEL: &str = "PP-FormulaNet_plus-L.onnx";
const FORMULA_TOKENIZER: &str = "PP-FormulaNet_plus-L_tokenizer.json";

/// Size class of the detection/recognition models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    Server,
    Mobile,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Server => "server",
            ModelVariant::Mobile => "mobile",
        }
    }
}

/// Fixed engine configurations used by the endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineProfile {
    /// Image OCR: document orientation and unwarping on, text-line orientation off.
    General,
    /// PDF pages: angle classification on, document preprocessing off, mobile models.
    Document,
    /// PP-Structure: layout, tables and formulas with integrated OCR.
    Structure,
}

/// Preprocessing switches and model size for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub doc_orientation: bool,
    pub doc_unwarping: bool,
    pub textline_orientation: bool,
    pub variant: ModelVariant,
}

impl PipelineProfile {
    pub fn options(&self) -> PipelineOptions {
        match self {
            PipelineProfile::General => PipelineOptions {
                doc_orientation: true,
                doc_unwarping: true,
                textline_orientation: false,
                variant: ModelVariant::Server,
            },
            PipelineProfile::Document => PipelineOptions {
                doc_orientation: false,
                doc_unwarping: false,
                textline_orientation: true,
                variant: ModelVariant::Mobile,
            },
            PipelineProfile::Structure => PipelineOptions {
                doc_orientation: false,
                doc_unwarping: false,
                textline_orientation: false,
                variant: ModelVariant::Server,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineProfile::General => "general",
            PipelineProfile::Document => "document",
            PipelineProfile::Structure => "structure",
        }
    }
}

/// Explicit model paths that replace the defaults from the model directory.
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub det_model: Option<PathBuf>,
    pub rec_model: Option<PathBuf>,
    pub dict_path: Option<PathBuf>,
    pub doc_orientation_model: Option<PathBuf>,
    pub doc_unwarping_model: Option<PathBuf>,
    pub textline_orientation_model: Option<PathBuf>,
    pub layout_model: Option<PathBuf>,
    pub table_structure_model: Option<PathBuf>,
    pub table_structure_dict: Option<PathBuf>,
    pub formula_model: Option<PathBuf>,
    pub formula_tokenizer: Option<PathBuf>,
}

/// Configuration for locating models and running them.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Directory holding the ONNX models and dictionaries
    pub model_dir: PathBuf,
    /// OCR language (PaddleOCR language code)
    pub language: String,
    /// Device to run on (cpu, cuda, cuda:N)
    pub device: String,
    pub overrides: ModelOverrides,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            language: DEFAULT_LANGUAGE.to_string(),
            device: "cpu".to_string(),
            overrides: ModelOverrides::default(),
        }
    }
}

/// Resolved models for a text recognition pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrModelPaths {
    pub det_model: PathBuf,
    pub rec_model: PathBuf,
    pub dict_path: PathBuf,
    pub doc_orientation_model: Option<PathBuf>,
    pub doc_unwarping_model: Option<PathBuf>,
    pub textline_orientation_model: Option<PathBuf>,
}

/// Resolved models for the PP-Structure pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureModelPaths {
    pub layout_model: PathBuf,
    pub ocr: OcrModelPaths,
    /// Table structure model and its dictionary
    pub table: Option<(PathBuf, PathBuf)>,
    /// Formula model and its tokenizer
    pub formula: Option<(PathBuf, PathBuf)>,
}

impl ModelConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_overrides(mut self, overrides: ModelOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    fn uses_base_recognizer(&self) -> bool {
        BASE_LANGUAGES.contains(&self.language.as_str())
    }

    /// File name of the recognition model for the configured language.
    pub fn rec_model_name(&self, variant: ModelVariant) -> String {
        if self.uses_base_recognizer() {
            format!("PP-OCRv5_{}_rec.onnx", variant.as_str())
        } else {
            format!("{}_PP-OCRv5_mobile_rec.onnx", self.language)
        }
    }

    /// File name of the character dictionary for the configured language.
    pub fn dict_name(&self) -> String {
        if self.uses_base_recognizer() {
            "ppocrv5_dict.txt".to_string()
        } else {
            format!("ppocrv5_{}_dict.txt", self.language)
        }
    }

    fn pick(&self, explicit: &Option<PathBuf>, default_name: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.model_dir.join(default_name))
    }

    /// Resolves the models for a text recognition profile.
    pub fn resolve_ocr(&self, profile: PipelineProfile) -> GatewayResult<OcrModelPaths> {
        let options = profile.options();
        let det_name = format!("PP-OCRv5_{}_det.onnx", options.variant.as_str());

        let det_model = require(
            self.pick(&self.overrides.det_model, &det_name),
            "Text detection model",
        )?;
        let rec_model = require(
            self.pick(&self.overrides.rec_model, &self.rec_model_name(options.variant)),
            "Text recognition model",
        )?;
        let dict_path = require(
            self.pick(&self.overrides.dict_path, &self.dict_name()),
            "Character dictionary",
        )?;

        let doc_orientation_model = options
            .doc_orientation
            .then(|| {
                optional(
                    self.pick(&self.overrides.doc_orientation_model, DOC_ORIENTATION_MODEL),
                    "Document orientation model",
                )
            })
            .flatten();
        let doc_unwarping_model = options
            .doc_unwarping
            .then(|| {
                optional(
                    self.pick(&self.overrides.doc_unwarping_model, DOC_UNWARPING_MODEL),
                    "Document unwarping model",
                )
            })
            .flatten();
        let textline_orientation_model = options
            .textline_orientation
            .then(|| {
                optional(
                    self.pick(
                        &self.overrides.textline_orientation_model,
                        TEXTLINE_ORIENTATION_MODEL,
                    ),
                    "Text line orientation model",
                )
            })
            .flatten();

        Ok(OcrModelPaths {
            det_model,
            rec_model,
            dict_path,
            doc_orientation_model,
            doc_unwarping_model,
            textline_orientation_model,
        })
    }

    /// Path of the layout model, whether or not it exists.
    pub fn layout_model_path(&self) -> PathBuf {
        self.pick(&self.overrides.layout_model, LAYOUT_MODEL)
    }

    /// Returns true if the PP-Structure pipeline can be built.
    pub fn has_structure_models(&self) -> bool {
        self.layout_model_path().is_file()
    }

    /// Resolves the models for the PP-Structure pipeline.
    pub fn resolve_structure(&self) -> GatewayResult<StructureModelPaths> {
        let layout_model = require(self.layout_model_path(), "Layout detection model")?;
        let ocr = self.resolve_ocr(PipelineProfile::Structure)?;

        let table = optional(
            self.pick(&self.overrides.table_structure_model, TABLE_STRUCTURE_MODEL),
            "Table structure model",
        )
        .and_then(|model| {
            optional(
                self.pick(&self.overrides.table_structure_dict, TABLE_STRUCTURE_DICT),
                "Table structure dictionary",
            )
            .map(|dict| (model, dict))
        });

        let formula = optional(
            self.pick(&self.overrides.formula_model, FORMULA_MODEL),
            "Formula recognition model",
        )
        .and_then(|model| {
            optional(
                self.pick(&self.overrides.formula_tokenizer, FORMULA_TOKENIZER),
                "Formula tokenizer",
            )
            .map(|tokenizer| (model, tokenizer))
        });

        Ok(StructureModelPaths {
            layout_model,
            ocr,
            table,
            formula,
        })
    }
}

fn require(path: PathBuf, what: &str) -> GatewayResult<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(GatewayError::ModelNotFound(format!(
            "{} not found: {}",
            what,
            path.display()
        )))
    }
}

fn optional(path: PathBuf, what: &str) -> Option<PathBuf> {
    if path.is_file() {
        Some(path)
    } else {
        tracing::warn!(path = %path.display(), "{} not found, skipping", what);
        None
    }
}
