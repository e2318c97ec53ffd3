//! # OCR Gateway
//!
//! HTTP and CLI front end for PaddleOCR text recognition and PP-Structure
//! document analysis.
//!
//! A request flows through three stages:
//!
//! 1. [`input`] normalizes a local path, base64 string, uploaded file, remote URL
//!    or PDF into a set of page images.
//! 2. [`engine`] runs the recognition models (via `oar-ocr`) on those pages.
//! 3. [`response`] reshapes the predictions into the JSON envelope returned by
//!    every endpoint.
//!
//! [`gateway`] wires the three together and is what the server binary calls.
//!
//! ## Modules
//!
//! * [`core`] - Configuration and error types
//! * [`input`] - Input adapter and PDF rasterisation
//! * [`engine`] - Recognition engine trait and the `oar-ocr` implementation
//! * [`table`] - Table reconstruction from text boxes and HTML table parsing
//! * [`response`] - Envelope and response item types
//! * [`gateway`] - Request orchestration
//! * [`utils`] - Logging setup

pub mod core;
pub mod engine;
pub mod gateway;
pub mod input;
pub mod response;
pub mod table;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{GatewayError, GatewayResult, ModelConfig, PipelineProfile};
    pub use crate::engine::{
        BBox, OarEngine, PageStructure, PageText, RecognitionEngine, RegionKind,
        StructureRegion, TextLine,
    };
    pub use crate::gateway::OcrGateway;
    pub use crate::input::{Accept, InputAdapter, InputLimits, InputSource, LoadedDocument};
    pub use crate::response::{Envelope, PageTable, RecognitionItem};
    pub use crate::table::{TableData, TableReconstructor};
}
