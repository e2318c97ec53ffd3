//! The recognition engine seam.
//!
//! The gateway never talks to model code directly. It hands decoded page
//! images to a [`RecognitionEngine`] and receives engine-neutral predictions
//! ([`PageText`], [`PageStructure`]) back. [`OarEngine`] is the production
//! implementation on top of `oar-ocr`.

mod oar;
mod types;

pub use oar::OarEngine;
pub use types::{
    BBox, PageStructure, PageText, RegionKind, StructureRegion, TextLine, sort_reading_order,
};

use crate::core::{GatewayResult, PipelineProfile};
use image::RgbImage;

/// Runs OCR and document structure analysis on page images.
///
/// Implementations are called from blocking worker threads and may take
/// seconds per page.
pub trait RecognitionEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Recognizes text on each image with the given pipeline profile.
    ///
    /// Returns one [`PageText`] per input image, in order.
    fn recognize_text(
        &self,
        profile: PipelineProfile,
        images: Vec<RgbImage>,
    ) -> GatewayResult<Vec<PageText>>;

    /// Runs layout, table and formula analysis on a single page.
    fn analyze_structure(&self, image: RgbImage) -> GatewayResult<PageStructure>;

    /// Returns true if [`RecognitionEngine::analyze_structure`] is available.
    fn supports_structure(&self) -> bool;
}
