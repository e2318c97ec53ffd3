//! PDF rasterisation with pdfium.

use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

use crate::core::GatewayError;

/// pdfium is not thread-safe; every load and render holds this lock.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to initialize PDFium: {0}")]
    Init(String),

    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Failed to render page {page}: {message}")]
    Render { page: usize, message: String },

    #[error("PDF has no pages")]
    Empty,
}

impl From<PdfError> for GatewayError {
    fn from(err: PdfError) -> Self {
        GatewayError::Pdf(err.to_string())
    }
}

/// Configuration for PDF rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRenderSettings {
    /// DPI for rendering (default: 144, a 2x zoom of the 72 DPI page space)
    pub dpi: f32,
    /// Maximum dimension for rendered images (default: 4000)
    pub max_dimension: u32,
}

impl Default for PdfRenderSettings {
    fn default() -> Self {
        Self {
            dpi: 144.0,
            max_dimension: 4000,
        }
    }
}

impl PdfRenderSettings {
    /// Pixel size of a page given its size in points.
    pub fn target_size(&self, width_points: f32, height_points: f32) -> (u32, u32) {
        let scale = self.dpi / 72.0;
        let mut width_px = (width_points * scale) as u32;
        let mut height_px = (height_points * scale) as u32;

        if width_px > self.max_dimension || height_px > self.max_dimension {
            let ratio = self.max_dimension as f32 / width_px.max(height_px) as f32;
            width_px = (width_px as f32 * ratio) as u32;
            height_px = (height_px as f32 * ratio) as u32;
        }

        (width_px.max(1), height_px.max(1))
    }
}

/// Renders PDF pages to RGB images.
///
/// The pdfium library is bound per call, under [`PDFIUM_LOCK`], so the
/// rasterizer itself is cheap to share between threads.
#[derive(Debug, Clone, Default)]
pub struct PdfRasterizer {
    settings: PdfRenderSettings,
}

impl PdfRasterizer {
    pub fn new(settings: PdfRenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PdfRenderSettings {
        &self.settings
    }

    /// Load a PDF from bytes and render all pages to images
    pub fn render_bytes(&self, bytes: &[u8]) -> Result<Vec<RgbImage>, PdfError> {
        let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PdfError::Load(e.to_string()))?;

        self.render_document(&document)
    }

    /// Load a PDF from a file path and render all pages to images
    pub fn render_file(&self, path: &Path) -> Result<Vec<RgbImage>, PdfError> {
        let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::Load(e.to_string()))?;

        self.render_document(&document)
    }

    fn render_document(&self, document: &PdfDocument) -> Result<Vec<RgbImage>, PdfError> {
        let page_count = document.pages().len() as usize;
        if page_count == 0 {
            return Err(PdfError::Empty);
        }

        let mut images = Vec::with_capacity(page_count);
        for (index, page) in document.pages().iter().enumerate() {
            let image = self.render_page(&page).map_err(|e| PdfError::Render {
                page: index + 1,
                message: e.to_string(),
            })?;
            images.push(image);
        }

        tracing::debug!(pages = page_count, dpi = self.settings.dpi, "Rendered PDF");
        Ok(images)
    }

    fn render_page(&self, page: &PdfPage) -> Result<RgbImage, PdfiumError> {
        let (width_px, height_px) = self
            .settings
            .target_size(page.width().value, page.height().value);

        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px as i32)
            .set_target_height(height_px as i32)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page.render_with_config(&render_config)?;
        Ok(bitmap.as_image().to_rgb8())
    }
}

fn bind_pdfium() -> Result<Pdfium, PdfError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib"))
        })
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/usr/local/lib",
            ))
        })
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/homebrew/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PdfError::Init(format!("Could not find PDFium library: {e}")))?;

    Ok(Pdfium::new(bindings))
}

/// Check if bytes represent a PDF file (magic bytes: %PDF)
pub fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Check if a file path has a PDF extension
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Check if a URL points to a PDF by its extension
pub fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".pdf") || lower.contains(".pdf?") || lower.contains(".pdf#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_size_uses_dpi() {
        let settings = PdfRenderSettings::default();
        // A4 in points.
        assert_eq!(settings.target_size(595.0, 842.0), (1190, 1684));
    }

    #[test]
    fn test_target_size_is_capped() {
        let settings = PdfRenderSettings {
            dpi: 144.0,
            max_dimension: 1000,
        };
        let (w, h) = settings.target_size(1000.0, 500.0);
        assert_eq!(w, 1000);
        assert_eq!(h, 500);
    }

    #[test]
    fn test_pdf_detection() {
        assert!(is_pdf_bytes(b"%PDF-1.7\n"));
        assert!(!is_pdf_bytes(b"%PD"));
        assert!(!is_pdf_bytes(b"\x89PNG\r\n"));

        assert!(is_pdf_path(Path::new("report.PDF")));
        assert!(!is_pdf_path(Path::new("report.png")));
        assert!(!is_pdf_path(Path::new("pdf")));

        assert!(is_pdf_url("https://example.com/a/report.pdf"));
        assert!(is_pdf_url("https://example.com/report.PDF?token=1"));
        assert!(!is_pdf_url("https://example.com/pdf/viewer"));
    }

    #[test]
    fn test_pdf_error_maps_to_server_error() {
        let err: GatewayError = PdfError::Empty.into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "PDF processing failed: PDF has no pages");
    }
}
