//! Input normalisation.
//!
//! Every endpoint accepts its document in one of four shapes: a server-local
//! path, a base64 string, a multipart upload or a remote URL. The
//! [`InputAdapter`] turns each of them into decoded page images, rasterising
//! PDFs page by page.

mod pdf;

pub use pdf::{PdfError, PdfRasterizer, PdfRenderSettings, is_pdf_bytes, is_pdf_path, is_pdf_url};

use crate::core::{GatewayError, GatewayResult};
use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions accepted for image uploads.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "png", "jpeg", "bmp", "tiff"];

/// Standard alphabet, padding optional.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// A file on the server's filesystem
    Path(PathBuf),
    /// Base64 content, optionally as a `data:` URI
    Base64(String),
    /// A multipart upload
    Upload { filename: String, bytes: Vec<u8> },
    /// An `http`/`https` URL
    Url(String),
}

impl InputSource {
    /// Short description used in logs.
    pub fn label(&self) -> String {
        match self {
            InputSource::Path(path) => path.display().to_string(),
            InputSource::Base64(data) => format!("base64 ({} chars)", data.len()),
            InputSource::Upload { filename, .. } => filename.clone(),
            InputSource::Url(url) => url.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputSource::Path(_) => "path",
            InputSource::Base64(_) => "base64",
            InputSource::Upload { .. } => "upload",
            InputSource::Url(_) => "url",
        }
    }

    /// The client-supplied filename, for uploads.
    pub fn upload_filename(&self) -> Option<&str> {
        match self {
            InputSource::Upload { filename, .. } => Some(filename),
            _ => None,
        }
    }
}

/// Content an endpoint is willing to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Images; uploads must carry an image extension
    Image,
    /// PDFs only
    Pdf,
    /// Images or PDFs
    Any,
}

/// Limits applied to remote downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub download_timeout: Duration,
    pub max_download_bytes: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            download_timeout: Duration::from_secs(30),
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

/// A decoded page, numbered from 1.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page: usize,
    pub image: RgbImage,
}

/// A document ready for recognition.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub source: String,
    pub pages: Vec<PageImage>,
    pub is_pdf: bool,
}

impl LoadedDocument {
    fn new(source: String, images: Vec<RgbImage>, is_pdf: bool) -> Self {
        let pages = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| PageImage {
                page: index + 1,
                image,
            })
            .collect();
        Self {
            source,
            pages,
            is_pdf,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Consumes the document, returning page images in order.
    pub fn into_images(self) -> Vec<RgbImage> {
        self.pages.into_iter().map(|page| page.image).collect()
    }
}

enum Content {
    Image(Vec<u8>),
    ImageFile(PathBuf),
    Pdf(Vec<u8>),
    PdfFile(PathBuf),
}

/// Loads documents from any [`InputSource`].
#[derive(Debug, Clone)]
pub struct InputAdapter {
    client: reqwest::Client,
    limits: InputLimits,
    rasterizer: PdfRasterizer,
}

impl InputAdapter {
    pub fn new(limits: InputLimits) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(limits.download_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            limits,
            rasterizer: PdfRasterizer::default(),
        })
    }

    pub fn with_rasterizer(mut self, rasterizer: PdfRasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn limits(&self) -> &InputLimits {
        &self.limits
    }

    /// Resolves `source` into page images.
    pub async fn load(&self, source: InputSource, accept: Accept) -> GatewayResult<LoadedDocument> {
        let label = source.label();
        let content = match source {
            InputSource::Path(path) => path_content(path, accept)?,
            InputSource::Base64(data) => {
                let bytes = decode_base64(&data)?;
                bytes_content(bytes, false, accept)?
            }
            InputSource::Upload { filename, bytes } => upload_content(&filename, bytes, accept)?,
            InputSource::Url(url) => {
                let looks_like_pdf = is_pdf_url(&url);
                let bytes = self.download(&url).await?;
                bytes_content(bytes, looks_like_pdf, accept)?
            }
        };

        let rasterizer = self.rasterizer.clone();
        let (images, is_pdf) =
            tokio::task::spawn_blocking(move || decode_content(content, &rasterizer)).await??;

        tracing::debug!(source = %label, pages = images.len(), is_pdf, "Loaded document");
        Ok(LoadedDocument::new(label, images, is_pdf))
    }

    /// Downloads `url`, enforcing the configured size limit.
    pub async fn download(&self, url: &str) -> GatewayResult<Vec<u8>> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| GatewayError::invalid_input(format!("Invalid URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::invalid_input(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| GatewayError::Download(format!("Failed to fetch URL: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Download(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let limit = self.limits.max_download_bytes;
        if response
            .content_length()
            .is_some_and(|len| len as usize > limit)
        {
            return Err(too_large(limit));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| GatewayError::Download(format!("Failed to read response body: {e}")))?
        {
            if body.len() + chunk.len() > limit {
                return Err(too_large(limit));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, bytes = body.len(), "Downloaded");
        Ok(body)
    }
}

fn too_large(limit: usize) -> GatewayError {
    GatewayError::Download(format!("Response exceeds the {limit} byte limit"))
}

fn path_content(path: PathBuf, accept: Accept) -> GatewayResult<Content> {
    if !path.is_file() {
        return Err(GatewayError::invalid_input(format!(
            "File not found: {}",
            path.display()
        )));
    }
    if is_pdf_path(&path) {
        return Ok(Content::PdfFile(path));
    }
    if accept == Accept::Pdf {
        return Err(not_a_pdf());
    }
    Ok(Content::ImageFile(path))
}

fn bytes_content(bytes: Vec<u8>, pdf_hint: bool, accept: Accept) -> GatewayResult<Content> {
    if bytes.is_empty() {
        return Err(GatewayError::invalid_input("Empty document"));
    }
    if pdf_hint || is_pdf_bytes(&bytes) {
        return Ok(Content::Pdf(bytes));
    }
    if accept == Accept::Pdf {
        return Err(not_a_pdf());
    }
    Ok(Content::Image(bytes))
}

fn upload_content(filename: &str, bytes: Vec<u8>, accept: Accept) -> GatewayResult<Content> {
    let is_pdf = is_pdf_path(Path::new(filename));
    let allowed = match accept {
        Accept::Image => has_image_extension(filename),
        Accept::Pdf => is_pdf,
        Accept::Any => is_pdf || has_image_extension(filename),
    };
    if !allowed {
        let message = match accept {
            Accept::Pdf => "Only PDF files are supported".to_string(),
            _ => format!("Unsupported file format: {filename}"),
        };
        return Err(GatewayError::unsupported_format(message));
    }
    if bytes.is_empty() {
        return Err(GatewayError::invalid_input(format!(
            "Uploaded file is empty: {filename}"
        )));
    }
    Ok(if is_pdf {
        Content::Pdf(bytes)
    } else {
        Content::Image(bytes)
    })
}

fn not_a_pdf() -> GatewayError {
    GatewayError::Pdf("Input is not a PDF document".to_string())
}

fn decode_content(
    content: Content,
    rasterizer: &PdfRasterizer,
) -> GatewayResult<(Vec<RgbImage>, bool)> {
    match content {
        Content::Image(bytes) => Ok((vec![image::load_from_memory(&bytes)?.to_rgb8()], false)),
        Content::ImageFile(path) => Ok((vec![image::open(&path)?.to_rgb8()], false)),
        Content::Pdf(bytes) => Ok((rasterizer.render_bytes(&bytes)?, true)),
        Content::PdfFile(path) => Ok((rasterizer.render_file(&path)?, true)),
    }
}

/// Decodes standard base64, accepting a `data:<mime>;base64,` prefix,
/// embedded whitespace and missing padding.
pub fn decode_base64(data: &str) -> GatewayResult<Vec<u8>> {
    let payload = match data.trim_start().strip_prefix("data:") {
        Some(uri) => uri
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| GatewayError::invalid_input("Malformed data URI"))?,
        None => data,
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(GatewayError::invalid_input("Empty base64 string"));
    }

    BASE64_LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| GatewayError::invalid_input(format!("Invalid base64 data: {e}")))
}

/// Returns true if `filename` ends with an accepted image extension.
pub fn has_image_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use base64::engine::general_purpose::STANDARD;
    use image::ImageFormat;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn adapter() -> InputAdapter {
        InputAdapter::new(InputLimits::default()).unwrap()
    }

    /// Serves a fixed set of routes on an ephemeral port.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_decode_base64_variants() {
        let plain = STANDARD.encode(b"hello world!");
        assert_eq!(decode_base64(&plain).unwrap(), b"hello world!");

        let unpadded = STANDARD.encode(b"hi").trim_end_matches('=').to_string();
        assert_eq!(decode_base64(&unpadded).unwrap(), b"hi");

        let data_uri = format!("data:image/png;base64,{plain}");
        assert_eq!(decode_base64(&data_uri).unwrap(), b"hello world!");

        let wrapped = format!("{}\n{}", &plain[..8], &plain[8..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"hello world!");
    }

    #[test]
    fn test_decode_base64_rejects_garbage() {
        for input in ["", "   ", "not base64!", "data:image/png;base64"] {
            let err = decode_base64(input).unwrap_err();
            assert_eq!(err.status_code(), 400, "input: {input:?}");
        }
    }

    #[test]
    fn test_image_extensions() {
        assert!(has_image_extension("scan.JPG"));
        assert!(has_image_extension("a.b.tiff"));
        assert!(!has_image_extension("scan.gif"));
        assert!(!has_image_extension("scan.pdf"));
        assert!(!has_image_extension("png"));
    }

    #[tokio::test]
    async fn test_load_base64_image() {
        let encoded = STANDARD.encode(png_bytes(12, 7));
        let doc = adapter()
            .load(InputSource::Base64(encoded), Accept::Any)
            .await
            .unwrap();

        assert!(!doc.is_pdf);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages[0].page, 1);
        assert_eq!(doc.pages[0].image.dimensions(), (12, 7));
    }

    #[tokio::test]
    async fn test_load_undecodable_image() {
        let encoded = STANDARD.encode(b"definitely not an image");
        let err = adapter()
            .load(InputSource::Base64(encoded), Accept::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ImageDecode(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_upload_extension_rules() {
        let adapter = adapter();

        let err = adapter
            .load(
                InputSource::Upload {
                    filename: "photo.gif".into(),
                    bytes: png_bytes(2, 2),
                },
                Accept::Image,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedFormat(_)));

        let err = adapter
            .load(
                InputSource::Upload {
                    filename: "photo.png".into(),
                    bytes: png_bytes(2, 2),
                },
                Accept::Pdf,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Only PDF files are supported");

        let err = adapter
            .load(
                InputSource::Upload {
                    filename: "empty.png".into(),
                    bytes: Vec::new(),
                },
                Accept::Image,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));

        let doc = adapter
            .load(
                InputSource::Upload {
                    filename: "Photo.PNG".into(),
                    bytes: png_bytes(3, 3),
                },
                Accept::Image,
            )
            .await
            .unwrap();
        assert_eq!(doc.source, "Photo.PNG");
    }

    #[tokio::test]
    async fn test_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, png_bytes(5, 4)).unwrap();

        let doc = adapter()
            .load(InputSource::Path(path.clone()), Accept::Image)
            .await
            .unwrap();
        assert_eq!(doc.pages[0].image.dimensions(), (5, 4));

        let err = adapter()
            .load(InputSource::Path(path), Accept::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Pdf(_)));

        let err = adapter()
            .load(
                InputSource::Path(dir.path().join("missing.png")),
                Accept::Image,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_pdf_only_rejects_images() {
        let encoded = STANDARD.encode(png_bytes(2, 2));
        let err = adapter()
            .load(InputSource::Base64(encoded), Accept::Pdf)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_url_validation() {
        let adapter = adapter();
        for url in ["not a url", "ftp://example.com/a.png", "file:///etc/passwd"] {
            let err = adapter
                .load(InputSource::Url(url.into()), Accept::Image)
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidInput(_)), "url: {url}");
        }
    }

    #[tokio::test]
    async fn test_download_image() {
        let png = png_bytes(9, 6);
        let app = Router::new()
            .route(
                "/scan.png",
                get(move || {
                    let png = png.clone();
                    async move { png }
                }),
            )
            .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }));
        let base = serve(app).await;
        let adapter = adapter();

        let doc = adapter
            .load(InputSource::Url(format!("{base}/scan.png")), Accept::Image)
            .await
            .unwrap();
        assert_eq!(doc.pages[0].image.dimensions(), (9, 6));

        let err = adapter
            .load(InputSource::Url(format!("{base}/missing.png")), Accept::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Download(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_download_size_limit() {
        let app = Router::new().route("/big.bin", get(|| async { vec![0u8; 4096] }));
        let base = serve(app).await;
        let adapter = InputAdapter::new(InputLimits {
            max_download_bytes: 1024,
            ..InputLimits::default()
        })
        .unwrap();

        let err = adapter
            .download(&format!("{base}/big.bin"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }
}
