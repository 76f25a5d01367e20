//! Text extraction from uploaded documents.
//!
//! Dispatch is by declared file extension, mirroring how the upload layer
//! labels attachments:
//!
//! * `.pdf` — structural extraction with `lopdf`, page by page. A page
//!   that yields nothing contributes an empty string; one bad page never
//!   fails the whole document.
//! * `.jpg` / `.jpeg` / `.png` / `.bmp` / `.tiff` — decode and hand off to
//!   the configured [`OcrBackend`].
//! * anything else — `"unsupported format"`.
//!
//! Extraction is infallible from the caller's point of view: every failure
//! is folded into [`ExtractedText::error`] and the pipelines decide what
//! to do with it. Input is a byte slice, not a path — attachments may come
//! from object storage, a database blob, or a test literal.

use crate::error::PipelineError;
use crate::outcome::{ExtractedText, SourceKind};
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Optical character recognition over a decoded raster image.
///
/// CPU-bound and synchronous, like the engines behind it. Tests implement
/// this with a canned-string stub.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, PipelineError>;
}

/// Extension-dispatched text extractor.
#[derive(Clone, Default)]
pub struct TextExtractor {
    ocr: Option<Arc<dyn OcrBackend>>,
}

impl TextExtractor {
    /// An extractor without OCR: PDFs work, raster images report an error.
    pub fn new() -> Self {
        Self { ocr: None }
    }

    /// An extractor that runs `ocr` on raster attachments.
    pub fn with_ocr(ocr: Arc<dyn OcrBackend>) -> Self {
        Self { ocr: Some(ocr) }
    }

    /// Extract text from `data`, dispatching on `file_name`'s extension.
    pub fn extract(&self, data: &[u8], file_name: &str) -> ExtractedText {
        let extension = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => self.extract_pdf(data),
            "jpg" | "jpeg" | "png" | "bmp" | "tiff" => self.extract_image(data),
            _ => ExtractedText::failed(None, "unsupported format"),
        }
    }

    /// Convenience: read `path` and extract. I/O errors are folded into
    /// the result like any other extraction failure.
    pub fn extract_path(&self, path: impl AsRef<Path>) -> ExtractedText {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(data) => self.extract(&data, &path.to_string_lossy()),
            Err(e) => ExtractedText::failed(None, format!("failed to read file: {e}")),
        }
    }

    fn extract_pdf(&self, data: &[u8]) -> ExtractedText {
        let mut doc = match lopdf::Document::load_mem(data) {
            Ok(doc) => doc,
            Err(e) => {
                return ExtractedText::failed(
                    Some(SourceKind::Pdf),
                    format!("failed to parse PDF: {e}"),
                )
            }
        };

        // Some scanners emit PDFs "encrypted" with the empty user password.
        if doc.is_encrypted() && doc.decrypt("").is_err() {
            return ExtractedText::failed(
                Some(SourceKind::Pdf),
                "PDF is encrypted and requires a password",
            );
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return ExtractedText::failed(Some(SourceKind::Pdf), "PDF has no pages");
        }

        let mut content = String::new();
        for page in page_numbers {
            match doc.extract_text(&[page]) {
                Ok(text) => {
                    if !content.is_empty() && !text.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&text);
                }
                Err(e) => {
                    // One unreadable page contributes nothing.
                    debug!("page {page}: text extraction failed: {e}");
                }
            }
        }

        debug!("extracted {} chars of PDF text", content.len());
        ExtractedText::ok(SourceKind::Pdf, content)
    }

    fn extract_image(&self, data: &[u8]) -> ExtractedText {
        let Some(ocr) = &self.ocr else {
            return ExtractedText::failed(
                Some(SourceKind::Image),
                "no OCR backend configured for image attachments",
            );
        };

        let image = match image::load_from_memory(data) {
            Ok(img) => img,
            Err(e) => {
                return ExtractedText::failed(
                    Some(SourceKind::Image),
                    format!("failed to decode image: {e}"),
                )
            }
        };

        match ocr.recognize(&image) {
            Ok(text) => {
                debug!("OCR produced {} chars", text.len());
                ExtractedText::ok(SourceKind::Image, text)
            }
            Err(e) => ExtractedText::failed(Some(SourceKind::Image), e.to_string()),
        }
    }
}

// ── pure-onnx-ocr backend ────────────────────────────────────────────────

/// OCR backend over `pure-onnx-ocr` (pure Rust, no external runtime).
///
/// Requires `det.onnx`, `latin_rec.onnx`, and `latin_dict.txt` in a model
/// directory. Recognised regions are joined in the engine's reading
/// order, one per line.
#[cfg(feature = "ocr")]
pub struct PureOcr {
    engine: pure_onnx_ocr::engine::OcrEngine,
}

#[cfg(feature = "ocr")]
impl PureOcr {
    /// Load detection/recognition models from `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self, PipelineError> {
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&model_dir.join("det.onnx"))
            .rec_model_path(&model_dir.join("latin_rec.onnx"))
            .dictionary_path(&model_dir.join("latin_dict.txt"))
            .build()
            .map_err(|e| PipelineError::Ocr {
                detail: format!("failed to load models from {}: {e}", model_dir.display()),
            })?;
        Ok(Self { engine })
    }
}

#[cfg(feature = "ocr")]
impl OcrBackend for PureOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String, PipelineError> {
        let regions = self
            .engine
            .run_from_image(image)
            .map_err(|e| PipelineError::Ocr {
                detail: format!("recognition failed: {e}"),
            })?;
        Ok(regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
