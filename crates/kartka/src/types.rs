//! Document, page and result types shared across the pipeline.

use crate::backend::DocumentBackend;
use crate::{KartkaError, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Source format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Image,
}

impl DocumentFormat {
    /// Map a MIME type to a document format.
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        if mime_type == PDF_MIME_TYPE {
            Some(Self::Pdf)
        } else if mime_type.starts_with("image/") {
            Some(Self::Image)
        } else {
            None
        }
    }

    /// Map a file extension (without the dot, any case) to a document format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }

    /// Detect the format from magic bytes, falling back to the file extension.
    pub fn detect(content: &[u8], path: Option<&Path>) -> Result<Self> {
        if let Some(kind) = infer::get(content)
            && let Some(format) = Self::from_mime_type(kind.mime_type())
        {
            return Ok(format);
        }

        path.and_then(|p| p.extension())
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                let name = path
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<bytes>".to_string());
                KartkaError::UnsupportedFormat(format!("cannot determine document format of {name}"))
            })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Image => write!(f, "image"),
        }
    }
}

/// An immutable document: identifier, raw bytes and format.
///
/// The page count is resolved lazily through the backend that understands the
/// format and cached for the lifetime of the document.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    content: Arc<[u8]>,
    format: DocumentFormat,
    page_count: OnceCell<usize>,
}

impl Document {
    pub fn from_bytes(id: impl Into<String>, content: impl Into<Arc<[u8]>>, format: DocumentFormat) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            format,
            page_count: OnceCell::new(),
        }
    }

    /// Load a document from disk, detecting its format. The id is a fresh UUID.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let format = DocumentFormat::detect(&content, Some(path))?;
        Ok(Self::from_bytes(uuid::Uuid::new_v4().to_string(), content, format))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }

    /// Number of pages, asking the backend on first use.
    pub fn page_count(&self, backend: &dyn DocumentBackend) -> Result<usize> {
        self.page_count.get_or_try_init(|| backend.page_count(self)).copied()
    }
}

/// A point in raster pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Four corner points of a detected text region, in detector order.
pub type Quadrilateral = [Point; 4];

/// Axis-aligned bounding box derived from a quadrilateral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Smallest box enclosing every point. Degenerate input yields zero width/height.
    pub fn enclosing(points: &[Point]) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);

        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        if points.is_empty() {
            return Self {
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 0.0,
            };
        }

        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

/// One recognized text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// Always finite and within [0, 1].
    pub confidence: f64,
    pub coordinates: Quadrilateral,
    pub bbox: BoundingBox,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, confidence: f64, coordinates: Quadrilateral) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox: BoundingBox::enclosing(&coordinates),
            coordinates,
        }
    }
}

/// How the text of a page (and, by policy, of the whole document) was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Native,
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Native => write!(f, "native"),
            ExtractionMethod::Ocr => write!(f, "ocr"),
        }
    }
}

/// Pixel dimensions of the raster a page was recognized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Result for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    pub page_number: usize,
    /// Newline-joined text of the retained blocks (or the native text layer).
    pub text: String,
    pub blocks: Vec<TextBlock>,
    /// Mean block confidence, 0.0 without blocks. Native pages report 1.0.
    pub confidence: f64,
    pub method: ExtractionMethod,
    #[serde(with = "duration_secs")]
    pub processing_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dimensions: Option<ImageDimensions>,
    /// Detector entries discarded as malformed or empty.
    #[serde(default)]
    pub dropped_detections: usize,
}

impl PageResult {
    /// A page whose text came straight from the embedded text layer.
    pub fn native(page_number: usize, text: String) -> Self {
        Self {
            page_number,
            text,
            blocks: Vec::new(),
            confidence: 1.0,
            method: ExtractionMethod::Native,
            processing_time: Duration::ZERO,
            image_dimensions: None,
            dropped_detections: 0,
        }
    }
}

/// Result for a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub document_id: String,
    pub pages: Vec<PageResult>,
    pub total_pages: usize,
    #[serde(with = "duration_secs")]
    pub processing_time: Duration,
    /// Document-wide method; every page shares it.
    pub method: ExtractionMethod,
}

impl DocumentResult {
    /// All page texts separated by a blank line.
    pub fn combined_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Every non-empty trimmed line across all pages, in page order.
    pub fn lines(&self) -> Vec<&str> {
        self.pages
            .iter()
            .flat_map(|page| page.text.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Mean of the per-page confidences, 0.0 for an empty document.
    pub fn average_confidence(&self) -> f64 {
        if self.pages.is_empty() {
            return 0.0;
        }
        self.pages.iter().map(|p| p.confidence).sum::<f64>() / self.pages.len() as f64
    }
}

/// Descriptive information about a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub format: Option<DocumentFormat>,
    pub page_count: usize,
    pub size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_dimensions: Option<ImageDimensions>,
}

/// Stage of the per-document pipeline, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Loading,
    NativeAttempt,
    Rasterizing,
    Recognizing,
    Normalizing,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Loading => "loading",
            PipelineStage::NativeAttempt => "native_attempt",
            PipelineStage::Rasterizing => "rasterizing",
            PipelineStage::Recognizing => "recognizing",
            PipelineStage::Normalizing => "normalizing",
        };
        f.write_str(name)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
