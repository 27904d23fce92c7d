//! PDF documents via Pdfium.

use super::DocumentBackend;
use crate::core::config::RasterOptions;
use crate::raster::RasterImage;
use crate::types::{Document, DocumentFormat, DocumentMetadata};
use crate::{KartkaError, Result};
use pdfium_render::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PdfError {
    #[error("Failed to bind Pdfium: {0}")]
    Binding(String),

    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("PDF is password-protected")]
    PasswordRequired,

    #[error("Page {0} not found")]
    PageNotFound(usize),

    #[error("Text extraction failed: {0}")]
    TextExtractionFailed(String),

    #[error("Page {page} rendering failed: {message}")]
    RenderingFailed { page: usize, message: String },
}

/// Native text, rendering and metadata through a Pdfium binding.
pub struct PdfiumBackend {
    pdfium: Pdfium,
}

impl PdfiumBackend {
    /// Bind to a Pdfium library next to the executable, falling back to the system one.
    pub fn new() -> std::result::Result<Self, PdfError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::Binding(e.to_string()))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn load<'a>(&'a self, document: &'a Document) -> std::result::Result<PdfDocument<'a>, PdfError> {
        self.pdfium
            .load_pdf_from_byte_slice(document.content(), None)
            .map_err(|e| {
                let message = e.to_string();
                if message.to_lowercase().contains("password") {
                    PdfError::PasswordRequired
                } else {
                    PdfError::InvalidPdf(message)
                }
            })
    }
}

/// Target pixel size for a page, shrinking the zoom when an edge would exceed the limit.
fn target_size(width_points: f32, height_points: f32, options: &RasterOptions) -> (i32, i32) {
    let max = options.max_image_dimension as f32;
    let longest = width_points.max(height_points) * options.zoom;
    let zoom = if longest > max {
        options.zoom * max / longest
    } else {
        options.zoom
    };

    (
        ((width_points * zoom) as i32).max(1),
        ((height_points * zoom) as i32).max(1),
    )
}

impl DocumentBackend for PdfiumBackend {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn page_count(&self, document: &Document) -> Result<usize> {
        let pdf = self.load(document)?;
        Ok(pdf.pages().len() as usize)
    }

    fn native_text(&self, document: &Document) -> Result<Vec<String>> {
        let pdf = self.load(document)?;
        let mut texts = Vec::with_capacity(pdf.pages().len() as usize);

        for page in pdf.pages().iter() {
            let text = page
                .text()
                .map_err(|e| PdfError::TextExtractionFailed(e.to_string()))?;
            texts.push(text.all());
        }

        Ok(texts)
    }

    fn rasterize(&self, document: &Document, page_number: usize, options: &RasterOptions) -> Result<RasterImage> {
        let pdf = self.load(document).map_err(|e| {
            KartkaError::page_render_with_source(page_number, "Failed to open document for rendering", e)
        })?;

        let page_count = pdf.pages().len() as usize;
        if page_number == 0 || page_number > page_count {
            return Err(PdfError::PageNotFound(page_number).into());
        }

        let page = pdf
            .pages()
            .get((page_number - 1) as u16)
            .map_err(|_| PdfError::PageNotFound(page_number))?;

        let (width, height) = target_size(page.width().value, page.height().value, options);
        tracing::debug!(
            page = page_number,
            width,
            height,
            dpi = options.effective_dpi(),
            "Rendering PDF page"
        );

        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page.render_with_config(&config).map_err(|e| PdfError::RenderingFailed {
            page: page_number,
            message: e.to_string(),
        })?;

        RasterImage::new(page_number, bitmap.as_image().into_rgb8())
    }

    fn metadata(&self, document: &Document) -> Result<DocumentMetadata> {
        let pdf = self.load(document)?;
        let info = pdf.metadata();
        let tag = |kind: PdfDocumentMetadataTagType| {
            info.get(kind)
                .map(|t| t.value().trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(DocumentMetadata {
            format: Some(DocumentFormat::Pdf),
            page_count: pdf.pages().len() as usize,
            size_bytes: document.size_bytes(),
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            created_at: tag(PdfDocumentMetadataTagType::CreationDate),
            modified_at: tag(PdfDocumentMetadataTagType::ModificationDate),
            image_dimensions: None,
        })
    }
}
