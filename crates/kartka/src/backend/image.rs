//! Single-frame raster documents (PNG, JPEG, TIFF, ...).

use super::DocumentBackend;
use crate::core::config::RasterOptions;
use crate::raster::RasterImage;
use crate::types::{Document, DocumentFormat, DocumentMetadata, ImageDimensions};
use crate::{KartkaError, Result};
use image::ImageReader;
use std::io::Cursor;

/// Images are one page with no text layer, so they always go to OCR.
///
/// Images are recognized at their native resolution; zoom only affects
/// formats that are rendered from vector content.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBackend;

impl ImageBackend {
    fn reader(document: &Document) -> Result<ImageReader<Cursor<&[u8]>>> {
        ImageReader::new(Cursor::new(document.content()))
            .with_guessed_format()
            .map_err(KartkaError::Io)
    }

    fn dimensions(document: &Document) -> Result<ImageDimensions> {
        let (width, height) = Self::reader(document)?
            .into_dimensions()
            .map_err(|e| KartkaError::validation_with_source("Failed to read image header", e))?;
        Ok(ImageDimensions { width, height })
    }
}

impl DocumentBackend for ImageBackend {
    fn name(&self) -> &str {
        "image"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Image
    }

    fn page_count(&self, document: &Document) -> Result<usize> {
        Self::dimensions(document)?;
        Ok(1)
    }

    fn native_text(&self, _document: &Document) -> Result<Vec<String>> {
        Ok(vec![String::new()])
    }

    fn rasterize(&self, document: &Document, page_number: usize, _options: &RasterOptions) -> Result<RasterImage> {
        if page_number != 1 {
            return Err(KartkaError::page_render(
                page_number,
                "page out of range: image documents have exactly one page",
            ));
        }

        let decoded = Self::reader(document)?
            .decode()
            .map_err(|e| KartkaError::page_render_with_source(page_number, "Failed to decode image", e))?;

        RasterImage::new(page_number, decoded.into_rgb8())
    }

    fn metadata(&self, document: &Document) -> Result<DocumentMetadata> {
        Ok(DocumentMetadata {
            format: Some(DocumentFormat::Image),
            page_count: 1,
            size_bytes: document.size_bytes(),
            image_dimensions: Some(Self::dimensions(document)?),
            ..DocumentMetadata::default()
        })
    }
}
