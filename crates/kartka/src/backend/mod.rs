//! Format backends.
//!
//! A [`DocumentBackend`] understands one [`DocumentFormat`]: it counts pages,
//! reads the embedded text layer and renders single pages to RGB. Page numbers
//! are 1-based everywhere.

pub mod image;
#[cfg(feature = "pdf")]
pub mod pdf;

pub use self::image::ImageBackend;
#[cfg(feature = "pdf")]
pub use self::pdf::{PdfError, PdfiumBackend};

use crate::Result;
use crate::core::config::RasterOptions;
use crate::raster::RasterImage;
use crate::types::{Document, DocumentFormat, DocumentMetadata};

pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &str;

    fn format(&self) -> DocumentFormat;

    fn page_count(&self, document: &Document) -> Result<usize>;

    /// Embedded text of every page, in page order. Pages without a text layer
    /// yield an empty string.
    fn native_text(&self, document: &Document) -> Result<Vec<String>>;

    /// Render exactly one page. Out-of-range pages and corrupt sources are
    /// `PageRender` errors, never a blank image.
    fn rasterize(&self, document: &Document, page_number: usize, options: &RasterOptions) -> Result<RasterImage>;

    fn metadata(&self, document: &Document) -> Result<DocumentMetadata>;
}
