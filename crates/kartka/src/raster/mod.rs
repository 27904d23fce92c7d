//! Page rasters and their transient on-disk staging.
//!
//! A [`RasterImage`] is the in-memory RGB render of one page. Before
//! recognition it is staged into a [`RasterStore`], which hands back a
//! [`StagedRaster`] guard; dropping the guard deletes the file, so staged
//! rasters never outlive the page that produced them.

pub mod preprocess;
pub mod store;

pub use preprocess::preprocess;
pub use store::{RasterStore, StagedRaster};

use crate::types::ImageDimensions;
use crate::{KartkaError, Result};
use image::RgbImage;
use image::imageops::FilterType;

/// In-memory RGB render of one page.
#[derive(Debug, Clone)]
pub struct RasterImage {
    page_number: usize,
    image: RgbImage,
}

impl RasterImage {
    /// Wrap a rendered page. A zero-sized image is a render failure, never a blank page.
    pub fn new(page_number: usize, image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(KartkaError::page_render(
                page_number,
                format!("renderer produced an empty {}x{} image", image.width(), image.height()),
            ));
        }
        Ok(Self { page_number, image })
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Raw interleaved RGB bytes, row-major.
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Scale down so neither edge exceeds `max_dimension`, keeping the aspect ratio.
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let longest = self.width().max(self.height());
        if longest <= max_dimension {
            return self;
        }

        let scale = max_dimension as f64 / longest as f64;
        let width = ((self.width() as f64 * scale).round() as u32).max(1);
        let height = ((self.height() as f64 * scale).round() as u32).max(1);
        tracing::debug!(
            page = self.page_number,
            from_width = self.width(),
            from_height = self.height(),
            width,
            height,
            "Downscaling oversized raster"
        );

        Self {
            page_number: self.page_number,
            image: image::imageops::resize(&self.image, width, height, FilterType::Triangle),
        }
    }

    pub(crate) fn map_image(self, f: impl FnOnce(RgbImage) -> RgbImage) -> Self {
        Self {
            page_number: self.page_number,
            image: f(self.image),
        }
    }
}
