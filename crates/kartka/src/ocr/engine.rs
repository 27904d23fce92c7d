//! OCR engine contracts.
//!
//! An [`EngineFactory`] turns an [`EngineConfig`] into a recognition handle;
//! the [`EnginePool`](super::EnginePool) decides when to call it.

use crate::Result;
use crate::core::config::EngineConfig;
use crate::ocr::normalize::DetectionEntry;
use crate::raster::StagedRaster;
use std::sync::Arc;

/// A constructed, ready-to-use recognition engine.
///
/// Implementations must be shareable across threads: the same handle serves
/// every document whose config maps to the same cache key.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Run detection and recognition on one staged page raster.
    ///
    /// Calls block and may be CPU or GPU bound; the pipeline dispatches them
    /// off the async executor.
    fn recognize(&self, raster: &StagedRaster, angle_classification: bool) -> Result<Vec<DetectionEntry>>;

    /// Language codes this engine instance can recognize.
    fn supported_languages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Builds engines honoring every [`EngineConfig`] field.
pub trait EngineFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Construct a new engine. Failures must be `EngineInitialization` errors.
    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>>;
}
