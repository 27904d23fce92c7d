//! OCR subsystem.
//!
//! - [`engine`]: the [`OcrEngine`] / [`EngineFactory`] contracts
//! - [`pool`]: [`EnginePool`], the shared per-config engine cache
//! - [`normalize`]: raw [`DetectionEntry`] output to a [`PageResult`](crate::types::PageResult)
//! - [`tsv`]: Tesseract TSV words grouped into line detections
//! - [`tesseract`]: the Tesseract engine (feature `ocr`)
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "ocr")]
//! # fn example() -> kartka::Result<()> {
//! use kartka::core::config::EngineConfig;
//! use kartka::ocr::{EnginePool, TesseractEngineFactory};
//! use std::sync::Arc;
//!
//! let pool = EnginePool::new(Arc::new(TesseractEngineFactory::new()));
//! let engine = pool.get_engine(&EngineConfig::with_language("pl"))?;
//! println!("ready: {}", engine.name());
//! # Ok(())
//! # }
//! ```
pub mod engine;
pub mod language;
pub mod normalize;
pub mod pool;
#[cfg(feature = "ocr")]
pub mod tesseract;
pub mod tsv;

pub use engine::{EngineFactory, OcrEngine};
pub use language::{supported_languages, tesseract_language};
pub use normalize::{DetectionEntry, normalize};
pub use pool::{EngineInfo, EnginePool};
#[cfg(feature = "ocr")]
pub use tesseract::{TesseractEngine, TesseractEngineFactory};
