//! Kartka - hybrid native/OCR text extraction for scanned and born-digital documents.
//!
//! Kartka reads the embedded text layer of a document when it has one and
//! falls back to page-by-page OCR when it does not. OCR output is normalized
//! into uniform text blocks and can be passed through language-specific
//! correction rules (Polish invoices today).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "ocr", feature = "tokio-runtime"))]
//! # fn main() -> kartka::Result<()> {
//! use kartka::{Document, DocumentPipeline, EnginePool, PipelineConfig};
//! use kartka::ocr::TesseractEngineFactory;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(EnginePool::new(Arc::new(TesseractEngineFactory::new())));
//! let pipeline = DocumentPipeline::new(pool);
//!
//! let document = Document::from_path("scan.pdf")?;
//! let result = pipeline.process_sync(&document, &PipelineConfig::default())?;
//! println!("{}", result.combined_text());
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "ocr", feature = "tokio-runtime")))]
//! # fn main() {}
//! ```
//!
//! # Architecture
//!
//! - **Backends** (`backend`): per-format page counting, native text and rasterization
//! - **Rasterizer** (`raster`): page images, preprocessing and scoped temp staging
//! - **OCR** (`ocr`): engine trait, shared engine pool, detector output normalization
//! - **Text** (`text`): language post-processing
//! - **Core** (`core`): configuration, strategy selection, state tracking, orchestration
//!
//! # Features
//!
//! - `tokio-runtime` (default): async [`DocumentPipeline`]
//! - `pdf`: Pdfium-backed PDF support
//! - `ocr`: Tesseract engine factory

#![deny(unsafe_code)]

pub mod backend;
pub mod core;
pub mod error;
pub mod ocr;
pub mod raster;
pub mod text;
pub mod types;

pub use error::{KartkaError, Result};

pub use core::config::{EngineConfig, PipelineConfig, RasterOptions};
#[cfg(feature = "tokio-runtime")]
pub use core::pipeline::DocumentPipeline;
pub use core::state::{ProcessingState, StateTracker};
pub use core::strategy::ExtractionDecision;

pub use ocr::{EngineFactory, EnginePool, OcrEngine};

pub use types::{
    BoundingBox, Document, DocumentFormat, DocumentMetadata, DocumentResult, ExtractionMethod, PageResult, Point,
    TextBlock,
};
