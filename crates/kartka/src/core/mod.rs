//! Core orchestration.
//!
//! - **Configuration** (`config`): pipeline, engine and raster settings, loaded
//!   from TOML/YAML/JSON files with environment overrides
//! - **Strategy** (`strategy`): native text vs. OCR decision per document
//! - **State** (`state`): per-document processing state machine
//! - **Pipeline** (`pipeline`): drives a document through the stages
//!
//! # Example
//!
//! ```rust,no_run
//! use kartka::core::config::PipelineConfig;
//!
//! # fn example() -> kartka::Result<()> {
//! let mut config = PipelineConfig::discover()?.unwrap_or_default();
//! config.apply_env_overrides()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
#[cfg(feature = "tokio-runtime")]
pub mod pipeline;
pub mod state;
pub mod strategy;

pub use config::{EngineCacheKey, EngineConfig, PipelineConfig, RasterOptions};
#[cfg(feature = "tokio-runtime")]
pub use pipeline::DocumentPipeline;
pub use state::{ProcessingState, StateTracker};
pub use strategy::{ExtractionDecision, NATIVE_TEXT_MIN_CHARS, OcrReason, PageAssessment};
