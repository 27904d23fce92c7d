//! Error types for Kartka.
//!
//! Every fallible operation in the crate returns [`KartkaError`]. The variants
//! follow the pipeline's failure taxonomy:
//!
//! - `EngineInitialization` - an OCR engine could not be constructed (missing
//!   runtime, unknown language, unreadable dictionary). Fatal, never retried.
//! - `PageRender` - a page could not be rasterized. Aborts the whole document.
//! - `Recognition` - the engine call failed for one page. Aborts the whole document.
//!
//! Malformed detector output is not an error at all: the normalizer drops the
//! entry, logs a warning and carries on.
//!
//! **System errors always bubble up unchanged:** `KartkaError::Io` wraps
//! `std::io::Error` without adding context so permission and disk problems stay
//! recognisable to the caller.
//!
//! # Example
//!
//! ```rust
//! use kartka::{KartkaError, Result};
//!
//! fn check_zoom(zoom: f32) -> Result<()> {
//!     if zoom <= 0.0 {
//!         return Err(KartkaError::validation(format!("zoom must be positive, got {zoom}")));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_zoom(0.0).is_err());
//! ```
use crate::types::PipelineStage;
use thiserror::Error;

/// Result type alias using `KartkaError`.
pub type Result<T> = std::result::Result<T, KartkaError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Kartka operations.
#[derive(Debug, Error)]
pub enum KartkaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine initialization failed: {message}")]
    EngineInitialization {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Failed to render page {page}: {message}")]
    PageRender {
        page: usize,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Recognition failed on page {page}: {message}")]
    Recognition {
        page: usize,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for KartkaError {
    fn from(err: serde_json::Error) -> Self {
        KartkaError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<crate::backend::pdf::PdfError> for KartkaError {
    fn from(err: crate::backend::pdf::PdfError) -> Self {
        use crate::backend::pdf::PdfError;

        match err {
            PdfError::PageNotFound(page) => KartkaError::PageRender {
                page,
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
            PdfError::RenderingFailed { page, .. } => KartkaError::PageRender {
                page,
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
            _ => KartkaError::Validation {
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        paste::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

macro_rules! page_error_constructor {
    ($name:ident, $variant:ident) => {
        paste::paste! {
            #[doc = "Create a " $variant " error for a 1-based page number"]
            pub fn $name<S: Into<String>>(page: usize, message: S) -> Self {
                Self::$variant {
                    page,
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source for a 1-based page number"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                page: usize,
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    page,
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl KartkaError {
    error_constructor!(engine_initialization, EngineInitialization);
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);
    page_error_constructor!(page_render, PageRender);
    page_error_constructor!(recognition, Recognition);

    /// Pipeline stage a fatal error originates from, if it is stage-specific.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            KartkaError::EngineInitialization { .. } | KartkaError::Recognition { .. } => {
                Some(PipelineStage::Recognizing)
            }
            KartkaError::PageRender { .. } => Some(PipelineStage::Rasterizing),
            _ => None,
        }
    }

    /// Short, stable name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            KartkaError::Io(_) => "io",
            KartkaError::EngineInitialization { .. } => "engine_initialization",
            KartkaError::PageRender { .. } => "page_render",
            KartkaError::Recognition { .. } => "recognition",
            KartkaError::Validation { .. } => "validation",
            KartkaError::Serialization { .. } => "serialization",
            KartkaError::UnsupportedFormat(_) => "unsupported_format",
            KartkaError::Other(_) => "other",
        }
    }
}
