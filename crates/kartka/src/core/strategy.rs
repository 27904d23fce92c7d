//! Native-vs-OCR decision.
//!
//! The decision is made once per document. Every page's embedded text is
//! trimmed and measured; only if *all* pages clear [`NATIVE_TEXT_MIN_CHARS`]
//! is the native text used. Otherwise every page goes through OCR, including
//! pages that were individually fine, so a document never mixes methods.

use crate::Result;
use crate::backend::DocumentBackend;
use crate::types::{Document, ExtractionMethod};
use serde::Serialize;
use std::collections::BTreeMap;

/// A page needs strictly more trimmed characters than this to count as having text.
pub const NATIVE_TEXT_MIN_CHARS: usize = 50;

/// Measurement of one page's native text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageAssessment {
    pub page_number: usize,
    pub trimmed_chars: usize,
    pub sufficient: bool,
}

impl PageAssessment {
    pub fn of(page_number: usize, text: &str) -> Self {
        let trimmed_chars = text.trim().chars().count();
        Self {
            page_number,
            trimmed_chars,
            sufficient: trimmed_chars > NATIVE_TEXT_MIN_CHARS,
        }
    }
}

/// Why a document was routed to OCR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OcrReason {
    /// At least one page lacked native text; lists those pages.
    InsufficientText { pages: Vec<usize> },
    /// OCR was requested regardless of the text layer.
    Forced,
}

/// Outcome of strategy selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionDecision {
    /// Use the embedded text, one entry per page in order.
    Native { texts: Vec<String> },
    /// OCR every page of the document.
    Ocr { page_count: usize, reason: OcrReason },
}

impl ExtractionDecision {
    /// Decide from per-page native texts.
    pub fn from_native_texts(texts: Vec<String>) -> Self {
        let insufficient: Vec<usize> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| PageAssessment::of(i + 1, text))
            .filter(|a| !a.sufficient)
            .map(|a| a.page_number)
            .collect();

        if insufficient.is_empty() {
            ExtractionDecision::Native { texts }
        } else {
            ExtractionDecision::Ocr {
                page_count: texts.len(),
                reason: OcrReason::InsufficientText { pages: insufficient },
            }
        }
    }

    pub fn forced(page_count: usize) -> Self {
        ExtractionDecision::Ocr {
            page_count,
            reason: OcrReason::Forced,
        }
    }

    pub fn method(&self) -> ExtractionMethod {
        match self {
            ExtractionDecision::Native { .. } => ExtractionMethod::Native,
            ExtractionDecision::Ocr { .. } => ExtractionMethod::Ocr,
        }
    }

    pub fn page_count(&self) -> usize {
        match self {
            ExtractionDecision::Native { texts } => texts.len(),
            ExtractionDecision::Ocr { page_count, .. } => *page_count,
        }
    }

    /// Method per 1-based page number. Every page carries the same method.
    pub fn methods(&self) -> BTreeMap<usize, ExtractionMethod> {
        let method = self.method();
        (1..=self.page_count()).map(|page| (page, method)).collect()
    }
}

/// Run the native attempt for `document` and decide.
///
/// With `force_ocr` the text layer is not read at all; only the page count is needed.
pub fn select(document: &Document, backend: &dyn DocumentBackend, force_ocr: bool) -> Result<ExtractionDecision> {
    if force_ocr {
        return Ok(ExtractionDecision::forced(document.page_count(backend)?));
    }

    let texts = backend.native_text(document)?;
    let decision = ExtractionDecision::from_native_texts(texts);

    match &decision {
        ExtractionDecision::Native { texts } => {
            tracing::debug!(document = document.id(), pages = texts.len(), "Native text accepted");
        }
        ExtractionDecision::Ocr { page_count, reason } => {
            tracing::debug!(document = document.id(), pages = page_count, ?reason, "Routing document to OCR");
        }
    }

    Ok(decision)
}
