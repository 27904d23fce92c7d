//! Raw detector output to [`PageResult`].
//!
//! Engines hand back [`DetectionEntry`] values whose fields may each be missing
//! or of the wrong shape. They are validated exactly once, here. Entries that
//! cannot be turned into a [`TextBlock`] are dropped with a warning and counted;
//! they never fail the page.

use crate::types::{ExtractionMethod, PageResult, Point, Quadrilateral, TextBlock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Confidence assigned when the detector gives none (or gives garbage).
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// One raw detection as emitted by an engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionEntry {
    #[serde(default)]
    pub coordinates: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
}

impl DetectionEntry {
    pub fn new(coordinates: Vec<[f64; 2]>, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            coordinates: Some(coordinates),
            text: Some(Value::String(text.into())),
            confidence: Some(Value::from(confidence)),
        }
    }

    /// An axis-aligned rectangle as a clockwise quadrilateral starting top-left.
    pub fn rectangle(left: f64, top: f64, width: f64, height: f64, text: impl Into<String>, confidence: f64) -> Self {
        let (right, bottom) = (left + width, top + height);
        Self::new(
            vec![[left, top], [right, top], [right, bottom], [left, bottom]],
            text,
            confidence,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    MissingCoordinates,
    MissingText,
    InvalidQuadrilateral,
    UncoercibleText,
    EmptyText,
}

/// Normalize raw detections for one page.
///
/// Retained blocks keep detector order. The returned result is tagged `ocr`
/// with a zero processing time; the caller stamps timing and dimensions.
pub fn normalize(page_number: usize, entries: Vec<DetectionEntry>) -> PageResult {
    let total = entries.len();
    let mut blocks = Vec::with_capacity(total);
    let mut dropped = 0usize;

    for (index, entry) in entries.into_iter().enumerate() {
        match to_block(entry) {
            Ok(block) => blocks.push(block),
            Err(DropReason::EmptyText) => {
                dropped += 1;
            }
            Err(reason) => {
                dropped += 1;
                tracing::warn!(page = page_number, index, ?reason, "Dropping malformed detection");
            }
        }
    }

    if dropped > 0 {
        tracing::debug!(page = page_number, total, dropped, "Detections dropped during normalization");
    }

    PageResult {
        page_number,
        text: combine_blocks(&blocks),
        confidence: average_confidence(&blocks),
        blocks,
        method: ExtractionMethod::Ocr,
        processing_time: Duration::ZERO,
        image_dimensions: None,
        dropped_detections: dropped,
    }
}

/// Newline join of block texts in order.
pub fn combine_blocks(blocks: &[TextBlock]) -> String {
    blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n")
}

/// Arithmetic mean of block confidences, 0.0 when there are none.
pub fn average_confidence(blocks: &[TextBlock]) -> f64 {
    if blocks.is_empty() {
        return 0.0;
    }
    blocks.iter().map(|b| b.confidence).sum::<f64>() / blocks.len() as f64
}

fn to_block(entry: DetectionEntry) -> Result<TextBlock, DropReason> {
    let coordinates = entry.coordinates.ok_or(DropReason::MissingCoordinates)?;
    let raw_text = entry.text.ok_or(DropReason::MissingText)?;

    let quad = to_quadrilateral(&coordinates).ok_or(DropReason::InvalidQuadrilateral)?;

    let (text, embedded_confidence) = coerce_text(raw_text).ok_or(DropReason::UncoercibleText)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(DropReason::EmptyText);
    }

    let confidence = entry
        .confidence
        .or(embedded_confidence)
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    Ok(TextBlock::new(text, confidence, quad))
}

fn to_quadrilateral(points: &[[f64; 2]]) -> Option<Quadrilateral> {
    let points: &[[f64; 2]; 4] = points.try_into().ok()?;
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return None;
    }
    Some(points.map(|[x, y]| Point::new(x, y)))
}

/// Coerce detector text to a string.
///
/// Some recognizers emit `[text, confidence]` pairs in the text slot; the
/// second element is returned so it can stand in for a missing confidence.
fn coerce_text(value: Value) -> Option<(String, Option<Value>)> {
    match value {
        Value::String(s) => Some((s, None)),
        Value::Number(n) => Some((n.to_string(), None)),
        Value::Bool(b) => Some((b.to_string(), None)),
        Value::Array(items) => {
            let mut items = items.into_iter();
            let text = match items.next()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((text, items.next()))
        }
        Value::Null | Value::Object(_) => None,
    }
}
