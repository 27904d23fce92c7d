//! Tesseract TSV output to line-level detections.
//!
//! TSV rows are one per layout element; only word rows (level 5) carry text.
//! Words sharing `(page, block, paragraph, line)` are merged into one
//! [`DetectionEntry`] spanning their union rectangle, in first-seen order.

use super::normalize::DetectionEntry;

pub const TSV_WORD_LEVEL: u32 = 5;
pub const TSV_MIN_FIELDS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LineId {
    page: u32,
    block: u32,
    paragraph: u32,
    line: u32,
}

#[derive(Debug)]
struct LineAccumulator {
    id: LineId,
    words: Vec<String>,
    confidence_sum: f64,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl LineAccumulator {
    fn new(id: LineId) -> Self {
        Self {
            id,
            words: Vec::new(),
            confidence_sum: 0.0,
            left: f64::INFINITY,
            top: f64::INFINITY,
            right: f64::NEG_INFINITY,
            bottom: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, text: &str, confidence: f64, left: f64, top: f64, width: f64, height: f64) {
        self.words.push(text.to_string());
        self.confidence_sum += confidence;
        self.left = self.left.min(left);
        self.top = self.top.min(top);
        self.right = self.right.max(left + width);
        self.bottom = self.bottom.max(top + height);
    }

    fn into_detection(self) -> DetectionEntry {
        let confidence = self.confidence_sum / self.words.len() as f64 / 100.0;
        DetectionEntry::rectangle(
            self.left,
            self.top,
            self.right - self.left,
            self.bottom - self.top,
            self.words.join(" "),
            confidence,
        )
    }
}

/// Group TSV words into line detections, skipping words below `min_confidence` (0-100).
pub fn lines_from_tsv(tsv: &str, min_confidence: f64) -> Vec<DetectionEntry> {
    let mut lines: Vec<LineAccumulator> = Vec::new();

    for (line_num, row) in tsv.lines().enumerate() {
        if line_num == 0 {
            continue;
        }

        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let level = fields[0].trim().parse::<u32>().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let confidence = fields[10].trim().parse::<f64>().unwrap_or(-1.0);
        if !confidence.is_finite() || confidence < 0.0 || confidence < min_confidence {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let number = |i: usize| fields[i].trim().parse::<u32>().unwrap_or(0);
        let id = LineId {
            page: number(1),
            block: number(2),
            paragraph: number(3),
            line: number(4),
        };
        let coordinate = |i: usize| fields[i].trim().parse::<f64>().unwrap_or(0.0);

        let index = match lines.iter().position(|l| l.id == id) {
            Some(index) => index,
            None => {
                lines.push(LineAccumulator::new(id));
                lines.len() - 1
            }
        };
        lines[index].push(
            text,
            confidence,
            coordinate(6),
            coordinate(7),
            coordinate(8),
            coordinate(9),
        );
    }

    lines.into_iter().map(LineAccumulator::into_detection).collect()
}
