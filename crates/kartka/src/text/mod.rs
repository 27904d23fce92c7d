//! Text post-processing.

pub mod correction;

pub use correction::{CorrectionRule, correct, rules_for};
