//! Per-document processing state.
//!
//! ```text
//! Loaded -> NativeAttempted -> NativeAccepted ------------------------> Completed
//!                           \-> OcrPending -> (Rasterizing -> Recognizing -> Normalizing)* -> Completed
//! any non-terminal state -> Failed { stage, kind }
//! ```
//!
//! `Completed` and `Failed` are terminal. Nothing is retried.

use crate::KartkaError;
use crate::types::PipelineStage;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ProcessingState {
    Loaded,
    NativeAttempted,
    NativeAccepted,
    OcrPending,
    Rasterizing { page: usize },
    Recognizing { page: usize },
    Normalizing { page: usize },
    Completed,
    Failed { stage: PipelineStage, kind: &'static str },
}

impl ProcessingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingState::Completed | ProcessingState::Failed { .. })
    }

    /// Stage of work performed while in this state.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ProcessingState::Loaded | ProcessingState::NativeAttempted | ProcessingState::NativeAccepted => {
                Some(PipelineStage::NativeAttempt)
            }
            ProcessingState::OcrPending => Some(PipelineStage::Recognizing),
            ProcessingState::Rasterizing { .. } => Some(PipelineStage::Rasterizing),
            ProcessingState::Recognizing { .. } => Some(PipelineStage::Recognizing),
            ProcessingState::Normalizing { .. } => Some(PipelineStage::Normalizing),
            ProcessingState::Completed | ProcessingState::Failed { .. } => None,
        }
    }

    pub fn can_transition_to(&self, next: &ProcessingState) -> bool {
        use ProcessingState::*;

        if matches!(next, Failed { .. }) {
            return !self.is_terminal();
        }

        match (self, next) {
            (Loaded, NativeAttempted) => true,
            (NativeAttempted, NativeAccepted | OcrPending) => true,
            (NativeAccepted, Completed) => true,
            (OcrPending, Rasterizing { page: 1 } | Completed) => true,
            (Rasterizing { page: a }, Recognizing { page: b }) => a == b,
            (Recognizing { page: a }, Normalizing { page: b }) => a == b,
            (Normalizing { page: a }, Rasterizing { page: b }) => *b == a + 1,
            (Normalizing { .. }, Completed) => true,
            _ => false,
        }
    }
}

/// Records the state history of one document. Clones share the same history,
/// so page workers on other threads can advance it.
#[derive(Debug, Clone)]
pub struct StateTracker {
    document_id: Arc<str>,
    history: Arc<Mutex<Vec<ProcessingState>>>,
}

impl StateTracker {
    pub fn new(document_id: &str) -> Self {
        tracing::debug!(document = document_id, state = ?ProcessingState::Loaded, "Document state");
        Self {
            document_id: Arc::from(document_id),
            history: Arc::new(Mutex::new(vec![ProcessingState::Loaded])),
        }
    }

    pub fn current(&self) -> ProcessingState {
        self.history
            .lock()
            .last()
            .cloned()
            .unwrap_or(ProcessingState::Loaded)
    }

    pub fn history(&self) -> Vec<ProcessingState> {
        self.history.lock().clone()
    }

    pub fn advance(&self, next: ProcessingState) {
        let mut history = self.history.lock();
        let legal = history.last().is_none_or(|current| current.can_transition_to(&next));
        debug_assert!(legal, "illegal transition {:?} -> {:?}", history.last(), next);
        if !legal {
            tracing::warn!(document = %self.document_id, from = ?history.last(), to = ?next, "Unexpected state transition");
        }
        tracing::debug!(document = %self.document_id, state = ?next, "Document state");
        history.push(next);
    }

    /// Move to `Failed`, attributing the error to its own stage when it has
    /// one and to the current state's stage otherwise.
    pub fn fail(&self, error: &KartkaError) -> ProcessingState {
        let stage = error
            .stage()
            .or_else(|| self.current().stage())
            .unwrap_or(PipelineStage::Loading);
        self.fail_at(stage, error)
    }

    /// Move to `Failed` with an explicit stage.
    pub fn fail_at(&self, stage: PipelineStage, error: &KartkaError) -> ProcessingState {
        let current = self.current();
        if current.is_terminal() {
            return current;
        }

        let failed = ProcessingState::Failed {
            stage,
            kind: error.kind(),
        };
        self.advance(failed.clone());
        failed
    }
}
