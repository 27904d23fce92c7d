//! Per-document orchestration.
//!
//! [`DocumentPipeline::process`] drives one document through strategy
//! selection and, when needed, page-by-page OCR. Pages are processed
//! sequentially. Each page's rasterize, stage, recognize, normalize and
//! correct steps run as one blocking unit on tokio's blocking pool; the async
//! caller only suspends at that boundary.
//!
//! Staged rasters are owned by the page unit and removed when it returns, on
//! success, error or panic. If the caller drops the future mid-document, the
//! unit already dispatched still runs to completion and cleans up after itself.

use crate::backend::{DocumentBackend, ImageBackend};
use crate::core::config::PipelineConfig;
use crate::core::state::{ProcessingState, StateTracker};
use crate::core::strategy::{self, ExtractionDecision};
use crate::ocr::normalize::{combine_blocks, normalize};
use crate::ocr::{EnginePool, OcrEngine};
use crate::raster::{RasterStore, preprocess};
use crate::text::correction::{correct, rules_for};
use crate::types::{
    Document, DocumentFormat, DocumentMetadata, DocumentResult, ExtractionMethod, PageResult, PipelineStage,
};
use crate::{KartkaError, Result};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime - system may be out of resources")
});

/// Hybrid native/OCR text extraction for whole documents.
///
/// The engine pool is injected so several pipelines (or the rest of an
/// application) can share constructed engines.
///
/// # Example
///
/// ```rust,no_run
/// # #[cfg(feature = "ocr")]
/// # async fn example() -> kartka::Result<()> {
/// use kartka::core::config::PipelineConfig;
/// use kartka::core::pipeline::DocumentPipeline;
/// use kartka::ocr::{EnginePool, TesseractEngineFactory};
/// use kartka::types::Document;
/// use std::sync::Arc;
///
/// let pool = Arc::new(EnginePool::new(Arc::new(TesseractEngineFactory::new())));
/// let pipeline = DocumentPipeline::new(pool);
///
/// let document = Document::from_path("invoice.pdf")?;
/// let result = pipeline.process(&document, &PipelineConfig::default()).await?;
/// println!("{} via {}", result.combined_text(), result.method);
/// # Ok(())
/// # }
/// ```
pub struct DocumentPipeline {
    engines: Arc<EnginePool>,
    backends: HashMap<DocumentFormat, Arc<dyn DocumentBackend>>,
}

impl DocumentPipeline {
    /// Pipeline with the built-in backends: images always, PDFs when the
    /// `pdf` feature is on and a Pdfium library can be bound.
    pub fn new(engines: Arc<EnginePool>) -> Self {
        let pipeline = Self::without_backends(engines).with_backend(Arc::new(ImageBackend));

        #[cfg(feature = "pdf")]
        let pipeline = match crate::backend::PdfiumBackend::new() {
            Ok(backend) => pipeline.with_backend(Arc::new(backend)),
            Err(e) => {
                tracing::warn!(error = %e, "Pdfium unavailable, PDF documents will be rejected");
                pipeline
            }
        };

        pipeline
    }

    pub fn without_backends(engines: Arc<EnginePool>) -> Self {
        Self {
            engines,
            backends: HashMap::new(),
        }
    }

    /// Register (or replace) the backend for its format.
    pub fn with_backend(mut self, backend: Arc<dyn DocumentBackend>) -> Self {
        self.backends.insert(backend.format(), backend);
        self
    }

    pub fn engines(&self) -> &Arc<EnginePool> {
        &self.engines
    }

    pub fn backend(&self, format: DocumentFormat) -> Result<Arc<dyn DocumentBackend>> {
        self.backends
            .get(&format)
            .cloned()
            .ok_or_else(|| KartkaError::UnsupportedFormat(format!("no backend registered for {format} documents")))
    }

    /// Extract text from `document`.
    ///
    /// Fatal errors abort the whole document; no partial result is returned.
    #[tracing::instrument(skip(self, document, config), fields(document = document.id(), format = %document.format()))]
    pub async fn process(&self, document: &Document, config: &PipelineConfig) -> Result<DocumentResult> {
        let tracker = StateTracker::new(document.id());
        self.process_tracked(document, config, &tracker).await
    }

    /// [`process`](Self::process), recording state transitions into `tracker`.
    pub async fn process_tracked(
        &self,
        document: &Document,
        config: &PipelineConfig,
        tracker: &StateTracker,
    ) -> Result<DocumentResult> {
        let started = Instant::now();

        let backend = match config.validate().and_then(|_| self.backend(document.format())) {
            Ok(backend) => backend,
            Err(e) => {
                tracker.fail_at(PipelineStage::Loading, &e);
                return Err(e);
            }
        };

        match self.run(document, config, backend, tracker).await {
            Ok(mut result) => {
                result.processing_time = started.elapsed();
                tracker.advance(ProcessingState::Completed);
                tracing::info!(
                    document = document.id(),
                    method = %result.method,
                    pages = result.total_pages,
                    elapsed_ms = result.processing_time.as_millis() as u64,
                    "Document processed"
                );
                Ok(result)
            }
            Err(e) => {
                let failed = tracker.fail(&e);
                tracing::debug!(document = document.id(), state = ?failed, error = %e, "Document failed");
                Err(e)
            }
        }
    }

    /// Synchronous wrapper for [`process`](Self::process) over a shared runtime.
    ///
    /// Must not be called from inside an async context.
    pub fn process_sync(&self, document: &Document, config: &PipelineConfig) -> Result<DocumentResult> {
        GLOBAL_RUNTIME.block_on(self.process(document, config))
    }

    /// Descriptive metadata from the document's backend.
    pub async fn metadata(&self, document: &Document) -> Result<DocumentMetadata> {
        let backend = self.backend(document.format())?;
        let document = document.clone();
        tokio::task::spawn_blocking(move || backend.metadata(&document))
            .await
            .map_err(|e| KartkaError::Other(format!("Metadata task failed: {}", e)))?
    }

    async fn run(
        &self,
        document: &Document,
        config: &PipelineConfig,
        backend: Arc<dyn DocumentBackend>,
        tracker: &StateTracker,
    ) -> Result<DocumentResult> {
        let decision = {
            let document = document.clone();
            let backend = Arc::clone(&backend);
            let force_ocr = config.force_ocr;
            let span = tracing::Span::current();
            tokio::task::spawn_blocking(move || {
                let _guard = span.entered();
                strategy::select(&document, backend.as_ref(), force_ocr)
            })
            .await
            .map_err(|e| KartkaError::Other(format!("Native text task failed: {}", e)))??
        };
        tracker.advance(ProcessingState::NativeAttempted);

        match decision {
            ExtractionDecision::Native { texts } => {
                tracker.advance(ProcessingState::NativeAccepted);
                Ok(native_result(document, texts))
            }
            ExtractionDecision::Ocr { page_count, .. } => {
                tracker.advance(ProcessingState::OcrPending);
                self.run_ocr(document, config, backend, page_count, tracker).await
            }
        }
    }

    async fn run_ocr(
        &self,
        document: &Document,
        config: &PipelineConfig,
        backend: Arc<dyn DocumentBackend>,
        page_count: usize,
        tracker: &StateTracker,
    ) -> Result<DocumentResult> {
        let engine = {
            let engines = Arc::clone(&self.engines);
            let engine_config = config.ocr.clone();
            tokio::task::spawn_blocking(move || engines.get_engine(&engine_config))
                .await
                .map_err(|e| KartkaError::engine_initialization(format!("Engine construction task failed: {}", e)))??
        };

        let unit = PageUnit {
            document: document.clone(),
            backend,
            engine,
            store: RasterStore::new(config.resolved_temp_dir())?,
            config: config.clone(),
            tracker: tracker.clone(),
        };
        let unit = Arc::new(unit);

        let mut pages = Vec::with_capacity(page_count);
        for page_number in 1..=page_count {
            let unit = Arc::clone(&unit);
            let span = tracing::info_span!("page", page = page_number);
            let page = tokio::task::spawn_blocking(move || {
                let _guard = span.entered();
                unit.run(page_number)
            })
            .await
            .map_err(|e| KartkaError::recognition(page_number, format!("Page task failed: {}", e)))??;
            pages.push(page);
        }

        Ok(DocumentResult {
            document_id: document.id().to_string(),
            total_pages: pages.len(),
            pages,
            processing_time: Default::default(),
            method: ExtractionMethod::Ocr,
        })
    }
}

impl std::fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.backends.keys().map(|f| f.to_string()).collect();
        formats.sort();
        f.debug_struct("DocumentPipeline")
            .field("engines", &self.engines)
            .field("formats", &formats)
            .finish()
    }
}

fn native_result(document: &Document, texts: Vec<String>) -> DocumentResult {
    let pages: Vec<PageResult> = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageResult::native(i + 1, text))
        .collect();

    DocumentResult {
        document_id: document.id().to_string(),
        total_pages: pages.len(),
        pages,
        processing_time: Default::default(),
        method: ExtractionMethod::Native,
    }
}

/// Everything one page of OCR needs, owned so it can move to a worker thread.
struct PageUnit {
    document: Document,
    backend: Arc<dyn DocumentBackend>,
    engine: Arc<dyn OcrEngine>,
    store: RasterStore,
    config: PipelineConfig,
    tracker: StateTracker,
}

impl PageUnit {
    fn run(&self, page_number: usize) -> Result<PageResult> {
        let started = Instant::now();
        let options = &self.config.raster;

        self.tracker.advance(ProcessingState::Rasterizing { page: page_number });
        let raster = self
            .backend
            .rasterize(&self.document, page_number, options)
            .map_err(|e| as_page_render(page_number, e))?
            .fit_within(options.max_image_dimension);
        let raster = if options.preprocess {
            raster.map_image(preprocess)
        } else {
            raster
        };
        let dimensions = raster.dimensions();
        let staged = self.store.stage(raster)?;

        self.tracker.advance(ProcessingState::Recognizing { page: page_number });
        let detections = self
            .engine
            .recognize(&staged, self.config.ocr.angle_classification)
            .map_err(|e| as_recognition(page_number, e))?;
        drop(staged);

        self.tracker.advance(ProcessingState::Normalizing { page: page_number });
        let mut page = normalize(page_number, detections);
        if self.config.language_correction {
            apply_correction(&mut page, &self.config.ocr.language);
        }
        page.image_dimensions = Some(dimensions);
        page.processing_time = started.elapsed();

        tracing::debug!(
            page = page_number,
            blocks = page.blocks.len(),
            dropped = page.dropped_detections,
            confidence = page.confidence,
            elapsed_ms = page.processing_time.as_millis() as u64,
            "Page recognized"
        );
        Ok(page)
    }
}

fn as_page_render(page: usize, error: KartkaError) -> KartkaError {
    match error {
        KartkaError::PageRender { .. } | KartkaError::Io(_) => error,
        other => KartkaError::page_render_with_source(page, "rasterization failed", other),
    }
}

fn as_recognition(page: usize, error: KartkaError) -> KartkaError {
    match error {
        KartkaError::Recognition { .. } => error,
        other => KartkaError::recognition_with_source(page, "engine call failed", other),
    }
}

/// Correct each block, then the recombined page text.
fn apply_correction(page: &mut PageResult, language: &str) {
    if rules_for(language).is_none() {
        return;
    }

    for block in &mut page.blocks {
        let fixed = match correct(&block.text, language) {
            Cow::Owned(fixed) => fixed,
            Cow::Borrowed(_) => continue,
        };
        block.text = fixed;
    }

    let combined = combine_blocks(&page.blocks);
    page.text = correct(&combined, language).into_owned();
}
