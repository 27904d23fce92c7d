//! End-to-end pipeline tests over fake backends and engines.
//!
//! Covers routing (native vs. OCR), staged raster cleanup, failure
//! propagation, engine sharing and the Polish post-processor.

mod helpers;

use helpers::{FakeBackend, FakeEngineFactory, LONG_TEXT, PageScript, files_in, line, pdf_document, png_bytes};
use kartka::core::config::PipelineConfig;
use kartka::core::state::{ProcessingState, StateTracker};
use kartka::ocr::{DetectionEntry, EnginePool};
use kartka::types::{Document, DocumentFormat, ExtractionMethod, PipelineStage};
use kartka::{DocumentPipeline, KartkaError};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    factory: Arc<FakeEngineFactory>,
    backend: Arc<FakeBackend>,
    pipeline: DocumentPipeline,
    config: PipelineConfig,
    temp: TempDir,
}

impl Fixture {
    fn new(backend: FakeBackend, factory: FakeEngineFactory) -> Self {
        let factory = Arc::new(factory);
        let backend = Arc::new(backend);
        let pool = Arc::new(EnginePool::new(factory.clone()));
        let pipeline = DocumentPipeline::without_backends(pool).with_backend(backend.clone());

        let temp = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            temp_dir: Some(temp.path().join("rasters")),
            ..Default::default()
        };

        Self {
            factory,
            backend,
            pipeline,
            config,
            temp,
        }
    }

    fn staged_dir(&self) -> std::path::PathBuf {
        self.temp.path().join("rasters")
    }
}

#[tokio::test]
async fn test_one_short_page_sends_whole_document_to_ocr() {
    let fixture = Fixture::new(
        FakeBackend::with_texts(&[LONG_TEXT, LONG_TEXT, "Page 3"]),
        FakeEngineFactory::new(),
    );

    let result = fixture
        .pipeline
        .process(&pdf_document("mixed"), &fixture.config)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(result.total_pages, 3);
    assert!(result.pages.iter().all(|p| p.method == ExtractionMethod::Ocr));
    assert_eq!(
        result.pages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>(),
        vec!["page 1", "page 2", "page 3"]
    );
    assert_eq!(fixture.backend.rasterized_pages(), vec![1, 2, 3]);
    assert_eq!(fixture.factory.last_engine().unwrap().calls(), 3);
}

#[tokio::test]
async fn test_native_document_is_never_rasterized() {
    let fixture = Fixture::new(FakeBackend::with_texts(&[LONG_TEXT, LONG_TEXT]), FakeEngineFactory::new());

    let result = fixture
        .pipeline
        .process(&pdf_document("born-digital"), &fixture.config)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Native);
    assert_eq!(result.total_pages, 2);
    assert!(result.pages.iter().all(|p| p.confidence == 1.0 && p.blocks.is_empty()));
    assert_eq!(result.pages[0].text, LONG_TEXT);
    assert!(fixture.backend.rasterized_pages().is_empty());
    assert_eq!(fixture.factory.created(), 0);
    assert!(fixture.pipeline.engines().is_empty());
}

#[tokio::test]
async fn test_force_ocr_ignores_good_native_text() {
    let mut fixture = Fixture::new(FakeBackend::with_texts(&[LONG_TEXT, LONG_TEXT]), FakeEngineFactory::new());
    fixture.config.force_ocr = true;

    let result = fixture
        .pipeline
        .process(&pdf_document("forced"), &fixture.config)
        .await
        .unwrap();

    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(fixture.backend.rasterized_pages(), vec![1, 2]);
}

#[tokio::test]
async fn test_staged_rasters_exist_during_recognition_and_are_removed_after() {
    let fixture = Fixture::new(FakeBackend::with_texts(&["", ""]), FakeEngineFactory::new());

    fixture
        .pipeline
        .process(&pdf_document("scan"), &fixture.config)
        .await
        .unwrap();

    let seen = fixture.factory.last_engine().unwrap().seen_paths();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(_, existed)| *existed));
    assert!(seen.iter().all(|(path, _)| !path.exists()));
    assert!(files_in(&fixture.staged_dir()).is_empty());
}

#[tokio::test]
async fn test_recognition_failure_aborts_document_and_cleans_up() {
    let fixture = Fixture::new(
        FakeBackend::with_texts(&["", "", ""]),
        FakeEngineFactory::new().with_page(2, PageScript::Fail),
    );
    let document = pdf_document("broken");
    let tracker = StateTracker::new(document.id());

    let err = fixture
        .pipeline
        .process_tracked(&document, &fixture.config, &tracker)
        .await
        .unwrap_err();

    assert!(matches!(err, KartkaError::Recognition { page: 2, .. }));
    assert_eq!(fixture.backend.rasterized_pages(), vec![1, 2]);
    assert!(files_in(&fixture.staged_dir()).is_empty());
    assert_eq!(
        tracker.current(),
        ProcessingState::Failed {
            stage: PipelineStage::Recognizing,
            kind: "recognition",
        }
    );
}

#[tokio::test]
async fn test_render_failure_is_fatal() {
    let fixture = Fixture::new(
        FakeBackend::with_texts(&["", "", ""]).failing_render_on(2),
        FakeEngineFactory::new(),
    );
    let document = pdf_document("corrupt");
    let tracker = StateTracker::new(document.id());

    let err = fixture
        .pipeline
        .process_tracked(&document, &fixture.config, &tracker)
        .await
        .unwrap_err();

    assert!(matches!(err, KartkaError::PageRender { page: 2, .. }));
    assert_eq!(fixture.factory.last_engine().unwrap().calls(), 1);
    assert_eq!(
        tracker.current(),
        ProcessingState::Failed {
            stage: PipelineStage::Rasterizing,
            kind: "page_render",
        }
    );
}

#[tokio::test]
async fn test_engine_initialization_failure_is_not_cached() {
    let fixture = Fixture::new(FakeBackend::with_texts(&[""]), FakeEngineFactory::failing());

    for _ in 0..2 {
        let err = fixture
            .pipeline
            .process(&pdf_document("scan"), &fixture.config)
            .await
            .unwrap_err();
        assert!(matches!(err, KartkaError::EngineInitialization { .. }));
    }

    assert!(fixture.pipeline.engines().is_empty());
    assert!(fixture.backend.rasterized_pages().is_empty());
}

#[tokio::test]
async fn test_state_history_for_two_page_ocr() {
    let fixture = Fixture::new(FakeBackend::with_texts(&["", ""]), FakeEngineFactory::new());
    let document = pdf_document("scan");
    let tracker = StateTracker::new(document.id());

    fixture
        .pipeline
        .process_tracked(&document, &fixture.config, &tracker)
        .await
        .unwrap();

    use ProcessingState::*;
    assert_eq!(
        tracker.history(),
        vec![
            Loaded,
            NativeAttempted,
            OcrPending,
            Rasterizing { page: 1 },
            Recognizing { page: 1 },
            Normalizing { page: 1 },
            Rasterizing { page: 2 },
            Recognizing { page: 2 },
            Normalizing { page: 2 },
            Completed,
        ]
    );
}

#[tokio::test]
async fn test_malformed_detections_are_dropped_not_fatal() {
    let detections = vec![
        line("Faktura VAT", 0.9),
        DetectionEntry::default(),
        DetectionEntry::new(vec![[0.0, 0.0], [1.0, 0.0]], "two points", 0.9),
        line("   ", 0.9),
        line("NIP: 123", 0.7),
    ];
    let fixture = Fixture::new(
        FakeBackend::with_texts(&[""]),
        FakeEngineFactory::new().with_page(1, PageScript::Detections(detections)),
    );

    let result = fixture
        .pipeline
        .process(&pdf_document("scan"), &fixture.config)
        .await
        .unwrap();

    let page = &result.pages[0];
    assert_eq!(page.blocks.len(), 2);
    assert_eq!(page.dropped_detections, 3);
    assert_eq!(page.text, "Faktura VAT\nNIP: 123");
    assert!((page.confidence - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_polish_correction_applied_when_enabled() {
    let detections = vec![line("Wartosc  brutto", 0.9), line("Razem 100zl", 0.8)];
    let mut fixture = Fixture::new(
        FakeBackend::with_texts(&[""]),
        FakeEngineFactory::new().with_page(1, PageScript::Detections(detections)),
    );
    fixture.config.ocr.language = "pl".to_string();
    fixture.config.language_correction = true;

    let result = fixture
        .pipeline
        .process(&pdf_document("faktura"), &fixture.config)
        .await
        .unwrap();

    let page = &result.pages[0];
    assert_eq!(page.text, "Wartość brutto\nRazem 100 zł");
    assert_eq!(page.blocks[0].text, "Wartość brutto");
    assert!((page.confidence - 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn test_correction_disabled_leaves_text_untouched() {
    let detections = vec![line("Razem 100zl", 0.8)];
    let mut fixture = Fixture::new(
        FakeBackend::with_texts(&[""]),
        FakeEngineFactory::new().with_page(1, PageScript::Detections(detections)),
    );
    fixture.config.ocr.language = "pl".to_string();

    let result = fixture
        .pipeline
        .process(&pdf_document("faktura"), &fixture.config)
        .await
        .unwrap();

    assert_eq!(result.pages[0].text, "Razem 100zl");
}

#[tokio::test]
async fn test_angle_classification_flag_reaches_engine() {
    let mut fixture = Fixture::new(FakeBackend::with_texts(&["", ""]), FakeEngineFactory::new());
    fixture.config.ocr.angle_classification = false;

    fixture
        .pipeline
        .process(&pdf_document("scan"), &fixture.config)
        .await
        .unwrap();

    assert_eq!(fixture.factory.last_engine().unwrap().angle_flags(), vec![false, false]);
}

#[tokio::test]
async fn test_invalid_config_rejected_before_any_work() {
    let mut fixture = Fixture::new(FakeBackend::with_texts(&[""]), FakeEngineFactory::new());
    fixture.config.raster.zoom = 0.0;
    let document = pdf_document("scan");
    let tracker = StateTracker::new(document.id());

    let err = fixture
        .pipeline
        .process_tracked(&document, &fixture.config, &tracker)
        .await
        .unwrap_err();

    assert!(matches!(err, KartkaError::Validation { .. }));
    assert_eq!(fixture.factory.created(), 0);
    assert_eq!(
        tracker.current(),
        ProcessingState::Failed {
            stage: PipelineStage::Loading,
            kind: "validation",
        }
    );
}

#[tokio::test]
async fn test_unregistered_format_is_unsupported() {
    let pool = Arc::new(EnginePool::new(Arc::new(FakeEngineFactory::new())));
    let pipeline = DocumentPipeline::without_backends(pool);

    let err = pipeline
        .process(&pdf_document("scan"), &PipelineConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, KartkaError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn test_image_document_goes_through_ocr() {
    let factory = Arc::new(FakeEngineFactory::new());
    let pool = Arc::new(EnginePool::new(factory.clone()));
    let pipeline = DocumentPipeline::new(pool);
    let temp = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        temp_dir: Some(temp.path().to_path_buf()),
        ..Default::default()
    };

    let document = Document::from_bytes("receipt", png_bytes(64, 32), DocumentFormat::Image);
    let result = pipeline.process(&document, &config).await.unwrap();

    assert_eq!(result.method, ExtractionMethod::Ocr);
    assert_eq!(result.total_pages, 1);
    let dimensions = result.pages[0].image_dimensions.unwrap();
    assert_eq!((dimensions.width, dimensions.height), (64, 32));
    assert_eq!(result.pages[0].text, "page 1");
    assert!(files_in(temp.path()).is_empty());
}

#[tokio::test]
async fn test_metadata_comes_from_backend() {
    let fixture = Fixture::new(FakeBackend::with_texts(&[LONG_TEXT, ""]), FakeEngineFactory::new());

    let metadata = fixture.pipeline.metadata(&pdf_document("doc")).await.unwrap();
    assert_eq!(metadata.page_count, 2);
    assert_eq!(metadata.title.as_deref(), Some("Fake"));
}

#[test]
fn test_process_sync_outside_runtime() {
    let fixture = Fixture::new(FakeBackend::with_texts(&[LONG_TEXT]), FakeEngineFactory::new());

    let result = fixture
        .pipeline
        .process_sync(&pdf_document("sync"), &fixture.config)
        .unwrap();
    assert_eq!(result.method, ExtractionMethod::Native);
}

#[tokio::test]
async fn test_document_result_serializes_for_callers() {
    let fixture = Fixture::new(FakeBackend::with_texts(&[""]), FakeEngineFactory::new());

    let result = fixture
        .pipeline
        .process(&pdf_document("scan"), &fixture.config)
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["method"], "ocr");
    assert_eq!(json["pages"][0]["page_number"], 1);
    assert_eq!(json["pages"][0]["blocks"][0]["text"], "page 1");
}
