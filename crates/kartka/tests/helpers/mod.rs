//! Shared fakes for integration tests.
//!
//! None of these need pdfium or tesseract: [`FakeBackend`] serves canned page
//! texts and solid-color rasters, and [`FakeEngineFactory`] builds engines
//! that return canned detections per page.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use kartka::core::config::{EngineConfig, RasterOptions};
use kartka::ocr::{DetectionEntry, EngineFactory, OcrEngine};
use kartka::raster::{RasterImage, StagedRaster};
use kartka::types::{Document, DocumentFormat, DocumentMetadata};
use kartka::{KartkaError, Result};
use kartka::backend::DocumentBackend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A page text comfortably above the native threshold.
pub const LONG_TEXT: &str = "Invoice 2024/117 issued to ACME Ltd for consulting services rendered in March.";

/// Backend with per-page native text and 40x20 rasters.
pub struct FakeBackend {
    texts: Vec<String>,
    fail_render_on: Option<usize>,
    rasterized: Mutex<Vec<usize>>,
}

impl FakeBackend {
    pub fn with_texts(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            fail_render_on: None,
            rasterized: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_render_on(mut self, page: usize) -> Self {
        self.fail_render_on = Some(page);
        self
    }

    pub fn rasterized_pages(&self) -> Vec<usize> {
        self.rasterized.lock().clone()
    }
}

impl DocumentBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn page_count(&self, _document: &Document) -> Result<usize> {
        Ok(self.texts.len())
    }

    fn native_text(&self, _document: &Document) -> Result<Vec<String>> {
        Ok(self.texts.clone())
    }

    fn rasterize(&self, _document: &Document, page_number: usize, _options: &RasterOptions) -> Result<RasterImage> {
        self.rasterized.lock().push(page_number);

        if page_number == 0 || page_number > self.texts.len() {
            return Err(KartkaError::page_render(page_number, "page out of range"));
        }
        if self.fail_render_on == Some(page_number) {
            return Err(KartkaError::page_render(page_number, "corrupt content stream"));
        }

        RasterImage::new(page_number, RgbImage::from_pixel(40, 20, Rgb([255, 255, 255])))
    }

    fn metadata(&self, document: &Document) -> Result<DocumentMetadata> {
        Ok(DocumentMetadata {
            format: Some(DocumentFormat::Pdf),
            page_count: self.texts.len(),
            size_bytes: document.size_bytes(),
            title: Some("Fake".to_string()),
            ..Default::default()
        })
    }
}

/// What a [`FakeEngine`] does for a given page.
#[derive(Clone)]
pub enum PageScript {
    Detections(Vec<DetectionEntry>),
    Fail,
}

/// Engine returning scripted detections and recording the staged files it saw.
pub struct FakeEngine {
    scripts: HashMap<usize, PageScript>,
    calls: AtomicUsize,
    seen_paths: Mutex<Vec<(PathBuf, bool)>>,
    angle_flags: Mutex<Vec<bool>>,
}

impl FakeEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Staged raster paths passed to `recognize`, with whether the file existed at the time.
    pub fn seen_paths(&self) -> Vec<(PathBuf, bool)> {
        self.seen_paths.lock().clone()
    }

    pub fn angle_flags(&self) -> Vec<bool> {
        self.angle_flags.lock().clone()
    }
}

impl OcrEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake-ocr"
    }

    fn recognize(&self, raster: &StagedRaster, angle_classification: bool) -> Result<Vec<DetectionEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths
            .lock()
            .push((raster.path().to_path_buf(), raster.path().exists()));
        self.angle_flags.lock().push(angle_classification);

        match self.scripts.get(&raster.page_number()) {
            Some(PageScript::Detections(entries)) => Ok(entries.clone()),
            Some(PageScript::Fail) => Err(KartkaError::recognition(raster.page_number(), "inference failed")),
            None => Ok(vec![line(&format!("page {}", raster.page_number()), 0.9)]),
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["en".to_string(), "pl".to_string()]
    }
}

/// Factory handing out [`FakeEngine`]s; counts constructions.
#[derive(Default)]
pub struct FakeEngineFactory {
    scripts: HashMap<usize, PageScript>,
    created: AtomicUsize,
    fail_construction: bool,
    last_engine: Mutex<Option<Arc<FakeEngine>>>,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: usize, script: PageScript) -> Self {
        self.scripts.insert(page, script);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_construction: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn last_engine(&self) -> Option<Arc<FakeEngine>> {
        self.last_engine.lock().clone()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn name(&self) -> &str {
        "fake-factory"
    }

    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>> {
        if self.fail_construction {
            return Err(KartkaError::engine_initialization(format!(
                "no model for language '{}'",
                config.language
            )));
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        let engine = Arc::new(FakeEngine {
            scripts: self.scripts.clone(),
            calls: AtomicUsize::new(0),
            seen_paths: Mutex::new(Vec::new()),
            angle_flags: Mutex::new(Vec::new()),
        });
        *self.last_engine.lock() = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

/// A well-formed line detection at the top-left of the page.
pub fn line(text: &str, confidence: f64) -> DetectionEntry {
    DetectionEntry::new(vec![[0.0, 0.0], [30.0, 0.0], [30.0, 8.0], [0.0, 8.0]], text, confidence)
}

pub fn pdf_document(id: &str) -> Document {
    Document::from_bytes(id, b"%PDF-1.7 fake".to_vec(), DocumentFormat::Pdf)
}

/// A PNG-encoded white image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Files currently present in `dir`.
pub fn files_in(dir: &std::path::Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
