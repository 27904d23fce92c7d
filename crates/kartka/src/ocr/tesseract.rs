//! Tesseract-backed engine.
//!
//! Maps [`EngineConfig`] onto Tesseract:
//!
//! - `language` goes through [`tesseract_language`]; each traineddata file is
//!   checked up front because a missing one can crash the native library.
//! - `angle_classification` selects page segmentation mode 1 (auto with
//!   orientation and script detection) instead of 3 (fully automatic).
//! - `dictionary_path` is read as a character dictionary and becomes the
//!   recognition whitelist.
//! - `detection_threshold` is the minimum word confidence kept.
//! - `use_gpu`, `box_threshold`, `unclip_ratio` and `recognition_batch_size`
//!   have no Tesseract counterpart and are ignored.

use super::engine::{EngineFactory, OcrEngine};
use super::language::tesseract_language;
use super::normalize::DetectionEntry;
use super::tsv::lines_from_tsv;
use crate::core::config::EngineConfig;
use crate::raster::StagedRaster;
use crate::{KartkaError, Result};
use kreuzberg_tesseract::TesseractAPI;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PSM_AUTO_OSD: &str = "1";
const PSM_AUTO: &str = "3";

const FALLBACK_TESSDATA_PATHS: &[&str] = &[
    "/opt/homebrew/share/tessdata",
    "/opt/homebrew/opt/tesseract/share/tessdata",
    "/usr/local/opt/tesseract/share/tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    r#"C:\Program Files\Tesseract-OCR\tessdata"#,
    r#"C:\ProgramData\Tesseract-OCR\tessdata"#,
];

/// Builds [`TesseractEngine`]s.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngineFactory {
    tessdata_dir: Option<PathBuf>,
}

impl TesseractEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit tessdata directory instead of `TESSDATA_PREFIX` / well-known paths.
    pub fn with_tessdata_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            tessdata_dir: Some(dir.into()),
        }
    }

    fn resolve_tessdata(&self) -> Option<PathBuf> {
        self.tessdata_dir
            .clone()
            .or_else(|| env::var("TESSDATA_PREFIX").ok().map(PathBuf::from))
            .or_else(|| {
                FALLBACK_TESSDATA_PATHS
                    .iter()
                    .map(Path::new)
                    .find(|p| p.exists())
                    .map(Path::to_path_buf)
            })
    }
}

impl EngineFactory for TesseractEngineFactory {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn OcrEngine>> {
        let language = tesseract_language(&config.language);
        if language.is_empty() {
            return Err(KartkaError::engine_initialization(
                "Language cannot be empty. Please specify a valid language code (e.g., 'en')",
            ));
        }

        let tessdata = self.resolve_tessdata().unwrap_or_default();

        if !tessdata.as_os_str().is_empty() {
            for lang in language.split('+') {
                let traineddata = tessdata.join(format!("{lang}.traineddata"));
                if !traineddata.exists() {
                    return Err(KartkaError::engine_initialization(format!(
                        "Language '{}' not found. Traineddata file does not exist: {}",
                        lang,
                        traineddata.display()
                    )));
                }
            }
        }

        let whitelist = config.dictionary_path.as_deref().map(load_character_dictionary).transpose()?;

        if config.use_gpu {
            tracing::warn!(language = %config.language, "GPU requested but Tesseract runs on CPU only");
        }

        let api = TesseractAPI::new();
        api.init(&tessdata.to_string_lossy(), &language).map_err(|e| {
            KartkaError::engine_initialization(format!("Failed to initialize language '{}': {}", language, e))
        })?;

        if let Some(whitelist) = &whitelist {
            api.set_variable("tessedit_char_whitelist", whitelist).map_err(|e| {
                KartkaError::engine_initialization(format!("Failed to set character dictionary: {}", e))
            })?;
        }

        let available = api.get_available_languages().unwrap_or_default();

        tracing::debug!(
            language = %language,
            tessdata = %tessdata.display(),
            min_word_confidence = config.detection_threshold * 100.0,
            "Tesseract engine ready"
        );

        Ok(Arc::new(TesseractEngine {
            api: Mutex::new(api),
            min_word_confidence: config.detection_threshold * 100.0,
            available_languages: available,
        }))
    }
}

/// Read a one-entry-per-line character dictionary into a whitelist string.
fn load_character_dictionary(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        KartkaError::engine_initialization_with_source(
            format!("Cannot read character dictionary {}", path.display()),
            e,
        )
    })?;

    let characters: BTreeSet<char> = content
        .lines()
        .flat_map(str::chars)
        .filter(|c| !c.is_control())
        .collect();

    if characters.is_empty() {
        return Err(KartkaError::engine_initialization(format!(
            "Character dictionary {} is empty",
            path.display()
        )));
    }

    Ok(characters.into_iter().collect())
}

/// One initialized Tesseract instance. Calls are serialized through a mutex
/// because image and recognition state live inside the native handle.
pub struct TesseractEngine {
    api: Mutex<TesseractAPI>,
    min_word_confidence: f64,
    available_languages: Vec<String>,
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, raster: &StagedRaster, angle_classification: bool) -> Result<Vec<DetectionEntry>> {
        let page = raster.page_number();
        let image = raster.raster();
        let (width, height) = (image.width() as i32, image.height() as i32);

        let api = self.api.lock();

        let psm = if angle_classification { PSM_AUTO_OSD } else { PSM_AUTO };
        api.set_variable("tessedit_pageseg_mode", psm)
            .map_err(|e| KartkaError::recognition(page, format!("Failed to set page segmentation mode: {}", e)))?;

        api.set_image(image.as_rgb_bytes(), width, height, 3, 3 * width)
            .map_err(|e| KartkaError::recognition(page, format!("Failed to set image: {}", e)))?;

        api.recognize()
            .map_err(|e| KartkaError::recognition(page, format!("Failed to recognize text: {}", e)))?;

        let tsv = api
            .get_tsv_text(0)
            .map_err(|e| KartkaError::recognition(page, format!("Failed to extract TSV: {}", e)))?;

        Ok(lines_from_tsv(&tsv, self.min_word_confidence))
    }

    fn supported_languages(&self) -> Vec<String> {
        self.available_languages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_character_dictionary_becomes_whitelist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dict.txt");
        std::fs::write(&path, "a\nb\nł\nb\n0\n").unwrap();

        let whitelist = load_character_dictionary(&path).unwrap();
        assert_eq!(whitelist, "0abł");
    }

    #[test]
    fn test_missing_dictionary_is_initialization_error() {
        let err = load_character_dictionary(Path::new("/nonexistent/kartka/dict.txt")).unwrap_err();
        assert!(matches!(err, KartkaError::EngineInitialization { .. }));
    }

    #[test]
    fn test_missing_traineddata_is_initialization_error() {
        let dir = tempdir().unwrap();
        let factory = TesseractEngineFactory::with_tessdata_dir(dir.path());

        let err = match factory.create(&EngineConfig::with_language("pl")) {
            Err(e) => e,
            Ok(_) => panic!("engine should not initialize without traineddata"),
        };
        assert!(matches!(err, KartkaError::EngineInitialization { .. }));
        assert!(err.to_string().contains("pol.traineddata"));
    }
}
