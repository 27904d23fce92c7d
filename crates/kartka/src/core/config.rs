//! Configuration loading and management.
//!
//! [`PipelineConfig`] can be loaded from TOML, YAML or JSON files, discovered by
//! walking up from the current directory, or built programmatically. Every field
//! has a default, so partial files are fine.

use crate::{KartkaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "kartka.toml";

pub const ENV_OCR_LANGUAGE: &str = "KARTKA_OCR_LANGUAGE";
pub const ENV_OCR_USE_GPU: &str = "KARTKA_OCR_USE_GPU";
pub const ENV_TEMP_DIR: &str = "KARTKA_TEMP_DIR";

/// Points per inch in PDF user space; zoom 1.0 renders at this resolution.
pub const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Main pipeline configuration.
///
/// # Example
///
/// ```rust
/// use kartka::core::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.ocr.language, "en");
/// assert_eq!(config.raster.zoom, 2.0);
///
/// // let config = PipelineConfig::from_toml_file("kartka.toml")?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// OCR engine construction parameters
    #[serde(default)]
    pub ocr: EngineConfig,

    /// Page rendering options
    #[serde(default)]
    pub raster: RasterOptions,

    /// Skip the native text attempt and OCR every page
    #[serde(default)]
    pub force_ocr: bool,

    /// Run the language post-processor for `ocr.language`
    #[serde(default)]
    pub language_correction: bool,

    /// Directory for transient page rasters (None = `<system temp>/kartka`)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr: EngineConfig::default(),
            raster: RasterOptions::default(),
            force_ocr: false,
            language_correction: false,
            temp_dir: None,
        }
    }
}

/// OCR engine configuration.
///
/// Only `(language, angle_classification, use_gpu)` identify a cached engine;
/// see [`EngineConfig::cache_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_true")]
    pub angle_classification: bool,

    #[serde(default)]
    pub use_gpu: bool,

    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,

    #[serde(default = "default_box_threshold")]
    pub box_threshold: f64,

    #[serde(default = "default_unclip_ratio")]
    pub unclip_ratio: f64,

    #[serde(default = "default_recognition_batch_size")]
    pub recognition_batch_size: usize,

    /// Custom character dictionary / word list
    #[serde(default)]
    pub dictionary_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            angle_classification: true,
            use_gpu: false,
            detection_threshold: default_detection_threshold(),
            box_threshold: default_box_threshold(),
            unclip_ratio: default_unclip_ratio(),
            recognition_batch_size: default_recognition_batch_size(),
            dictionary_path: None,
        }
    }
}

/// Identity of a cached engine instance.
///
/// Thresholds, batch size and dictionary are construction parameters only: two
/// configs that differ just in those share whichever engine was built first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineCacheKey {
    pub language: String,
    pub angle_classification: bool,
    pub use_gpu: bool,
}

impl std::fmt::Display for EngineCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.language, self.angle_classification, self.use_gpu)
    }
}

impl EngineConfig {
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn cache_key(&self) -> EngineCacheKey {
        EngineCacheKey {
            language: self.language.clone(),
            angle_classification: self.angle_classification,
            use_gpu: self.use_gpu,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(KartkaError::validation("ocr.language must not be empty"));
        }
        for (name, value) in [
            ("ocr.detection_threshold", self.detection_threshold),
            ("ocr.box_threshold", self.box_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(KartkaError::validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(self.unclip_ratio.is_finite() && self.unclip_ratio > 0.0) {
            return Err(KartkaError::validation(format!(
                "ocr.unclip_ratio must be positive, got {}",
                self.unclip_ratio
            )));
        }
        if self.recognition_batch_size == 0 {
            return Err(KartkaError::validation("ocr.recognition_batch_size must be at least 1"));
        }
        Ok(())
    }
}

/// Page rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterOptions {
    /// Scale relative to the page's native size (2.0 ≈ 144 DPI for PDFs)
    #[serde(default = "default_zoom")]
    pub zoom: f32,

    /// Longest allowed raster edge in pixels; larger renders are scaled down
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    /// Grayscale, contrast stretch and binarize before recognition
    #[serde(default)]
    pub preprocess: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            max_image_dimension: default_max_image_dimension(),
            preprocess: false,
        }
    }
}

impl RasterOptions {
    /// Options rendering PDF pages at the given resolution.
    pub fn from_dpi(dpi: u32) -> Self {
        Self {
            zoom: dpi as f32 / PDF_POINTS_PER_INCH,
            ..Self::default()
        }
    }

    pub fn effective_dpi(&self) -> f32 {
        self.zoom * PDF_POINTS_PER_INCH
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            return Err(KartkaError::validation(format!(
                "raster.zoom must be positive, got {}",
                self.zoom
            )));
        }
        if self.max_image_dimension == 0 {
            return Err(KartkaError::validation("raster.max_image_dimension must be at least 1"));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

fn default_detection_threshold() -> f64 {
    0.3
}

fn default_box_threshold() -> f64 {
    0.5
}

fn default_unclip_ratio() -> f64 {
    1.6
}

fn default_recognition_batch_size() -> usize {
    6
}

fn default_zoom() -> f32 {
    2.0
}

fn default_max_image_dimension() -> u32 {
    8192
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| KartkaError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| KartkaError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| KartkaError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration, picking the parser from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Self::from_toml_file(path),
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(KartkaError::validation(format!(
                "Unsupported config file format: {} (expected .toml, .yaml, .yml or .json)",
                path.display()
            ))),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `kartka.toml` in the current directory and its ancestors.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let current = std::env::current_dir().map_err(KartkaError::Io)?;
        Self::discover_from(&current)
    }

    /// Same as [`discover`](Self::discover), starting from `start`.
    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        let mut current = Some(start);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }
            current = dir.parent();
        }

        Ok(None)
    }

    /// Apply `KARTKA_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(language) = lookup(ENV_OCR_LANGUAGE).filter(|v| !v.trim().is_empty()) {
            self.ocr.language = language.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_OCR_USE_GPU) {
            self.ocr.use_gpu = parse_bool(&raw).ok_or_else(|| {
                KartkaError::validation(format!("{ENV_OCR_USE_GPU} must be a boolean, got '{raw}'"))
            })?;
        }

        if let Some(dir) = lookup(ENV_TEMP_DIR).filter(|v| !v.trim().is_empty()) {
            self.temp_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.ocr.validate()?;
        self.raster.validate()
    }

    /// Directory rasters are staged in.
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("kartka"))
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| KartkaError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
