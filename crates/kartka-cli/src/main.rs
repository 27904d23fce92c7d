//! `kartka` command-line front end.
//!
//! Runs one document through the extraction pipeline and prints the result as
//! JSON on stdout. Logs go to stderr and are filtered with `RUST_LOG`.

use anyhow::{Context, Result};
use clap::Parser;
use kartka::ocr::TesseractEngineFactory;
use kartka::{Document, DocumentPipeline, EnginePool, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Extract text from a PDF or image, using OCR only when the embedded text is not enough.
#[derive(Parser, Debug)]
#[command(name = "kartka", version, about)]
struct Args {
    /// Document to process
    file: PathBuf,

    /// Configuration file (.toml, .yaml or .json); defaults to the nearest kartka.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OCR language code (en, pl, de, ...)
    #[arg(short, long)]
    language: Option<String>,

    /// Skip native text and OCR every page
    #[arg(long)]
    force_ocr: bool,

    /// Apply language-specific corrections to OCR text
    #[arg(long)]
    correct: bool,

    /// Render zoom factor relative to 72 DPI
    #[arg(long)]
    zoom: Option<f32>,

    /// Grayscale and binarize pages before recognition
    #[arg(long)]
    preprocess: bool,

    /// Print document metadata instead of extracting text
    #[arg(long)]
    metadata: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let document = Document::from_path(&args.file).with_context(|| format!("Failed to load {}", args.file.display()))?;
    let pool = Arc::new(EnginePool::new(Arc::new(TesseractEngineFactory::new())));
    let pipeline = DocumentPipeline::new(pool);

    let output = if args.metadata {
        let metadata = pipeline.metadata(&document).await?;
        to_json(&metadata, args.pretty)?
    } else {
        let result = pipeline
            .process(&document, &config)
            .await
            .with_context(|| format!("Failed to process {}", args.file.display()))?;
        to_json(&result, args.pretty)?
    };

    println!("{output}");
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::discover()?.unwrap_or_default(),
    };
    config.apply_env_overrides()?;
    apply_args(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_args(config: &mut PipelineConfig, args: &Args) {
    if let Some(language) = &args.language {
        config.ocr.language = language.clone();
    }
    if let Some(zoom) = args.zoom {
        config.raster.zoom = zoom;
    }
    config.force_ocr |= args.force_ocr;
    config.language_correction |= args.correct;
    config.raster.preprocess |= args.preprocess;
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
