pub mod cascade;
pub mod engine;
pub mod engines;
pub mod extract;
pub mod fixtures;
pub mod pixels;
pub mod preprocess;
pub mod segment;
pub mod setup;
pub mod topology;
pub mod tune;

pub use engine::{DigitReader, PageSegMode, TesseractReader};
pub use engines::{create_engine, MeterEngine};
pub use extract::Reading;
pub use setup::ensure_tesseract;

use anyhow::{Context, Result};
use image::{GrayImage, RgbaImage};
use std::fs;
use std::path::Path;

use crate::config::RecognitionConfig;
use crate::log;

/// High-level function: capture → reading string with the configured engine.
///
/// Fails only when the configured algorithm is unknown.
pub fn read_meter_from_image(
    raw: &RgbaImage,
    config: &RecognitionConfig,
    reader: Box<dyn DigitReader>,
) -> Result<String> {
    let engine = create_engine(config, reader)?;
    Ok(engine.read_meter(raw))
}

/// Loads a capture from disk and reads it.
///
/// With `debug_dir`, the engine's two preprocessed regions are saved there
/// as `<stem>_left.png` and `<stem>_right.png`. Engines without split
/// regions save nothing. Debug output never affects the reading.
pub fn read_meter_from_path(
    path: &Path,
    config: &RecognitionConfig,
    reader: Box<dyn DigitReader>,
    debug_dir: Option<&Path>,
) -> Result<String> {
    let raw = image::open(path)
        .context(format!("Failed to open image: {}", path.display()))?
        .to_rgba8();
    let engine = create_engine(config, reader)?;

    if let Some(dir) = debug_dir {
        match engine.debug_preprocessed_parts(&raw) {
            Some((left, right)) => match save_preprocessed_parts(&left, &right, path, dir) {
                Ok(()) => log(&format!("Saved preprocessed regions to {}", dir.display())),
                Err(e) => log(&format!("Debug dump failed: {}", e)),
            },
            None => log(&format!("Engine {} has no preprocessed regions to save", engine.name())),
        }
    }

    Ok(engine.read_meter(&raw))
}

fn save_preprocessed_parts(
    left: &GrayImage,
    right: &GrayImage,
    source: &Path,
    dir: &Path,
) -> Result<()> {
    fs::create_dir_all(dir).context(format!("Failed to create {}", dir.display()))?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "capture".to_string());

    left.save(dir.join(format!("{}_left.png", stem)))
        .context("Failed to save integer region")?;
    right
        .save(dir.join(format!("{}_right.png", stem)))
        .context("Failed to save decimal region")?;
    Ok(())
}
