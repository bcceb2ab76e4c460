//! Interchangeable recognition strategies behind one trait.

mod primary;
mod simple;
mod split_digits;

pub use primary::CascadeEngine;
pub use simple::SimpleEngine;
pub use split_digits::SplitDigitsEngine;

use anyhow::Result;
use image::{GrayImage, RgbaImage};

use super::engine::DigitReader;
use crate::config::{Algorithm, RecognitionConfig};
use crate::log;

/// Turns a meter capture into a reading string.
///
/// `read_meter` never fails: the result always matches
/// `^[0-9]+\.[0-9]{1,3}$`, with "0.0" when nothing was recognized.
pub trait MeterEngine {
    /// Canonical algorithm name.
    fn name(&self) -> &'static str;

    fn read_meter(&self, raw: &RgbaImage) -> String;

    /// The integer and decimal regions exactly as `read_meter` reads them.
    ///
    /// None for engines that do not split the capture into two regions.
    fn debug_preprocessed_parts(&self, _raw: &RgbaImage) -> Option<(GrayImage, GrayImage)> {
        None
    }
}

/// Builds the engine named by `config.algorithm`.
///
/// Unknown names are rejected here, before any image is read.
pub fn create_engine(
    config: &RecognitionConfig,
    reader: Box<dyn DigitReader>,
) -> Result<Box<dyn MeterEngine>> {
    let algorithm = config.algorithm()?;
    log(&format!("Using OCR engine: {}", algorithm));

    let engine: Box<dyn MeterEngine> = match algorithm {
        Algorithm::TesseractV1 => Box::new(CascadeEngine::new(config.clone(), reader)),
        Algorithm::SimpleTesseract => Box::new(SimpleEngine::new(reader)),
        Algorithm::TesseractSplitDigits => {
            Box::new(SplitDigitsEngine::new(config.clone(), reader))
        }
    };
    Ok(engine)
}
