use image::{GrayImage, RgbaImage};

use super::MeterEngine;
use crate::config::{Algorithm, RecognitionConfig};
use crate::log;
use crate::ocr::cascade::{read_decimal, read_integer};
use crate::ocr::engine::DigitReader;
use crate::ocr::extract::Reading;
use crate::ocr::preprocess::{normalize_full_image, preprocess_meter_image};

/// The full pipeline: multi-attempt integer read and the staged decimal cascade.
pub struct CascadeEngine {
    config: RecognitionConfig,
    reader: Box<dyn DigitReader>,
}

impl CascadeEngine {
    pub fn new(config: RecognitionConfig, reader: Box<dyn DigitReader>) -> Self {
        Self { config, reader }
    }
}

impl MeterEngine for CascadeEngine {
    fn name(&self) -> &'static str {
        Algorithm::TesseractV1.name()
    }

    fn read_meter(&self, raw: &RgbaImage) -> String {
        let reader = self.reader.as_ref();
        let (left, right) = preprocess_meter_image(raw, &self.config);
        let full = normalize_full_image(raw, &self.config);

        let integer = read_integer(reader, &left, Some(&full));
        let decimal = read_decimal(reader, &right, Some(raw), &self.config);

        let reading = Reading::from_parts(&integer, &decimal);
        log(&format!("Reading: {}", reading));
        reading.to_string()
    }

    fn debug_preprocessed_parts(&self, raw: &RgbaImage) -> Option<(GrayImage, GrayImage)> {
        Some(preprocess_meter_image(raw, &self.config))
    }
}
