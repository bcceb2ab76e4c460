use image::{GrayImage, RgbaImage};

use super::MeterEngine;
use crate::config::{Algorithm, RecognitionConfig};
use crate::log;
use crate::ocr::engine::{DigitReader, PageSegMode};
use crate::ocr::extract::{extract_digits, Reading, DECIMAL_DIGITS};
use crate::ocr::pixels::{crop, expand, fix_border_artifacts, BoundingBox, BACKGROUND};
use crate::ocr::preprocess::{binarize_decimal_region, normalize_integer_region, split_regions};

/// Decimal cutoff for this variant; darker than the default.
const DECIMAL_CUTOFF: u8 = 170;
/// Background added around each decimal glyph box.
const GLYPH_PADDING: u32 = 20;

/// Reads the decimals as three fixed-width glyph boxes, one OCR call each.
///
/// Useful when Tesseract fails to segment the decimal digits as a group.
pub struct SplitDigitsEngine {
    config: RecognitionConfig,
    reader: Box<dyn DigitReader>,
}

impl SplitDigitsEngine {
    pub fn new(config: RecognitionConfig, reader: Box<dyn DigitReader>) -> Self {
        Self { config, reader }
    }

    fn preprocess(&self, raw: &RgbaImage) -> (GrayImage, GrayImage) {
        let (left, right) = split_regions(raw, &self.config);
        let right = fix_border_artifacts(&binarize_decimal_region(&right, DECIMAL_CUTOFF));
        (normalize_integer_region(&left, &self.config), right)
    }

    fn read_glyph(&self, glyph: &GrayImage) -> char {
        let text = self.reader.read_digits(glyph, PageSegMode::SingleChar);
        extract_digits(&text).chars().next().unwrap_or('0')
    }
}

impl MeterEngine for SplitDigitsEngine {
    fn name(&self) -> &'static str {
        Algorithm::TesseractSplitDigits.name()
    }

    fn read_meter(&self, raw: &RgbaImage) -> String {
        let (left, right) = self.preprocess(raw);
        let integer = self.reader.read_digits(&left, PageSegMode::SingleLine);

        let decimal: String = split_equal(&right, DECIMAL_DIGITS)
            .iter()
            .map(|glyph| self.read_glyph(glyph))
            .collect();

        let reading = Reading::from_parts(&integer, &decimal);
        log(&format!("Split-digits reading: {}", reading));
        reading.to_string()
    }

    fn debug_preprocessed_parts(&self, raw: &RgbaImage) -> Option<(GrayImage, GrayImage)> {
        Some(self.preprocess(raw))
    }
}

/// Cuts an image into `count` full-height boxes of equal width, each padded.
///
/// The last box takes the remainder of the width.
fn split_equal(img: &GrayImage, count: usize) -> Vec<GrayImage> {
    let (w, h) = img.dimensions();
    let step = (w / count as u32).max(1);
    (0..count as u32)
        .map(|i| {
            let x0 = (i * step).min(w);
            let x1 = if i + 1 < count as u32 {
                ((i + 1) * step).min(w)
            } else {
                w
            };
            let part = crop(
                img,
                BoundingBox {
                    x: x0,
                    y: 0,
                    width: x1.saturating_sub(x0),
                    height: h,
                },
            );
            expand(&part, GLYPH_PADDING, BACKGROUND)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::fakes::ScriptedReader;
    use crate::ocr::engines::tests::synthetic_capture;
    use std::cell::Cell;

    #[test]
    fn test_split_equal_widths() {
        let img = GrayImage::from_pixel(100, 10, image::Luma([BACKGROUND]));
        let parts = split_equal(&img, 3);
        let widths: Vec<u32> = parts.iter().map(|p| p.width()).collect();
        assert_eq!(widths, vec![33 + 40, 33 + 40, 34 + 40]);
        assert!(parts.iter().all(|p| p.height() == 10 + 40));
    }

    #[test]
    fn test_glyph_reads_in_order() {
        let next = Cell::new(0usize);
        let reader = ScriptedReader::new(move |_, mode| match mode {
            PageSegMode::SingleLine => "0144".to_string(),
            PageSegMode::SingleChar => {
                let i = next.get();
                next.set(i + 1);
                ["7", "", "65"][i % 3].to_string()
            }
            _ => String::new(),
        });
        let calls = reader.calls.clone();
        let engine = SplitDigitsEngine::new(RecognitionConfig::default(), Box::new(reader));

        // Missing glyph becomes 0, extra digits keep only the first
        assert_eq!(engine.read_meter(&synthetic_capture()), "144.706");
        assert_eq!(calls.borrow().len(), 4);
    }

    #[test]
    fn test_debug_parts_are_the_regions_read() {
        let reader = ScriptedReader::silent();
        let calls = reader.calls.clone();
        let engine = SplitDigitsEngine::new(RecognitionConfig::default(), Box::new(reader));
        let raw = synthetic_capture();

        let (left, right) = engine.debug_preprocessed_parts(&raw).unwrap();
        engine.read_meter(&raw);

        let glyph_sizes: Vec<(u32, u32)> = split_equal(&right, DECIMAL_DIGITS)
            .iter()
            .map(|g| g.dimensions())
            .collect();
        let calls = calls.borrow();
        assert_eq!(calls[0], (PageSegMode::SingleLine, left.dimensions()));
        let read_sizes: Vec<(u32, u32)> = calls[1..].iter().map(|&(_, dims)| dims).collect();
        assert_eq!(read_sizes, glyph_sizes);
        assert_eq!((left, right), engine.preprocess(&raw));
    }
}
