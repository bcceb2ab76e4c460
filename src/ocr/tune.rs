//! Upscale and decimal-threshold sweep for recalibrating preprocessing.
//!
//! Each variant rebuilds the capture with a different decimal treatment and
//! reads it as a single line, so the raw OCR text of every combination can
//! be compared side by side.

use image::{imageops, GrayImage, RgbaImage};
use std::fmt;

use super::engine::{DigitReader, PageSegMode};
use super::pixels::{
    autocontrast, expand, invert, threshold, to_grayscale, upscale, BACKGROUND,
};
use super::preprocess::split_at_fraction;
use crate::config::RecognitionConfig;
use crate::log;

pub const SCALES: [u32; 2] = [2, 3];
pub const CUTOFFS: [u8; 9] = [140, 150, 160, 170, 180, 190, 200, 210, 220];

/// How the decimal region is treated in a variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecimalThreshold {
    /// Auto-contrast only, left in grayscale
    AutoContrast,
    /// Plain threshold at the given cutoff
    Cutoff(u8),
}

impl fmt::Display for DecimalThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalThreshold::AutoContrast => f.write_str("autocontrast"),
            DecimalThreshold::Cutoff(cutoff) => write!(f, "{}", cutoff),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TuneResult {
    pub scale: u32,
    pub threshold: DecimalThreshold,
    /// Raw OCR text, trimmed
    pub text: String,
}

/// Every (scale, threshold) combination, auto-contrast first for each scale.
pub fn variants() -> Vec<(u32, DecimalThreshold)> {
    SCALES
        .iter()
        .flat_map(|&scale| {
            std::iter::once(DecimalThreshold::AutoContrast)
                .chain(CUTOFFS.iter().map(|&c| DecimalThreshold::Cutoff(c)))
                .map(move |threshold| (scale, threshold))
        })
        .collect()
}

/// Rebuilds the capture with the integer part inverted and thresholded and
/// the decimal part treated per `decimal`, then pads it.
pub fn render_variant(
    raw: &RgbaImage,
    config: &RecognitionConfig,
    scale: u32,
    decimal: DecimalThreshold,
) -> GrayImage {
    let gray = upscale(&to_grayscale(raw), scale);
    let (left, right) = split_at_fraction(&gray, config.split_fraction);

    let left = threshold(&invert(&left), config.integer_cutoff);
    let right = match decimal {
        DecimalThreshold::AutoContrast => autocontrast(&right),
        DecimalThreshold::Cutoff(cutoff) => threshold(&right, cutoff),
    };

    let mut stitched = GrayImage::new(gray.width(), gray.height());
    imageops::replace(&mut stitched, &left, 0, 0);
    imageops::replace(&mut stitched, &right, left.width() as i64, 0);
    expand(&stitched, config.padding, BACKGROUND)
}

/// Reads every variant of the capture.
pub fn sweep(reader: &dyn DigitReader, raw: &RgbaImage, config: &RecognitionConfig) -> Vec<TuneResult> {
    variants()
        .into_iter()
        .map(|(scale, threshold)| {
            let img = render_variant(raw, config, scale, threshold);
            let text = reader.read_digits(&img, PageSegMode::SingleLine).trim().to_string();
            log(&format!("Tune scale {}x th={}: {:?}", scale, threshold, text));
            TuneResult {
                scale,
                threshold,
                text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::fakes::ScriptedReader;
    use crate::ocr::engines::tests::synthetic_capture;
    use crate::ocr::pixels::INK;

    #[test]
    fn test_variants_cover_grid() {
        let all = variants();
        assert_eq!(all.len(), SCALES.len() * (CUTOFFS.len() + 1));
        assert_eq!(all[0], (2, DecimalThreshold::AutoContrast));
        assert_eq!(all[1], (2, DecimalThreshold::Cutoff(140)));
        assert_eq!(all[10], (3, DecimalThreshold::AutoContrast));
    }

    #[test]
    fn test_threshold_display() {
        assert_eq!(DecimalThreshold::AutoContrast.to_string(), "autocontrast");
        assert_eq!(DecimalThreshold::Cutoff(170).to_string(), "170");
    }

    #[test]
    fn test_render_variant_layout() {
        let config = RecognitionConfig::default();
        let img = render_variant(&synthetic_capture(), &config, 2, DecimalThreshold::Cutoff(150));

        // 200x40 plus 50 px padding
        assert_eq!(img.dimensions(), (300, 140));
        // Light integer stroke at source x=10..13 becomes ink after inversion
        assert_eq!(img.get_pixel(50 + 23, 50 + 20)[0], INK);
        // Red decimal stroke at source x=80..83 is dark enough for cutoff 150
        assert_eq!(img.get_pixel(50 + 163, 50 + 20)[0], INK);
        assert_eq!(img.get_pixel(50 + 173, 50 + 20)[0], BACKGROUND);
    }

    #[test]
    fn test_sweep_reads_each_variant_once() {
        let reader = ScriptedReader::new(|img, _| format!(" {} \n", img.width()));
        let results = sweep(&reader, &synthetic_capture(), &RecognitionConfig::default());

        assert_eq!(results.len(), variants().len());
        assert_eq!(reader.call_count(), variants().len());
        assert_eq!(results[0].text, "300");
        assert_eq!(results.last().unwrap().text, "400");
        assert!(reader.calls.borrow().iter().all(|(mode, _)| *mode == PageSegMode::SingleLine));
    }
}
