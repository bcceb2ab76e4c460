use image::RgbaImage;

use super::MeterEngine;
use crate::config::Algorithm;
use crate::log;
use crate::ocr::engine::{DigitReader, PageSegMode};
use crate::ocr::extract::Reading;
use crate::ocr::pixels::{autocontrast, expand, threshold, to_grayscale, upscale, BACKGROUND};

const UPSCALE: u32 = 4;
const CUTOFF: u8 = 165;
const PADDING: u32 = 40;
const WHITELIST: &str = "0123456789.";

/// Binarizes the whole capture and reads it in one pass.
///
/// The last 3 digits found are the decimals.
pub struct SimpleEngine {
    reader: Box<dyn DigitReader>,
}

impl SimpleEngine {
    pub fn new(reader: Box<dyn DigitReader>) -> Self {
        Self { reader }
    }
}

impl MeterEngine for SimpleEngine {
    fn name(&self) -> &'static str {
        Algorithm::SimpleTesseract.name()
    }

    fn read_meter(&self, raw: &RgbaImage) -> String {
        let gray = upscale(&to_grayscale(raw), UPSCALE);
        let binary = threshold(&autocontrast(&gray), CUTOFF);
        let padded = expand(&binary, PADDING, BACKGROUND);

        let text = self
            .reader
            .read_with_whitelist(&padded, PageSegMode::SingleLine, WHITELIST);
        let reading = Reading::from_flat_digits(&text);
        log(&format!("Simple reading: {} (raw {:?})", reading, text));
        reading.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::fakes::ScriptedReader;
    use crate::ocr::engines::tests::synthetic_capture;

    fn read(text: &'static str) -> String {
        let engine = SimpleEngine::new(Box::new(ScriptedReader::new(move |_, _| text.to_string())));
        engine.read_meter(&synthetic_capture())
    }

    #[test]
    fn test_flat_digits_split() {
        assert_eq!(read("144.786"), "144.786");
        assert_eq!(read("0144786"), "144.786");
        assert_eq!(read("86"), "0.086");
        assert_eq!(read(""), "0.0");
    }

    #[test]
    fn test_single_line_call_on_padded_capture() {
        let reader = ScriptedReader::silent();
        let calls = reader.calls.clone();
        let whitelists = reader.whitelists.clone();
        SimpleEngine::new(Box::new(reader)).read_meter(&synthetic_capture());

        // 100x20 upscaled 4x, then 40 px of padding on every side
        assert_eq!(
            *calls.borrow(),
            vec![(PageSegMode::SingleLine, (400 + 80, 80 + 80))]
        );
        // The decimal point is allowed through, unlike the cascade reads
        assert_eq!(*whitelists.borrow(), vec!["0123456789.".to_string()]);
    }
}
