//! Multi-attempt readers for the integer and decimal regions.
//!
//! A single Tesseract call is unreliable at the glyph size the meter renders,
//! so both readers try several configurations and keep the best result.

use std::cell::OnceCell;

use image::{GrayImage, RgbaImage};

use super::engine::{DigitReader, PageSegMode};
use super::extract::{
    count_digits, extract_digits, normalize_decimal, select_integer, Candidate, DECIMAL_DIGITS,
};
use super::pixels::{
    crop_to_ink, erase_border_band, fix_border_artifacts, ink_density, invert, pad_to_square,
    thicken_strokes, thicken_strokes_n, threshold, upscale,
};
use super::preprocess::extract_red_ink;
use super::segment::segment;
use super::topology::classify;
use crate::config::RecognitionConfig;
use crate::log;

/// Cutoff for the relaxed re-threshold of the border-fixed region.
const RELAXED_CUTOFF: u8 = 190;
/// Cutoff for the black/white conversion before cropping to ink.
const BINARY_CUTOFF: u8 = 200;
/// Upscale factor for the escalated stages.
const STAGE_UPSCALE: u32 = 3;
/// Upscale factor for the padded square read.
const SQUARE_UPSCALE: u32 = 4;
/// Upscale factors tried for each segmented glyph, in order.
const GLYPH_UPSCALES: [u32; 2] = [3, 4];
const SQUARE_PAD: u32 = 30;
const CROP_PAD: u32 = 10;
const GLYPH_CROP_PAD: u32 = 12;
const RED_INK_CROP_PAD: u32 = 12;
/// Glyphs denser than this were segmented with inverted polarity.
const INVERTED_GLYPH_DENSITY: f32 = 0.55;
const GLYPH_THICKEN_PASSES: usize = 2;
/// Width of the erased border band as a fraction of the shorter side.
const BORDER_BAND_FRACTION: f32 = 0.05;
const MIN_BORDER_BAND: u32 = 2;

const LINE_THEN_WORD: [PageSegMode; 2] = [PageSegMode::SingleLine, PageSegMode::SingleWord];

/// Reads the integer digits from several attempts and picks the best.
///
/// `full_image` is the normalized unsplit capture, used as a fallback when
/// the split lands inside a glyph.
pub fn read_integer(
    reader: &dyn DigitReader,
    region: &GrayImage,
    full_image: Option<&GrayImage>,
) -> String {
    let thick = thicken_strokes(region);
    let attempts = [
        (region, PageSegMode::SingleLine),
        (region, PageSegMode::SingleBlock),
        (region, PageSegMode::SingleWord),
        (&thick, PageSegMode::SingleLine),
    ];

    let region_candidates: Vec<Candidate> = attempts
        .iter()
        .filter_map(|(img, mode)| Candidate::from_text(&reader.read_digits(img, *mode)))
        .collect();
    let full_candidates: Vec<Candidate> = full_image
        .and_then(|img| Candidate::from_text(&reader.read_digits(img, PageSegMode::SingleWord)))
        .into_iter()
        .collect();

    let digits = select_integer(&region_candidates, &full_candidates);
    log(&format!(
        "Integer: {:?} ({} region candidates, {} full-image)",
        digits,
        region_candidates.len(),
        full_candidates.len()
    ));
    digits
}

/// When a cascade stage is allowed to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Only while the best result has no digits
    NoDigits,
    /// Only while the best result has fewer than 3 digits
    FewerThanThree,
}

impl Gate {
    pub fn allows(self, best: &str) -> bool {
        let found = count_digits(best);
        match self {
            Gate::NoDigits => found == 0,
            Gate::FewerThanThree => found < DECIMAL_DIGITS,
        }
    }
}

/// One decimal read attempt. Returns the digits found, or None.
pub struct Stage {
    pub name: &'static str,
    pub gate: Gate,
    run: fn(&dyn DigitReader, &DecimalInput) -> Option<String>,
}

/// Decimal stages from cheapest and most conservative to most aggressive.
pub const STAGES: [Stage; 10] = [
    Stage {
        name: "direct",
        gate: Gate::NoDigits,
        run: direct,
    },
    Stage {
        name: "border_fixed",
        gate: Gate::NoDigits,
        run: border_fixed,
    },
    Stage {
        name: "relaxed_cutoff",
        gate: Gate::NoDigits,
        run: relaxed_cutoff,
    },
    Stage {
        name: "upscaled",
        gate: Gate::NoDigits,
        run: upscaled,
    },
    Stage {
        name: "band_erased",
        gate: Gate::NoDigits,
        run: band_erased,
    },
    Stage {
        name: "ink_crop",
        gate: Gate::NoDigits,
        run: ink_crop,
    },
    Stage {
        name: "square_crop",
        gate: Gate::FewerThanThree,
        run: square_crop,
    },
    Stage {
        name: "red_ink",
        gate: Gate::FewerThanThree,
        run: red_ink_crop,
    },
    Stage {
        name: "segmented",
        gate: Gate::FewerThanThree,
        run: segmented,
    },
    Stage {
        name: "ink_block",
        gate: Gate::NoDigits,
        run: ink_block,
    },
];

/// Everything the decimal stages read from.
pub struct DecimalInput<'a> {
    pub region: &'a GrayImage,
    /// The color capture, needed for red-ink extraction
    pub raw: Option<&'a RgbaImage>,
    pub config: &'a RecognitionConfig,
    segmented: OnceCell<SegmentedRead>,
}

impl<'a> DecimalInput<'a> {
    pub fn new(
        region: &'a GrayImage,
        raw: Option<&'a RgbaImage>,
        config: &'a RecognitionConfig,
    ) -> Self {
        Self {
            region,
            raw,
            config,
            segmented: OnceCell::new(),
        }
    }

    /// The segmented read, computed at most once per input.
    fn segmented(&self, reader: &dyn DigitReader) -> &SegmentedRead {
        self.segmented
            .get_or_init(|| read_decimal_split(reader, self.region))
    }
}

/// Runs the stage list and returns the best digits found, possibly empty.
///
/// A stage result replaces the running best only with strictly more digits.
pub fn run_cascade(reader: &dyn DigitReader, input: &DecimalInput) -> String {
    let mut best = String::new();
    for stage in &STAGES {
        if best.len() >= DECIMAL_DIGITS {
            break;
        }
        if !stage.gate.allows(&best) {
            continue;
        }
        let result = (stage.run)(reader, input);
        log(&format!("Decimal stage {}: {:?}", stage.name, result));
        if let Some(digits) = result {
            if digits.len() > best.len() {
                best = digits;
            }
        }
    }
    best
}

/// Reads the decimal digits: the cascade, then the segmented and red-ink overrides.
///
/// Always returns 1 to 3 digits; "0" when nothing was found.
pub fn read_decimal(
    reader: &dyn DigitReader,
    region: &GrayImage,
    raw: Option<&RgbaImage>,
    config: &RecognitionConfig,
) -> String {
    let input = DecimalInput::new(region, raw, config);
    let cascade = run_cascade(reader, &input);
    let red_ink = raw
        .map(|raw| read_red_ink(reader, raw, config))
        .unwrap_or_default();
    resolve_decimal(&cascade, input.segmented(reader), &red_ink)
}

/// Applies the override rules to the cascade result.
///
/// The segmented read wins when the cascade found fewer than 3 digits, or
/// when at least 2 of its glyphs were recognized by OCR and it disagrees.
/// A 3-digit red-ink read then wins over both.
pub fn resolve_decimal(cascade: &str, segmented: &SegmentedRead, red_ink: &str) -> String {
    let mut decimal = normalize_decimal(&extract_digits(cascade));

    let split = &segmented.digits;
    if !split.is_empty()
        && (decimal.len() < DECIMAL_DIGITS || (segmented.recognized >= 2 && *split != decimal))
    {
        log(&format!("Decimal override from segmented read: {}", split));
        decimal = split.clone();
    }

    let red: String = extract_digits(red_ink).chars().take(DECIMAL_DIGITS).collect();
    if red.len() == DECIMAL_DIGITS && red != decimal {
        log(&format!("Decimal override from red ink: {}", red));
        decimal = red;
    }
    decimal
}

/// Result of reading the decimal region glyph by glyph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentedRead {
    pub digits: String,
    /// Glyphs whose digit came from a surviving OCR guess
    pub recognized: usize,
}

/// Segments the decimal region into 3 glyphs and decides each one.
pub fn read_decimal_split(reader: &dyn DigitReader, region: &GrayImage) -> SegmentedRead {
    let Some(cropped) = ink_crop_of(region) else {
        return SegmentedRead::default();
    };

    let mut read = SegmentedRead::default();
    for (position, part) in segment(&cropped, DECIMAL_DIGITS).into_iter().enumerate() {
        let mut glyph = part.image;
        if ink_density(&glyph) > INVERTED_GLYPH_DENSITY {
            glyph = invert(&glyph);
        }
        if let Some(tight) = crop_to_ink(&glyph, GLYPH_CROP_PAD) {
            glyph = tight;
        }
        let glyph = thicken_strokes_n(&glyph, GLYPH_THICKEN_PASSES);

        let guess = read_glyph(reader, &glyph).or_else(|| read_glyph(reader, &invert(&glyph)));
        let decided = classify(&glyph, guess, position);
        if decided.recognized {
            read.recognized += 1;
        }
        read.digits.push(decided.digit);
    }

    log(&format!(
        "Segmented decimal: {} ({} recognized)",
        read.digits, read.recognized
    ));
    read
}

/// First OCR digit of a single glyph, trying each upscale factor in turn.
fn read_glyph(reader: &dyn DigitReader, glyph: &GrayImage) -> Option<char> {
    let square = pad_to_square(glyph, SQUARE_PAD);
    GLYPH_UPSCALES.iter().find_map(|&scale| {
        let text = reader.read_digits(&upscale(&square, scale), PageSegMode::SingleChar);
        extract_digits(&text).chars().next()
    })
}

fn read_red_ink(reader: &dyn DigitReader, raw: &RgbaImage, config: &RecognitionConfig) -> String {
    let red = upscale(&extract_red_ink(raw, config), STAGE_UPSCALE);
    extract_digits(&reader.read_digits(&red, PageSegMode::SingleLine))
}

/// Digits from the first mode that finds any.
fn read_in_modes(reader: &dyn DigitReader, img: &GrayImage, modes: &[PageSegMode]) -> Option<String> {
    modes
        .iter()
        .map(|&mode| extract_digits(&reader.read_digits(img, mode)))
        .find(|digits| !digits.is_empty())
}

/// Border-fixed region with a background band painted over its edges.
fn band_erased_of(region: &GrayImage) -> GrayImage {
    let fixed = fix_border_artifacts(region);
    let short_side = fixed.width().min(fixed.height());
    let band = ((short_side as f32 * BORDER_BAND_FRACTION) as u32).max(MIN_BORDER_BAND);
    erase_border_band(&fixed, band)
}

/// Black/white band-erased region cropped to its ink; None without ink.
fn ink_crop_of(region: &GrayImage) -> Option<GrayImage> {
    crop_to_ink(&threshold(&band_erased_of(region), BINARY_CUTOFF), CROP_PAD)
}

fn direct(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    read_in_modes(reader, input.region, &LINE_THEN_WORD)
}

fn border_fixed(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    read_in_modes(reader, &fix_border_artifacts(input.region), &LINE_THEN_WORD)
}

fn relaxed_cutoff(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let relaxed = threshold(&fix_border_artifacts(input.region), RELAXED_CUTOFF);
    read_in_modes(reader, &relaxed, &LINE_THEN_WORD)
}

fn upscaled(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let fixed = fix_border_artifacts(input.region);
    read_in_modes(reader, &upscale(&fixed, STAGE_UPSCALE), &LINE_THEN_WORD).or_else(|| {
        let relaxed = threshold(&fixed, RELAXED_CUTOFF);
        read_in_modes(reader, &upscale(&relaxed, STAGE_UPSCALE), &LINE_THEN_WORD)
    })
}

fn band_erased(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let thick = thicken_strokes(&band_erased_of(input.region));
    read_in_modes(reader, &upscale(&thick, STAGE_UPSCALE), &LINE_THEN_WORD)
}

fn ink_crop(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let cropped = ink_crop_of(input.region)?;
    read_in_modes(
        reader,
        &upscale(&cropped, STAGE_UPSCALE),
        &[PageSegMode::RawLine, PageSegMode::SingleChar],
    )
}

fn square_crop(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let square = pad_to_square(&ink_crop_of(input.region)?, SQUARE_PAD);
    read_in_modes(
        reader,
        &upscale(&square, SQUARE_UPSCALE),
        &[PageSegMode::SingleChar],
    )
}

fn red_ink_crop(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let red = extract_red_ink(input.raw?, input.config);
    let red = crop_to_ink(&red, RED_INK_CROP_PAD).unwrap_or(red);
    read_in_modes(
        reader,
        &upscale(&red, STAGE_UPSCALE),
        &[PageSegMode::SingleLine],
    )
}

fn segmented(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let read = input.segmented(reader);
    (!read.digits.is_empty()).then(|| read.digits.clone())
}

fn ink_block(reader: &dyn DigitReader, input: &DecimalInput) -> Option<String> {
    let cropped = ink_crop_of(input.region)?;
    read_in_modes(
        reader,
        &upscale(&cropped, STAGE_UPSCALE),
        &[PageSegMode::SingleBlock],
    )
}
