//! Topological digit disambiguation for the decimal glyphs.
//!
//! The rules are tuned to the seven-segment-like font of the odometer canvas
//! and are not a general classifier. Thresholds are recalibratable against a
//! labeled fixture set.

use image::GrayImage;

use super::pixels::{
    count_holes, ink_density, left_right_ink_ratio, top_band_ink_ratio_of_ink,
    top_bottom_ink_ratio,
};

/// One side dominates the other by this factor for left/right decisions.
const SIDE_DOMINANCE: f32 = 1.2;
/// Stronger left/right dominance used for 5→9 and 3 rescue.
const STRONG_SIDE_DOMINANCE: f32 = 1.5;
/// Top half dominates the bottom half by this factor.
const TOP_DOMINANCE: f32 = 1.15;
/// Glyphs narrower than this width/height ratio are 1 or 7 shaped.
const NARROW_ASPECT: f32 = 0.35;
/// Left/right ink ratios closer than this count as balanced.
const BALANCED_SIDES: f32 = 0.03;
/// Top/bottom differences used to separate 0, 8, 1, 5 and 9.
const TB_NEAR_EQUAL: f32 = 0.02;
const TB_TIGHT: f32 = 0.006;
const TB_DISTINCT: f32 = 0.03;
/// Leading-glyph rescue: minimum ink density and top-band ink ratio for a 7.
const LEADING_MIN_DENSITY: f32 = 0.03;
const LEADING_MIN_TOP_BAND: f32 = 0.06;
/// Height fraction of the top band.
const TOP_BAND_RATIO: f32 = 0.15;

/// Shape features of a binary glyph crop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphFeatures {
    pub holes: usize,
    pub left_ratio: f32,
    pub right_ratio: f32,
    pub top_ratio: f32,
    pub bottom_ratio: f32,
    /// Width divided by height; 0.0 for an empty crop
    pub aspect: f32,
    pub density: f32,
    /// Ink ratio of the top band of the tight ink crop
    pub top_band_ratio: f32,
}

impl GlyphFeatures {
    pub fn measure(glyph: &GrayImage) -> Self {
        let (w, h) = glyph.dimensions();
        let (left_ratio, right_ratio) = left_right_ink_ratio(glyph);
        let (top_ratio, bottom_ratio) = top_bottom_ink_ratio(glyph);
        Self {
            holes: count_holes(glyph),
            left_ratio,
            right_ratio,
            top_ratio,
            bottom_ratio,
            aspect: if h == 0 { 0.0 } else { w as f32 / h as f32 },
            density: ink_density(glyph),
            top_band_ratio: top_band_ink_ratio_of_ink(glyph, TOP_BAND_RATIO),
        }
    }

    fn left_heavy(&self, factor: f32) -> bool {
        self.left_ratio > self.right_ratio * factor
    }

    fn right_heavy(&self, factor: f32) -> bool {
        self.right_ratio > self.left_ratio * factor
    }

    fn top_heavy(&self) -> bool {
        self.top_ratio > self.bottom_ratio * TOP_DOMINANCE
    }

    fn sides_balanced(&self) -> bool {
        (self.left_ratio - self.right_ratio).abs() < BALANCED_SIDES
    }

    fn top_bottom_diff(&self) -> f32 {
        (self.top_ratio - self.bottom_ratio).abs()
    }
}

/// The decided digit for one glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub digit: char,
    /// True when the digit came from an OCR guess that survived the checks
    pub recognized: bool,
}

/// Decides the digit of a glyph from its shape and an optional OCR guess.
///
/// `position` is the glyph index within the decimal region; the leading
/// glyph gets an extra rescue rule because it fails OCR most often.
pub fn classify(glyph: &GrayImage, ocr_guess: Option<char>, position: usize) -> Classification {
    let features = GlyphFeatures::measure(glyph);
    classify_features(&features, ocr_guess, position)
}

/// Rule table behind `classify`, on precomputed features.
pub fn classify_features(
    f: &GlyphFeatures,
    ocr_guess: Option<char>,
    position: usize,
) -> Classification {
    let guess = ocr_guess.and_then(|g| correct_guess(f, g));
    if let Some(digit) = guess {
        return Classification {
            digit,
            recognized: true,
        };
    }

    let digit = if position == 0 && leading_seven(f) {
        '7'
    } else {
        rescue(f).unwrap_or('0')
    };
    Classification {
        digit,
        recognized: false,
    }
}

/// Checks an OCR guess against the glyph shape. None rejects the guess.
fn correct_guess(f: &GlyphFeatures, guess: char) -> Option<char> {
    match guess {
        '5' if f.holes == 0 => {
            if f.left_heavy(STRONG_SIDE_DOMINANCE) && f.top_heavy() {
                Some('9')
            } else {
                Some('5')
            }
        }
        '5' if f.holes >= 2 => None,
        '1' if f.aspect >= NARROW_ASPECT => None,
        '2' if f.holes == 1 => {
            if f.right_heavy(SIDE_DOMINANCE) {
                Some('9')
            } else if f.left_heavy(SIDE_DOMINANCE) {
                Some('6')
            } else {
                Some('0')
            }
        }
        '3' if f.holes == 1 && f.sides_balanced() => Some('0'),
        g if g.is_ascii_digit() => Some(g),
        _ => None,
    }
}

/// Sparse top-heavy ink in the leading position reads as a 7.
fn leading_seven(f: &GlyphFeatures) -> bool {
    f.density > LEADING_MIN_DENSITY && f.top_band_ratio > LEADING_MIN_TOP_BAND
}

/// Shape-only decision when OCR produced nothing usable.
fn rescue(f: &GlyphFeatures) -> Option<char> {
    if f.aspect > 0.0 && f.aspect < NARROW_ASPECT {
        if f.holes >= 1 && f.sides_balanced() {
            if f.top_bottom_diff() > TB_DISTINCT {
                return Some('0');
            }
            if f.top_bottom_diff() < TB_NEAR_EQUAL {
                return Some('8');
            }
        }
        return Some(if f.top_heavy() { '7' } else { '1' });
    }

    match f.holes {
        0 => {
            if f.right_heavy(STRONG_SIDE_DOMINANCE) && f.top_bottom_diff() < TB_NEAR_EQUAL {
                Some('3')
            } else if f.top_heavy() {
                Some('7')
            } else {
                None
            }
        }
        1 => {
            let diff = f.top_bottom_diff();
            if f.right_heavy(SIDE_DOMINANCE) {
                Some(if diff < TB_TIGHT {
                    '1'
                } else if diff < TB_NEAR_EQUAL {
                    '5'
                } else {
                    '9'
                })
            } else if f.left_heavy(SIDE_DOMINANCE) {
                Some(if diff < TB_NEAR_EQUAL { '6' } else { '0' })
            } else {
                Some('0')
            }
        }
        _ => Some('8'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::pixels::tests::{from_ascii, ring};

    fn features() -> GlyphFeatures {
        GlyphFeatures {
            holes: 0,
            left_ratio: 0.3,
            right_ratio: 0.3,
            top_ratio: 0.3,
            bottom_ratio: 0.3,
            aspect: 0.6,
            density: 0.3,
            top_band_ratio: 0.3,
        }
    }

    fn digit(f: &GlyphFeatures, guess: Option<char>, position: usize) -> char {
        classify_features(f, guess, position).digit
    }

    #[test]
    fn test_measure_ring() {
        let f = GlyphFeatures::measure(&ring(10, 20));
        assert_eq!(f.holes, 1);
        assert!((f.aspect - 0.5).abs() < 1e-6);
        assert!(f.sides_balanced());
    }

    #[test]
    fn test_measure_empty_glyph() {
        let f = GlyphFeatures::measure(&GrayImage::new(0, 0));
        assert_eq!(f.holes, 0);
        assert_eq!(f.aspect, 0.0);
        assert_eq!(f.density, 0.0);
    }

    #[test]
    fn test_plain_guess_is_kept() {
        let c = classify_features(&features(), Some('4'), 1);
        assert_eq!(c, Classification { digit: '4', recognized: true });
    }

    #[test]
    fn test_five_without_holes_left_top_heavy_is_nine() {
        let f = GlyphFeatures {
            left_ratio: 0.5,
            right_ratio: 0.2,
            top_ratio: 0.5,
            bottom_ratio: 0.3,
            ..features()
        };
        assert_eq!(digit(&f, Some('5'), 1), '9');
        assert_eq!(digit(&features(), Some('5'), 1), '5');
    }

    #[test]
    fn test_five_with_two_holes_is_rejected() {
        let f = GlyphFeatures { holes: 2, ..features() };
        let c = classify_features(&f, Some('5'), 1);
        assert_eq!(c, Classification { digit: '8', recognized: false });
    }

    #[test]
    fn test_wide_one_is_rejected() {
        let c = classify_features(&features(), Some('1'), 1);
        assert!(!c.recognized);
    }

    #[test]
    fn test_two_with_hole() {
        let base = GlyphFeatures { holes: 1, ..features() };
        let right = GlyphFeatures { right_ratio: 0.5, ..base };
        let left = GlyphFeatures { left_ratio: 0.5, ..base };
        assert_eq!(digit(&right, Some('2'), 1), '9');
        assert_eq!(digit(&left, Some('2'), 1), '6');
        assert_eq!(digit(&base, Some('2'), 1), '0');
    }

    #[test]
    fn test_three_with_hole_balanced_is_zero() {
        let f = GlyphFeatures { holes: 1, ..features() };
        assert_eq!(digit(&f, Some('3'), 1), '0');
        let skewed = GlyphFeatures { right_ratio: 0.4, ..f };
        assert_eq!(digit(&skewed, Some('3'), 1), '3');
    }

    #[test]
    fn test_no_guess_two_holes_is_eight() {
        let f = GlyphFeatures { holes: 2, ..features() };
        assert_eq!(digit(&f, None, 1), '8');
    }

    #[test]
    fn test_no_guess_one_hole() {
        let base = GlyphFeatures { holes: 1, ..features() };
        let right = |top: f32, bottom: f32| GlyphFeatures {
            right_ratio: 0.5,
            top_ratio: top,
            bottom_ratio: bottom,
            ..base
        };
        assert_eq!(digit(&right(0.3, 0.303), None, 1), '1');
        assert_eq!(digit(&right(0.3, 0.31), None, 1), '5');
        assert_eq!(digit(&right(0.3, 0.4), None, 1), '9');

        let left = |top: f32, bottom: f32| GlyphFeatures {
            left_ratio: 0.5,
            top_ratio: top,
            bottom_ratio: bottom,
            ..base
        };
        assert_eq!(digit(&left(0.3, 0.31), None, 1), '6');
        assert_eq!(digit(&left(0.3, 0.4), None, 1), '0');
        assert_eq!(digit(&base, None, 1), '0');
    }

    #[test]
    fn test_no_guess_narrow() {
        let narrow = GlyphFeatures { aspect: 0.2, ..features() };
        let top_heavy = GlyphFeatures { top_ratio: 0.5, ..narrow };
        assert_eq!(digit(&narrow, None, 1), '1');
        assert_eq!(digit(&top_heavy, None, 1), '7');

        let holed = GlyphFeatures { holes: 1, ..narrow };
        assert_eq!(digit(&holed, None, 1), '8');
        let tall_zero = GlyphFeatures { bottom_ratio: 0.4, ..holed };
        assert_eq!(digit(&tall_zero, None, 1), '0');
    }

    #[test]
    fn test_no_guess_no_holes() {
        let three = GlyphFeatures { right_ratio: 0.5, ..features() };
        assert_eq!(digit(&three, None, 1), '3');
        let seven = GlyphFeatures { top_ratio: 0.5, ..features() };
        assert_eq!(digit(&seven, None, 1), '7');
        assert_eq!(digit(&features(), None, 1), '0');
    }

    #[test]
    fn test_leading_glyph_rescue() {
        let f = GlyphFeatures {
            density: 0.1,
            top_band_ratio: 0.2,
            ..features()
        };
        assert_eq!(digit(&f, None, 0), '7');
        // Other positions use the regular rescue
        assert_eq!(digit(&f, None, 1), '0');
        // Blank leading glyph has no ink to rescue
        let blank = GlyphFeatures {
            density: 0.0,
            top_band_ratio: 0.0,
            ..features()
        };
        assert_eq!(digit(&blank, None, 0), '0');
    }

    #[test]
    fn test_classify_seven_shape() {
        let seven = from_ascii(&[
            "#######", //
            "#######", //
            ".....##", //
            "....##.", //
            "...##..", //
            "..##...", //
            "..##...", //
            "..##...", //
            "..##...", //
            "..##...",
        ]);
        let c = classify(&seven, None, 1);
        assert_eq!(c.digit, '7');
        assert!(!c.recognized);
    }

    #[test]
    fn test_classify_eight_shape() {
        let eight = from_ascii(&[
            "#######", //
            "#.....#", //
            "#.....#", //
            "#######", //
            "#.....#", //
            "#.....#", //
            "#######",
        ]);
        assert_eq!(classify(&eight, None, 2).digit, '8');
    }
}
