use image::{GrayImage, Luma, RgbaImage};

use super::pixels::{
    autocontrast, crop, expand, invert, threshold, to_grayscale, upscale, upscale_rgba,
    BoundingBox, BACKGROUND, INK,
};
use crate::config::RecognitionConfig;

/// Upscale factor applied to the decimal crop before red-ink extraction.
const RED_INK_UPSCALE: u32 = 8;

/// Red strength at or above this value is treated as ink.
const RED_INK_CUTOFF: u8 = 140;

/// Splits a capture into its normalized integer and decimal regions.
///
/// The integer digits render light-on-dark and are inverted before
/// thresholding; the decimal digits render dark-on-light. Both regions get
/// a uniform background border so Tesseract does not clip edge glyphs.
pub fn preprocess_meter_image(
    raw: &RgbaImage,
    config: &RecognitionConfig,
) -> (GrayImage, GrayImage) {
    let (left, right) = split_regions(raw, config);
    let right = binarize_decimal_region(&right, config.decimal_cutoff);
    (
        normalize_integer_region(&left, config),
        expand(&right, config.padding, BACKGROUND),
    )
}

/// Upscaled grayscale capture cut at `config.split_fraction`.
pub fn split_regions(raw: &RgbaImage, config: &RecognitionConfig) -> (GrayImage, GrayImage) {
    let gray = upscale(&to_grayscale(raw), config.upscale);
    split_at_fraction(&gray, config.split_fraction)
}

/// Inverts, stretches, thresholds and pads the integer region.
pub fn normalize_integer_region(left: &GrayImage, config: &RecognitionConfig) -> GrayImage {
    let binary = threshold(&autocontrast(&invert(left)), config.integer_cutoff);
    expand(&binary, config.padding, BACKGROUND)
}

/// Stretches and thresholds the decimal region, without padding.
pub fn binarize_decimal_region(right: &GrayImage, cutoff: u8) -> GrayImage {
    threshold(&autocontrast(right), cutoff)
}

/// Normalizes the whole capture without splitting it.
///
/// Used as one more integer candidate when the split lands inside a glyph.
pub fn normalize_full_image(raw: &RgbaImage, config: &RecognitionConfig) -> GrayImage {
    let gray = upscale(&to_grayscale(raw), config.upscale);
    let binary = threshold(&autocontrast(&gray), config.integer_cutoff);
    expand(&binary, config.padding, BACKGROUND)
}

/// Cuts an image vertically at `fraction` of its width.
pub fn split_at_fraction(img: &GrayImage, fraction: f32) -> (GrayImage, GrayImage) {
    let (w, h) = img.dimensions();
    let split_x = split_column(w, fraction);
    let left = crop(
        img,
        BoundingBox {
            x: 0,
            y: 0,
            width: split_x,
            height: h,
        },
    );
    let right = crop(
        img,
        BoundingBox {
            x: split_x,
            y: 0,
            width: w - split_x,
            height: h,
        },
    );
    (left, right)
}

fn split_column(width: u32, fraction: f32) -> u32 {
    // Tolerance keeps 0.65 * 300 at 195 despite f32 rounding
    let x = width as f64 * fraction.clamp(0.0, 1.0) as f64 + 1e-3;
    (x.floor() as u32).min(width)
}

/// Isolates red digit strokes from the decimal part of a color capture.
///
/// Red strength is `2 * (R - (G + B) / 2)` clamped to 0-255, auto-contrasted,
/// then thresholded. Strong red becomes ink, everything else background.
pub fn extract_red_ink(raw: &RgbaImage, config: &RecognitionConfig) -> GrayImage {
    let (w, h) = raw.dimensions();
    let split_x = split_column(w, config.split_fraction);
    let decimals = image::imageops::crop_imm(raw, split_x, 0, w - split_x, h).to_image();
    let decimals = upscale_rgba(&decimals, RED_INK_UPSCALE);

    let (dw, dh) = decimals.dimensions();
    let mut strength = GrayImage::new(dw, dh);
    for (x, y, pixel) in decimals.enumerate_pixels() {
        let r = pixel[0] as i32;
        let avg_gb = (pixel[1] as i32 + pixel[2] as i32) / 2;
        let value = ((r - avg_gb) * 2).clamp(0, 255) as u8;
        strength.put_pixel(x, y, Luma([value]));
    }

    let strength = autocontrast(&strength);
    let mut output = strength.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = if pixel[0] >= RED_INK_CUTOFF { INK } else { BACKGROUND };
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::pixels::{ink_bbox, ink_pixel_stats};
    use image::Rgba;

    /// Dark canvas with light integer digits on the left and a light decimal
    /// panel with a red stroke on the right.
    fn synthetic_capture() -> RgbaImage {
        RgbaImage::from_fn(100, 20, |x, y| {
            if x < 65 {
                if (10..14).contains(&x) && (4..16).contains(&y) {
                    Rgba([240, 240, 240, 255])
                } else {
                    Rgba([20, 20, 20, 255])
                }
            } else if (80..84).contains(&x) && (4..16).contains(&y) {
                Rgba([220, 20, 20, 255])
            } else {
                Rgba([235, 235, 235, 255])
            }
        })
    }

    #[test]
    fn test_preprocess_dimensions() {
        let cfg = RecognitionConfig::default();
        let (left, right) = preprocess_meter_image(&synthetic_capture(), &cfg);

        // 300x60 after upscaling, split at 195
        assert_eq!(left.dimensions(), (195 + 100, 60 + 100));
        assert_eq!(right.dimensions(), (105 + 100, 60 + 100));
    }

    #[test]
    fn test_preprocess_normalizes_polarity() {
        let cfg = RecognitionConfig::default();
        let (left, right) = preprocess_meter_image(&synthetic_capture(), &cfg);

        // Light-on-dark integer stroke (source x=10..14) becomes ink on background
        assert_eq!(left.get_pixel(36 + 50, 80)[0], INK);
        assert_eq!(left.get_pixel(120 + 50, 80)[0], BACKGROUND);
        assert_eq!(left.get_pixel(0, 0)[0], BACKGROUND);

        // Dark red stroke (source x=80..84) on the light panel stays ink
        assert_eq!(right.get_pixel(246 - 195 + 50, 80)[0], INK);
        assert_eq!(right.get_pixel(276 - 195 + 50, 80)[0], BACKGROUND);
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let cfg = RecognitionConfig::default();
        let img = synthetic_capture();
        assert_eq!(
            preprocess_meter_image(&img, &cfg),
            preprocess_meter_image(&img, &cfg)
        );
    }

    #[test]
    fn test_split_at_fraction_clamps() {
        let img = GrayImage::new(10, 2);
        let (left, right) = split_at_fraction(&img, 1.5);
        assert_eq!(left.dimensions(), (10, 2));
        assert_eq!(right.dimensions(), (0, 2));
    }

    #[test]
    fn test_extract_red_ink() {
        let cfg = RecognitionConfig::default();
        let red = extract_red_ink(&synthetic_capture(), &cfg);

        // 35 columns from x=65, upscaled 8x
        assert_eq!(red.dimensions(), (35 * 8, 20 * 8));
        let bbox = ink_bbox(&red).unwrap();
        // Red stroke at x=80..84 maps to 120..152 in the upscaled crop
        assert!(bbox.x >= 110 && bbox.right() <= 162, "{:?}", bbox);
        let (ink, total) = ink_pixel_stats(&red);
        assert!(ink * 5 < total);
    }

    #[test]
    fn test_extract_red_ink_without_red_has_no_stroke() {
        let cfg = RecognitionConfig::default();
        let gray = RgbaImage::from_pixel(40, 10, Rgba([200, 200, 200, 255]));
        let red = extract_red_ink(&gray, &cfg);
        // Flat strength stays 0 after auto-contrast: nothing reaches the cutoff
        assert!(ink_bbox(&red).is_none());
    }
}
