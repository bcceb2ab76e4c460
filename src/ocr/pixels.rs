//! Pixel-region primitives shared by every engine.
//!
//! All functions take an immutable image and return a new one. Binary images
//! use `INK` (0) for digit strokes and `BACKGROUND` (255) for everything else.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};

/// Pixel value of ink in binary images.
pub const INK: u8 = 0;
/// Pixel value of background in binary images.
pub const BACKGROUND: u8 = 255;

/// A rectangle in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Grows the box by `pad` on every side, clamped to a `width` x `height` canvas.
    pub fn expand_within(&self, pad: u32, width: u32, height: u32) -> BoundingBox {
        let x0 = self.x.saturating_sub(pad);
        let y0 = self.y.saturating_sub(pad);
        let x1 = (self.right() + pad).min(width);
        let y1 = (self.bottom() + pad).min(height);
        BoundingBox {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// Returns true if a luminance value counts as ink.
pub fn is_ink(value: u8) -> bool {
    value < 128
}

/// Converts a color capture to Rec. 601 luminance.
///
/// The threshold cutoffs are calibrated against 601 weights; the Rec. 709
/// weights of `imageops::grayscale` render red strokes noticeably darker.
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, _] = img.get_pixel(x, y).0;
        let luma = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([luma as u8])
    })
}

/// Linear threshold: values below `cutoff` become ink, the rest background.
pub fn threshold(img: &GrayImage, cutoff: u8) -> GrayImage {
    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = if pixel[0] < cutoff { INK } else { BACKGROUND };
    }
    output
}

/// Returns the negative of the image.
pub fn invert(img: &GrayImage) -> GrayImage {
    let mut output = img.clone();
    imageops::invert(&mut output);
    output
}

/// Stretches the histogram so the darkest value maps to 0 and the brightest to 255.
///
/// A flat image (single value) is returned unchanged.
pub fn autocontrast(img: &GrayImage) -> GrayImage {
    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let lo = histogram.iter().position(|&c| c > 0);
    let hi = histogram.iter().rposition(|&c| c > 0);
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => (lo as f32, hi as f32),
        _ => return img.clone(),
    };

    let scale = 255.0 / (hi - lo);
    let offset = -lo * scale;
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = (i as f32 * scale + offset).clamp(0.0, 255.0) as u8;
    }

    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = lut[pixel[0] as usize];
    }
    output
}

/// Resizes to exact dimensions. Zero-sized targets yield an empty image.
pub fn resize(img: &GrayImage, width: u32, height: u32, filter: FilterType) -> GrayImage {
    if width == 0 || height == 0 || img.width() == 0 || img.height() == 0 {
        return GrayImage::new(width, height);
    }
    imageops::resize(img, width, height, filter)
}

/// Scales both dimensions by an integer factor with Lanczos resampling.
pub fn upscale(img: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return img.clone();
    }
    resize(
        img,
        img.width() * factor,
        img.height() * factor,
        FilterType::Lanczos3,
    )
}

/// Scales a color image by an integer factor with Lanczos resampling.
pub fn upscale_rgba(img: &RgbaImage, factor: u32) -> RgbaImage {
    if factor <= 1 || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    imageops::resize(
        img,
        img.width() * factor,
        img.height() * factor,
        FilterType::Lanczos3,
    )
}

/// Adds a uniform border of `fill` around the image.
pub fn expand(img: &GrayImage, border: u32, fill: u8) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut output = GrayImage::from_pixel(w + border * 2, h + border * 2, Luma([fill]));
    imageops::replace(&mut output, img, border as i64, border as i64);
    output
}

/// Crops a rectangle, clamped to the image bounds.
pub fn crop(img: &GrayImage, bbox: BoundingBox) -> GrayImage {
    imageops::crop_imm(img, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
}

/// Bounding box of all ink pixels, or None for an image without ink.
pub fn ink_bbox(img: &GrayImage) -> Option<BoundingBox> {
    let (w, h) = img.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in img.enumerate_pixels() {
        if is_ink(pixel[0]) {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if !found || w == 0 || h == 0 {
        return None;
    }

    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Crops to the ink bounding box plus `pad` pixels, clamped to the image.
pub fn crop_to_ink(img: &GrayImage, pad: u32) -> Option<GrayImage> {
    let bbox = ink_bbox(img)?.expand_within(pad, img.width(), img.height());
    Some(crop(img, bbox))
}

/// Paints a frame of `band` pixels on every edge with background.
///
/// The band is capped below half of the shorter side so the interior survives.
pub fn erase_border_band(img: &GrayImage, band: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let band = band.min((w.min(h) / 2).saturating_sub(1));
    if band == 0 {
        return img.clone();
    }

    let mut output = img.clone();
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        if x < band || y < band || x >= w - band || y >= h - band {
            pixel[0] = BACKGROUND;
        }
    }
    output
}

/// Strips a rendered frame by cropping a 6% margin, then re-pads with 30 px of background.
pub fn fix_border_artifacts(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let margin = ((w.min(h) as f32 * 0.06) as u32).max(1);
    if w <= margin * 2 || h <= margin * 2 {
        return expand(img, 30, BACKGROUND);
    }
    let inner = crop(
        img,
        BoundingBox {
            x: margin,
            y: margin,
            width: w - margin * 2,
            height: h - margin * 2,
        },
    );
    expand(&inner, 30, BACKGROUND)
}

/// Fattens ink strokes by one pixel on every side (3x3 min filter).
///
/// Growth is symmetric, so the left/right and top/bottom ink balance of a
/// glyph is preserved.
pub fn thicken_strokes(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut darkest = BACKGROUND;
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                darkest = darkest.min(img.get_pixel(nx, ny)[0]);
            }
        }
        Luma([darkest])
    })
}

/// Applies `thicken_strokes` `n` times.
pub fn thicken_strokes_n(img: &GrayImage, n: usize) -> GrayImage {
    let mut output = img.clone();
    for _ in 0..n {
        output = thicken_strokes(&output);
    }
    output
}

/// Centers the image on a square background canvas with `pad` pixels of margin.
pub fn pad_to_square(img: &GrayImage, pad: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let side = w.max(h) + pad * 2;
    let mut canvas = GrayImage::from_pixel(side, side, Luma([BACKGROUND]));
    let x = (side - w) / 2;
    let y = (side - h) / 2;
    imageops::replace(&mut canvas, img, x as i64, y as i64);
    canvas
}

/// Returns (ink pixel count, total pixel count).
pub fn ink_pixel_stats(img: &GrayImage) -> (u32, u32) {
    let ink = img.pixels().filter(|p| is_ink(p[0])).count() as u32;
    (ink, img.width() * img.height())
}

/// Ink fraction of the whole image; 0.0 for an empty image.
pub fn ink_density(img: &GrayImage) -> f32 {
    let (ink, total) = ink_pixel_stats(img);
    if total == 0 {
        0.0
    } else {
        ink as f32 / total as f32
    }
}

/// Ink fraction of the left and right halves.
pub fn left_right_ink_ratio(img: &GrayImage) -> (f32, f32) {
    let (w, h) = img.dimensions();
    if w <= 1 || h <= 1 {
        return (0.0, 0.0);
    }
    let mid = w / 2;
    let mut left = 0u32;
    let mut right = 0u32;
    for (x, _y, pixel) in img.enumerate_pixels() {
        if is_ink(pixel[0]) {
            if x < mid {
                left += 1;
            } else {
                right += 1;
            }
        }
    }
    let left_total = mid * h;
    let right_total = (w - mid) * h;
    (ratio(left, left_total), ratio(right, right_total))
}

/// Ink fraction of the top and bottom halves.
pub fn top_bottom_ink_ratio(img: &GrayImage) -> (f32, f32) {
    let (w, h) = img.dimensions();
    if w <= 1 || h <= 1 {
        return (0.0, 0.0);
    }
    let mid = h / 2;
    let mut top = 0u32;
    let mut bottom = 0u32;
    for (_x, y, pixel) in img.enumerate_pixels() {
        if is_ink(pixel[0]) {
            if y < mid {
                top += 1;
            } else {
                bottom += 1;
            }
        }
    }
    let top_total = w * mid;
    let bottom_total = w * (h - mid);
    (ratio(top, top_total), ratio(bottom, bottom_total))
}

/// Ink fraction of the top `band_ratio` of the image (at least one row).
pub fn top_band_ink_ratio(img: &GrayImage, band_ratio: f32) -> f32 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let band_h = ((h as f32 * band_ratio) as u32).clamp(1, h);
    let mut ink = 0u32;
    for y in 0..band_h {
        for x in 0..w {
            if is_ink(img.get_pixel(x, y)[0]) {
                ink += 1;
            }
        }
    }
    ratio(ink, w * band_h)
}

/// Like `top_band_ink_ratio`, measured on the tight ink crop.
pub fn top_band_ink_ratio_of_ink(img: &GrayImage, band_ratio: f32) -> f32 {
    match crop_to_ink(img, 0) {
        Some(cropped) => top_band_ink_ratio(&cropped, band_ratio),
        None => 0.0,
    }
}

/// Ink pixel count per column.
pub fn column_ink_counts(img: &GrayImage) -> Vec<u32> {
    let (w, h) = img.dimensions();
    let mut counts = vec![0u32; w as usize];
    for y in 0..h {
        for x in 0..w {
            if is_ink(img.get_pixel(x, y)[0]) {
                counts[x as usize] += 1;
            }
        }
    }
    counts
}

/// Counts background components fully enclosed by ink.
///
/// Background reachable from the border is flooded first; every remaining
/// unvisited background component is a hole.
pub fn count_holes(img: &GrayImage) -> usize {
    let (w, h) = img.dimensions();
    if w <= 1 || h <= 1 {
        return 0;
    }
    let (w, h) = (w as usize, h as usize);
    let background: Vec<bool> = img.pixels().map(|p| !is_ink(p[0])).collect();
    let mut visited = vec![false; w * h];
    let mut stack: Vec<usize> = Vec::new();

    let mut flood = |start: usize, visited: &mut [bool]| {
        visited[start] = true;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            let mut visit = |n: usize| {
                if background[n] && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }
    };

    for x in 0..w {
        for idx in [x, (h - 1) * w + x] {
            if background[idx] && !visited[idx] {
                flood(idx, &mut visited);
            }
        }
    }
    for y in 0..h {
        for idx in [y * w, y * w + w - 1] {
            if background[idx] && !visited[idx] {
                flood(idx, &mut visited);
            }
        }
    }

    let mut holes = 0;
    for idx in 0..w * h {
        if background[idx] && !visited[idx] {
            holes += 1;
            flood(idx, &mut visited);
        }
    }
    holes
}

fn ratio(part: u32, total: u32) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}
