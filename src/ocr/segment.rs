//! Digit segmentation by column ink density.
//!
//! Well-separated glyphs are found as runs of ink columns. When glyphs touch
//! and the run count does not match, the ink profile is smoothed and split
//! at its two deepest valleys instead.

use image::GrayImage;

use super::pixels::{column_ink_counts, crop, crop_to_ink, ink_bbox, BoundingBox};

/// Padding kept around each glyph after cropping to its ink.
const GLYPH_PAD: u32 = 12;

/// Width of the moving average used for valley finding.
const SMOOTHING_WINDOW: usize = 7;

/// Ink spans narrower than this are split evenly instead of by valleys.
const MIN_VALLEY_SPAN: u32 = 30;

/// Proportional search windows for the two valley cuts.
const FIRST_VALLEY: (f32, f32) = (0.20, 0.45);
const SECOND_VALLEY: (f32, f32) = (0.55, 0.80);

/// Valleys closer than this collapse into an equal three-way split.
const MIN_VALLEY_DISTANCE: u32 = 5;

/// A glyph crop and its position in the region it was cut from.
#[derive(Clone, Debug)]
pub struct DigitRegion {
    pub image: GrayImage,
    pub bbox: BoundingBox,
}

/// Splits a binary region into `expected_count` glyph crops, left to right.
///
/// Regions without ink, or no wider than `expected_count`, come back as a
/// single region covering the whole image.
pub fn segment(binary: &GrayImage, expected_count: usize) -> Vec<DigitRegion> {
    let (w, h) = binary.dimensions();
    let whole = || {
        vec![DigitRegion {
            image: binary.clone(),
            bbox: BoundingBox {
                x: 0,
                y: 0,
                width: w,
                height: h,
            },
        }]
    };

    if expected_count == 0 || w as usize <= expected_count {
        return whole();
    }
    let Some(ink_box) = ink_bbox(binary) else {
        return whole();
    };

    let ink = column_ink_counts(binary);
    let runs = merge_runs(&ink_runs(&ink, h), w);

    let boxes = if runs.len() == expected_count {
        runs
    } else {
        let (left, right) = (ink_box.x, ink_box.right());
        let span = right - left;
        if expected_count != 3 || span < MIN_VALLEY_SPAN {
            equal_split(left, right, expected_count)
        } else {
            valley_split(&ink[left as usize..right as usize], left, right)
        }
    };

    let expand = ((w as f32 * 0.01) as u32).max(2);
    boxes
        .into_iter()
        .map(|(x0, x1)| {
            let x0 = x0.saturating_sub(expand);
            let x1 = (x1 + expand).min(w);
            let column = BoundingBox {
                x: x0,
                y: 0,
                width: x1 - x0,
                height: h,
            };
            let slab = crop(binary, column);
            match ink_bbox(&slab) {
                Some(inner) => {
                    let padded = inner.expand_within(GLYPH_PAD, slab.width(), slab.height());
                    DigitRegion {
                        image: crop(&slab, padded),
                        bbox: BoundingBox {
                            x: x0 + padded.x,
                            ..padded
                        },
                    }
                }
                None => DigitRegion {
                    image: slab,
                    bbox: column,
                },
            }
        })
        .collect()
}

/// Contiguous runs of ink columns as half-open (start, end) ranges.
///
/// A column counts as ink when it holds at least 1% of the height in ink pixels.
fn ink_runs(ink: &[u32], height: u32) -> Vec<(u32, u32)> {
    let threshold = ((height as f32 * 0.01) as u32).max(1);
    let mut runs = Vec::new();
    let mut start: Option<u32> = None;

    for (x, &count) in ink.iter().enumerate() {
        let x = x as u32;
        match (count >= threshold, start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                runs.push((s, x));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, ink.len() as u32));
    }
    runs
}

/// Drops noise runs and joins runs separated by a narrow gap.
fn merge_runs(runs: &[(u32, u32)], width: u32) -> Vec<(u32, u32)> {
    let min_run = ((width as f32 * 0.02) as u32).max(2);
    let max_gap = ((width as f32 * 0.01) as u32).max(2);
    let mut merged: Vec<(u32, u32)> = Vec::new();

    for &(a, b) in runs {
        if b - a < min_run {
            continue;
        }
        match merged.last_mut() {
            Some(last) if a - last.1 <= max_gap => last.1 = b,
            _ => merged.push((a, b)),
        }
    }
    merged
}

/// Splits [left, right) into `count` equal boxes; the last absorbs the remainder.
fn equal_split(left: u32, right: u32, count: usize) -> Vec<(u32, u32)> {
    let span = (right - left).max(1);
    let step = (span / count as u32).max(1);
    (0..count as u32)
        .map(|i| {
            let x0 = (left + i * step).min(right);
            let x1 = if i + 1 < count as u32 {
                (left + (i + 1) * step).min(right)
            } else {
                right
            };
            (x0, x1)
        })
        .collect()
}

/// Cuts three touching glyphs at the minima of the smoothed ink profile.
///
/// `profile` holds the column ink counts of [left, right).
fn valley_split(profile: &[u32], left: u32, right: u32) -> Vec<(u32, u32)> {
    let smooth = moving_average(profile, SMOOTHING_WINDOW);
    let len = smooth.len();
    let window = |(a, b): (f32, f32)| ((len as f32 * a) as usize, (len as f32 * b) as usize);

    let mut cut1 = left + argmin(&smooth, window(FIRST_VALLEY)) as u32;
    let mut cut2 = left + argmin(&smooth, window(SECOND_VALLEY)) as u32;
    if cut2 <= cut1 + MIN_VALLEY_DISTANCE {
        let span = right - left;
        cut1 = left + span / 3;
        cut2 = left + 2 * span / 3;
    }
    vec![(left, cut1), (cut1, cut2), (cut2, right)]
}

fn moving_average(values: &[u32], window: usize) -> Vec<f32> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let a = i.saturating_sub(half);
            let b = (i + half + 1).min(values.len());
            let sum: u32 = values[a..b].iter().sum();
            sum as f32 / (b - a) as f32
        })
        .collect()
}

/// Index of the first minimum in [a, b); `a` when the range is empty.
fn argmin(values: &[f32], (a, b): (usize, usize)) -> usize {
    let b = b.min(values.len());
    if a >= b {
        return a;
    }
    let mut best = a;
    for i in a..b {
        if values[i] < values[best] {
            best = i;
        }
    }
    best
}
