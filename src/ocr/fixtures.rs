//! Labeled capture fixtures: the filename encodes the expected reading.
//!
//! `144_786.png` and `144.786.png` both expect `"144.786"`.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::engines::MeterEngine;
use crate::log;

const FIXTURE_NAME_PATTERN: &str = r"^(\d+)[_.](\d+)$";

/// Expected reading encoded in a fixture filename.
pub fn expected_from_filename(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let pattern = Regex::new(FIXTURE_NAME_PATTERN)?;
    let caps = pattern.captures(&stem).ok_or_else(|| {
        anyhow!(
            "Fixture filename must look like '144_786.png' or '144.786.png', got: {}",
            path.display()
        )
    })?;
    Ok(format!("{}.{}", &caps[1], &caps[2]))
}

/// PNG files in `dir`, sorted by path. A missing directory has no fixtures.
pub fn fixture_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut images = Vec::new();
    for entry in fs::read_dir(dir).context(format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false);
        if path.is_file() && is_png {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Outcome of reading one fixture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureResult {
    pub path: PathBuf,
    pub expected: String,
    pub actual: String,
}

impl FixtureResult {
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

/// Reads every fixture in `dir` with `engine`.
///
/// Fails on the first fixture whose name or image cannot be used.
pub fn verify_fixtures(dir: &Path, engine: &dyn MeterEngine) -> Result<Vec<FixtureResult>> {
    let mut results = Vec::new();
    for path in fixture_images(dir)? {
        let expected = expected_from_filename(&path)?;
        let raw = image::open(&path)
            .context(format!("Failed to open fixture: {}", path.display()))?
            .to_rgba8();
        let actual = engine.read_meter(&raw);

        log(&format!(
            "Fixture {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        ));
        results.push(FixtureResult {
            path,
            expected,
            actual,
        });
    }
    Ok(results)
}
