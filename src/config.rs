//! Configuration types for meter recognition.
//!
//! Loads settings from config.json at startup. Provides the recognition
//! algorithm selector, the preprocessing constants, and Tesseract locations.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Environment variable that overrides `recognition.algorithm`.
pub const ALGORITHM_ENV_VAR: &str = "OCR_ALGORITHM";

/// The closed set of recognition strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    /// Full staged cascade with segmentation and red-ink overrides.
    TesseractV1,
    /// Single-pass whole-image binarization.
    SimpleTesseract,
    /// Fixed three-way positional split of the decimal region.
    TesseractSplitDigits,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::TesseractV1,
        Algorithm::SimpleTesseract,
        Algorithm::TesseractSplitDigits,
    ];

    /// Canonical name used in config files and reports.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::TesseractV1 => "tesseract_v1",
            Algorithm::SimpleTesseract => "simple_tesseract",
            Algorithm::TesseractSplitDigits => "tesseract_split_digits",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    /// Accepts canonical names and short aliases, case-insensitively.
    /// Anything else is a configuration error.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tesseract_v1" | "v1" | "default" => Ok(Algorithm::TesseractV1),
            "simple_tesseract" | "simple" => Ok(Algorithm::SimpleTesseract),
            "tesseract_split_digits" | "split_digits" | "split" => {
                Ok(Algorithm::TesseractSplitDigits)
            }
            _ => Err(anyhow!(
                "Unknown OCR algorithm '{}'. Use one of: 'tesseract_v1', 'simple_tesseract', 'tesseract_split_digits'",
                s
            )),
        }
    }
}

/// Settings for the recognition engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Strategy name, resolved through `Algorithm::from_str` at engine construction
    pub algorithm: String,
    /// Fraction of the width where the decimal digits start.
    /// Shifts left as the meter grows past a power of ten.
    pub split_fraction: f32,
    /// Integer upscale factor applied before splitting
    pub upscale: u32,
    /// Threshold cutoff for the inverted integer region
    pub integer_cutoff: u8,
    /// Threshold cutoff for the decimal region
    pub decimal_cutoff: u8,
    /// Background padding added around both regions (pixels)
    pub padding: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::TesseractV1.name().to_string(),
            split_fraction: 0.65,
            upscale: 3,
            integer_cutoff: 150,
            decimal_cutoff: 150,
            padding: 50,
        }
    }
}

impl RecognitionConfig {
    /// Resolves the configured algorithm name.
    pub fn algorithm(&self) -> Result<Algorithm> {
        self.algorithm.parse()
    }

    /// Returns a copy with the algorithm replaced, if an override is given.
    pub fn with_algorithm_override(&self, algorithm: Option<&str>) -> Self {
        let mut cfg = self.clone();
        if let Some(name) = algorithm.map(str::trim).filter(|n| !n.is_empty()) {
            cfg.algorithm = name.to_string();
        }
        cfg
    }
}

/// Where to find the Tesseract executable and its trained data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Explicit executable path; searched for when absent
    pub executable: Option<PathBuf>,
    /// Explicit tessdata directory; searched for when absent
    pub tessdata_dir: Option<PathBuf>,
    /// Trained data language passed with `-l`
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: None,
            tessdata_dir: None,
            language: "eng".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recognition: RecognitionConfig,
    pub tesseract: TesseractConfig,
}

/// Loads configuration from the given path or returns defaults.
///
/// The `OCR_ALGORITHM` environment variable, when set, replaces the
/// configured algorithm name. The name is validated later, when the
/// engine is created.
pub fn load_config(config_path: &Path) -> AppConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    let mut config = if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    config
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                    AppConfig::default()
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
                AppConfig::default()
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
        AppConfig::default()
    };

    if let Ok(name) = std::env::var(ALGORITHM_ENV_VAR) {
        config.recognition = config.recognition.with_algorithm_override(Some(&name));
    }

    config
}

/// Initializes the global configuration from `<exe_dir>/config.json`. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config(&crate::paths::get_config_path()));
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
