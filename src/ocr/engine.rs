use anyhow::{anyhow, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::TesseractConfig;
use crate::log;

/// Tesseract page segmentation modes used by the cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageSegMode {
    /// Assume a single uniform block of text (psm 6)
    SingleBlock,
    /// Treat the image as a single text line (psm 7)
    SingleLine,
    /// Treat the image as a single word (psm 8)
    SingleWord,
    /// Treat the image as a single character (psm 10)
    SingleChar,
    /// Find as much text as possible in no particular order (psm 11)
    SparseText,
    /// Single text line, bypassing Tesseract-specific layout hacks (psm 13)
    RawLine,
}

impl PageSegMode {
    /// Numeric value passed with `--psm`.
    pub fn psm(self) -> u8 {
        match self {
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::SingleWord => 8,
            PageSegMode::SingleChar => 10,
            PageSegMode::SparseText => 11,
            PageSegMode::RawLine => 13,
        }
    }
}

/// Character whitelist for meter digits.
pub const DIGIT_WHITELIST: &str = "0123456789";

/// An OCR back-end that reads digit text from a binary region.
///
/// Implementations must not fail: any internal error is reported as an
/// empty string, which the cascade treats as "no digits found".
pub trait DigitReader {
    /// Reads the region restricted to `whitelist` characters.
    fn read_with_whitelist(&self, region: &GrayImage, mode: PageSegMode, whitelist: &str) -> String;

    /// Reads the region restricted to `DIGIT_WHITELIST`.
    fn read_digits(&self, region: &GrayImage, mode: PageSegMode) -> String {
        self.read_with_whitelist(region, mode, DIGIT_WHITELIST)
    }
}

/// Runs the Tesseract CLI on a temporary PNG, one process per call.
pub struct TesseractReader {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
}

impl TesseractReader {
    /// Locates Tesseract using the configured paths, falling back to discovery.
    pub fn new(config: &TesseractConfig) -> Result<Self> {
        let executable = match &config.executable {
            Some(path) => path.clone(),
            None => find_tesseract_executable()?,
        };
        let tessdata = match &config.tessdata_dir {
            Some(path) => Some(path.clone()),
            None => find_tessdata_dir(&config.language).ok(),
        };

        log(&format!(
            "Tesseract reader: {} (tessdata: {})",
            executable.display(),
            tessdata
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".to_string())
        ));

        Ok(Self {
            executable,
            tessdata,
            language: config.language.clone(),
        })
    }

    /// Builds the argument list after the input and output positions.
    fn build_args(&self, mode: PageSegMode, whitelist: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(tessdata) = &self.tessdata {
            args.push("--tessdata-dir".to_string());
            args.push(tessdata.display().to_string());
        }
        args.extend([
            "-l".to_string(),
            self.language.clone(),
            "--oem".to_string(),
            "3".to_string(),
            "--psm".to_string(),
            mode.psm().to_string(),
            "-c".to_string(),
            format!("tessedit_char_whitelist={}", whitelist),
            "-c".to_string(),
            "classify_bln_numeric_mode=1".to_string(),
            "-c".to_string(),
            "load_system_dawg=0".to_string(),
            "-c".to_string(),
            "load_freq_dawg=0".to_string(),
        ]);
        args
    }

    fn run(&self, region: &GrayImage, mode: PageSegMode, whitelist: &str) -> Result<String> {
        if region.width() == 0 || region.height() == 0 {
            return Ok(String::new());
        }

        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        region.save(temp_input.path())?;

        // Run Tesseract to stdout
        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .args(self.build_args(mode, whitelist))
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl DigitReader for TesseractReader {
    fn read_with_whitelist(&self, region: &GrayImage, mode: PageSegMode, whitelist: &str) -> String {
        match self.run(region, mode, whitelist) {
            Ok(text) => text,
            Err(e) => {
                log(&format!("OCR psm {} failed: {}", mode.psm(), e));
                String::new()
            }
        }
    }
}

/// Scripted readers for engine and cascade tests.
#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Script = Box<dyn Fn(&GrayImage, PageSegMode) -> String>;

    pub(crate) type CallLog = Rc<RefCell<Vec<(PageSegMode, (u32, u32))>>>;
    pub(crate) type WhitelistLog = Rc<RefCell<Vec<String>>>;

    /// Answers each call from a closure and records the mode and region size.
    ///
    /// `calls` and `whitelists` are shared and index-aligned, so a clone taken
    /// before boxing the reader still sees every call.
    pub(crate) struct ScriptedReader {
        script: Script,
        pub calls: CallLog,
        pub whitelists: WhitelistLog,
    }

    impl ScriptedReader {
        pub(crate) fn new(script: impl Fn(&GrayImage, PageSegMode) -> String + 'static) -> Self {
            Self {
                script: Box::new(script),
                calls: Rc::new(RefCell::new(Vec::new())),
                whitelists: Rc::new(RefCell::new(Vec::new())),
            }
        }

        /// A reader that never finds anything.
        pub(crate) fn silent() -> Self {
            Self::new(|_, _| String::new())
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl DigitReader for ScriptedReader {
        fn read_with_whitelist(&self, region: &GrayImage, mode: PageSegMode, whitelist: &str) -> String {
            self.calls.borrow_mut().push((mode, region.dimensions()));
            self.whitelists.borrow_mut().push(whitelist.to_string());
            (self.script)(region, mode)
        }
    }
}
