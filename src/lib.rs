//! Meter OCR
//!
//! Turns a captured odometer canvas into a water-meter reading such as `"144.786"`.
//! The recognition engine splits the capture into an integer and a decimal region,
//! runs Tesseract over each with a cascade of increasingly aggressive preprocessing,
//! and rescues unreadable decimal glyphs with topological heuristics.

pub mod config;
pub mod ocr;
pub mod paths;
pub mod report;

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

/// Writes a timestamped line to stderr and appends it to the log file.
///
/// Stdout is reserved for readings, so log output never mixes with them.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    let log_path = paths::get_logs_dir().join("meter_ocr.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}
