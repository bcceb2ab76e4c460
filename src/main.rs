//! Meter OCR
//!
//! Command-line front end: reads a meter capture, verifies labeled fixtures,
//! sweeps preprocessing parameters, and prepares the Tesseract install.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use meter_ocr::config::{self, RecognitionConfig, TesseractConfig};
use meter_ocr::ocr::{self, fixtures, tune, TesseractReader};
use meter_ocr::report::{export_to_json, ReadingReport};
use meter_ocr::{log, paths};

#[derive(Parser)]
#[command(name = "meter-ocr")]
#[command(about = "Reads water-meter odometer captures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one capture and print the reading
    Read {
        /// Capture image (PNG, JPEG, ...)
        image: PathBuf,

        /// Recognition algorithm (overrides config and OCR_ALGORITHM)
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Save the preprocessed regions to the default debug directory
        #[arg(long)]
        debug: bool,

        /// Save the preprocessed regions to this directory
        #[arg(long, value_name = "DIR")]
        debug_dir: Option<PathBuf>,

        /// Print a JSON report instead of the bare reading
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Read every labeled fixture in a directory (e.g. 144_786.png)
    Verify {
        /// Directory of fixtures
        dir: PathBuf,

        /// Recognition algorithm (overrides config and OCR_ALGORITHM)
        #[arg(short, long)]
        algorithm: Option<String>,
    },
    /// Sweep upscale factors and decimal thresholds over one capture
    Tune {
        /// Capture image
        image: PathBuf,
    },
    /// Locate Tesseract and download missing trained data
    Setup,
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    let cli = Cli::parse();

    // Ensure output directories exist
    paths::ensure_directories()?;

    // Load configuration
    config::init_config();
    let app_config = config::get_config();

    match cli.command {
        Commands::Read {
            image,
            algorithm,
            debug,
            debug_dir,
            json,
            output,
        } => {
            let recognition = app_config
                .recognition
                .with_algorithm_override(algorithm.as_deref());
            let debug_dir = debug_dir.or_else(|| debug.then(paths::get_debug_dir));
            cmd_read(
                &image,
                &recognition,
                &app_config.tesseract,
                debug_dir.as_deref(),
                json,
                output.as_deref(),
            )
        }
        Commands::Verify { dir, algorithm } => {
            let recognition = app_config
                .recognition
                .with_algorithm_override(algorithm.as_deref());
            cmd_verify(&dir, &recognition, &app_config.tesseract)
        }
        Commands::Tune { image } => {
            cmd_tune(&image, &app_config.recognition, &app_config.tesseract)
        }
        Commands::Setup => cmd_setup(&app_config.tesseract),
    }
}

/// Builds the Tesseract reader, downloading trained data when it is missing.
fn create_reader(tesseract: &TesseractConfig) -> Result<TesseractReader> {
    match ocr::ensure_tesseract(tesseract) {
        Ok(found) => TesseractReader::new(&TesseractConfig {
            executable: Some(found.executable),
            tessdata_dir: Some(found.tessdata),
            language: tesseract.language.clone(),
        }),
        Err(e) => {
            log(&format!("Warning: Failed to setup Tesseract: {}", e));
            TesseractReader::new(tesseract)
        }
    }
}

fn cmd_read(
    image: &Path,
    recognition: &RecognitionConfig,
    tesseract: &TesseractConfig,
    debug_dir: Option<&Path>,
    json: bool,
    output: Option<&Path>,
) -> Result<()> {
    let algorithm = recognition.algorithm()?;
    let reader = create_reader(tesseract)?;
    let reading = ocr::read_meter_from_path(image, recognition, Box::new(reader), debug_dir)?;

    let report = ReadingReport::new(algorithm.name(), &reading, Some(image));
    if let Some(path) = output {
        export_to_json(&report, path)?;
        log(&format!("Report written to {}", path.display()));
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", reading);
    }
    Ok(())
}

fn cmd_verify(dir: &Path, recognition: &RecognitionConfig, tesseract: &TesseractConfig) -> Result<()> {
    let reader = create_reader(tesseract)?;
    let engine = ocr::create_engine(recognition, Box::new(reader))?;
    let results = fixtures::verify_fixtures(dir, engine.as_ref())?;

    if results.is_empty() {
        return Err(anyhow!("No fixtures found in {}", dir.display()));
    }

    let mut failed = 0;
    for result in &results {
        let name = result
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if result.passed() {
            println!("ok    {}  {}", name, result.actual);
        } else {
            failed += 1;
            println!("FAIL  {}  expected {}, got {}", name, result.expected, result.actual);
        }
    }

    println!(
        "{}: {} passed, {} failed",
        engine.name(),
        results.len() - failed,
        failed
    );
    if failed > 0 {
        return Err(anyhow!("{} of {} fixtures failed", failed, results.len()));
    }
    Ok(())
}

fn cmd_tune(image: &Path, recognition: &RecognitionConfig, tesseract: &TesseractConfig) -> Result<()> {
    let raw = image::open(image)
        .context(format!("Failed to open image: {}", image.display()))?
        .to_rgba8();
    let reader = create_reader(tesseract)?;

    let mut current_scale = None;
    for result in tune::sweep(&reader, &raw, recognition) {
        if current_scale != Some(result.scale) {
            println!("\n--- Scale {}x ---", result.scale);
            current_scale = Some(result.scale);
        }
        println!("Th={}: '{}'", result.threshold, result.text);
    }
    Ok(())
}

fn cmd_setup(tesseract: &TesseractConfig) -> Result<()> {
    let found = ocr::ensure_tesseract(tesseract)?;
    println!("executable: {}", found.executable.display());
    println!("tessdata:   {}", found.tessdata.display());
    Ok(())
}
