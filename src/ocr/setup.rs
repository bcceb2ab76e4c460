use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::TesseractConfig;
use crate::log;
use crate::paths::get_tesseract_dir;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Executable locations tried after the local directory and PATH.
const COMMON_EXECUTABLE_PATHS: [&str; 5] = [
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

/// System tessdata directories, newest packaging layout first.
const SYSTEM_TESSDATA_PATHS: [&str; 7] = [
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Ensures Tesseract is usable. Downloads the trained data if necessary.
///
/// The executable itself is never downloaded; it must be installed.
pub fn ensure_tesseract(config: &TesseractConfig) -> Result<TesseractPaths> {
    let executable = match &config.executable {
        Some(path) => path.clone(),
        None => find_tesseract_executable()?,
    };

    let existing = match &config.tessdata_dir {
        Some(dir) if has_traineddata(dir, &config.language) => Some(dir.clone()),
        Some(dir) => {
            log(&format!(
                "Configured tessdata dir {} has no {}.traineddata",
                dir.display(),
                config.language
            ));
            None
        }
        None => find_tessdata_dir(&config.language).ok(),
    };

    let tessdata = match existing {
        Some(dir) => {
            log(&format!("Tessdata found at: {}", dir.display()));
            dir
        }
        None => {
            log("Trained data not found locally, downloading...");
            let dir = get_tesseract_dir().join("tessdata");
            fs::create_dir_all(&dir)
                .context(format!("Failed to create {}", dir.display()))?;
            download_tessdata(&dir, &config.language)?;
            dir
        }
    };

    log(&format!(
        "Tesseract ready: {} (tessdata: {})",
        executable.display(),
        tessdata.display()
    ));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

fn has_traineddata(dir: &Path, language: &str) -> bool {
    dir.join(format!("{}.traineddata", language)).exists()
}

/// Downloads `<language>.traineddata` from the tessdata repository.
fn download_tessdata(tessdata_dir: &Path, language: &str) -> Result<()> {
    let file_name = format!("{}.traineddata", language);
    let url = format!("{}/{}", TESSDATA_REPO, file_name);
    let target = tessdata_dir.join(&file_name);

    log(&format!("Downloading {}...", file_name));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "meter-ocr")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            file_name,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&target)
        .context(format!("Failed to create {}", target.display()))?;
    file.write_all(&bytes)?;

    log(&format!("Downloaded {} ({} bytes)", file_name, bytes.len()));

    Ok(())
}

/// Finds the Tesseract executable, checking our local dir first, then system
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let tesseract_dir = get_tesseract_dir();
    for name in ["tesseract", "tesseract.exe"] {
        let local_exe = tesseract_dir.join(name);
        if local_exe.is_file() {
            return Ok(local_exe);
        }
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    // Check common paths
    for path in &COMMON_EXECUTABLE_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing the language's trained data.
pub fn find_tessdata_dir(language: &str) -> Result<PathBuf> {
    let local_tessdata = get_tesseract_dir().join("tessdata");
    if has_traineddata(&local_tessdata, language) {
        return Ok(local_tessdata);
    }

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        if let Some(dir) = tessdata_under_prefix(Path::new(&prefix), language) {
            return Ok(dir);
        }
    }

    for path in &SYSTEM_TESSDATA_PATHS {
        let p = PathBuf::from(path);
        if has_traineddata(&p, language) {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "tessdata directory not found. Please ensure {}.traineddata is available.",
        language
    ))
}

/// TESSDATA_PREFIX may point at the tessdata dir itself or at its parent.
fn tessdata_under_prefix(prefix: &Path, language: &str) -> Option<PathBuf> {
    if has_traineddata(prefix, language) {
        return Some(prefix.to_path_buf());
    }
    let nested = prefix.join("tessdata");
    if has_traineddata(&nested, language) {
        return Some(nested);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tessdata_under_prefix_direct() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("eng.traineddata"), b"x").unwrap();
        assert_eq!(
            tessdata_under_prefix(dir.path(), "eng"),
            Some(dir.path().to_path_buf())
        );
        assert_eq!(tessdata_under_prefix(dir.path(), "deu"), None);
    }

    #[test]
    fn test_tessdata_under_prefix_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("tessdata");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("eng.traineddata"), b"x").unwrap();
        assert_eq!(tessdata_under_prefix(dir.path(), "eng"), Some(nested));
    }

    #[test]
    fn test_configured_tessdata_is_used() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("eng.traineddata"), b"x").unwrap();
        let config = TesseractConfig {
            executable: Some(PathBuf::from("/usr/bin/tesseract")),
            tessdata_dir: Some(dir.path().to_path_buf()),
            language: "eng".to_string(),
        };

        let paths = ensure_tesseract(&config).unwrap();
        assert_eq!(paths.executable, PathBuf::from("/usr/bin/tesseract"));
        assert_eq!(paths.tessdata, dir.path().to_path_buf());
    }
}
