use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::{config::OcrConfig, IngestError};

/// Tesseract page segmentation mode 7: treat the image as a single text line.
pub const SINGLE_LINE: u8 = 7;

/// What the engine must be constrained to for one recognition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub whitelist: &'static str,
    pub page_segmentation: u8,
}

/// An OCR backend. Returns the raw recognized text, or
/// [`IngestError::OcrEngineUnavailable`] when the engine itself cannot run.
///
/// Calls block for as long as recognition takes; run them off the async runtime.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path, request: &RecognitionRequest) -> Result<String, IngestError>;
}

/// Runs the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    language: String,
    engine_mode: u8,
}

impl TesseractCli {
    pub fn new(executable: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            tessdata_dir: None,
            language: language.into(),
            engine_mode: 1,
        }
    }

    pub fn from_config(cfg: &OcrConfig) -> Self {
        Self {
            executable: cfg.tesseract_bin.clone(),
            tessdata_dir: cfg.tessdata_dir.clone(),
            language: cfg.language.clone(),
            engine_mode: cfg.engine_mode,
        }
    }

    /// Checks that the executable starts, returning its version banner.
    pub fn probe(&self) -> Result<String, IngestError> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .output()
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            return Err(IngestError::OcrEngineUnavailable(format!(
                "{} --version exited with {}",
                self.executable.display(),
                output.status
            )));
        }

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() { output.stderr } else { output.stdout };
        Ok(String::from_utf8_lossy(&banner).lines().next().unwrap_or_default().to_string())
    }

    fn command(&self, image: &Path, request: &RecognitionRequest) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(image).arg("stdout");
        if let Some(dir) = &self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg(self.engine_mode.to_string())
            .arg("--psm")
            .arg(request.page_segmentation.to_string())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", request.whitelist));
        cmd
    }

    fn unavailable(&self, e: std::io::Error) -> IngestError {
        IngestError::OcrEngineUnavailable(format!("failed to launch {}: {e}", self.executable.display()))
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &Path, request: &RecognitionRequest) -> Result<String, IngestError> {
        let output = self
            .command(image, request)
            .output()
            .map_err(|e| self.unavailable(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IngestError::OcrEngineUnavailable(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn command_constrains_to_digits_on_one_line() {
        let mut engine = TesseractCli::new("tesseract", "eng");
        engine.tessdata_dir = Some(PathBuf::from("tessdata"));
        let request = RecognitionRequest {
            whitelist: "0123456789",
            page_segmentation: SINGLE_LINE,
        };

        let cmd = engine.command(Path::new("/tmp/meter.png"), &request);
        assert_eq!(
            args(&cmd),
            [
                "/tmp/meter.png",
                "stdout",
                "--tessdata-dir",
                "tessdata",
                "-l",
                "eng",
                "--oem",
                "1",
                "--psm",
                "7",
                "-c",
                "tessedit_char_whitelist=0123456789",
            ]
        );
    }

    #[test]
    fn missing_executable_is_engine_unavailable() {
        let engine = TesseractCli::new("/nonexistent/tesseract-for-meter-tests", "eng");
        let request = RecognitionRequest {
            whitelist: "0123456789",
            page_segmentation: SINGLE_LINE,
        };

        let res = engine.recognize(Path::new("/tmp/none.png"), &request);
        assert!(matches!(res, Err(IngestError::OcrEngineUnavailable(_))));
        assert!(matches!(engine.probe(), Err(IngestError::OcrEngineUnavailable(_))));
    }
}
