//! Runs normalization and OCR on one local photograph, printing the digits.
//! Handy for checking a tesseract installation on a new host.
//!
//! Uses the `[ocr]` and `[normalize]` sections of the service config
//! (`METER_CONFIG`) so the result matches what the service would see.

use anyhow::{bail, Context, Result};
use meter_service::{
    config::{AppConfig, NormalizeConfig, OcrConfig},
    observability,
    ocr::{DigitExtractor, Normalizer, TesseractCli},
};
use std::{env, fs, sync::Arc};

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: recognize_meter <image_path> [tesseract_bin]");
    }

    let (mut ocr, normalize) = match AppConfig::load() {
        Ok(cfg) => (cfg.ocr, cfg.normalize),
        Err(e) => {
            tracing::warn!(error = ?e, "service config unavailable, using OCR defaults");
            (OcrConfig::default(), NormalizeConfig::default())
        }
    };
    if let Some(bin) = args.get(2) {
        ocr.tesseract_bin = bin.into();
    }

    let payload = fs::read(&args[1]).with_context(|| format!("reading {}", args[1]))?;
    let normalized = Normalizer::new(normalize.options()).normalize(&payload)?;
    let (width, height) = normalized.dimensions();
    tracing::info!(width, height, max_width = normalize.max_width, contrast = normalize.contrast, "normalized");

    let extractor = DigitExtractor::new(Arc::new(TesseractCli::from_config(&ocr)));
    let recognition = extractor.extract(&normalized)?;

    if recognition.low_confidence() {
        println!("(no digits recognized; raw: {:?})", recognition.raw_text.trim());
    } else {
        println!("{}", recognition.digits);
    }

    Ok(())
}
