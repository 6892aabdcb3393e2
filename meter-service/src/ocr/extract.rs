use std::sync::Arc;

use meter_client::domain::ReadingValue;
use serde::Serialize;

use super::{
    engine::{OcrEngine, RecognitionRequest, SINGLE_LINE},
    preprocess::NormalizedImage,
};
use crate::IngestError;

/// The only characters the engine may emit for a meter face.
pub const DIGIT_WHITELIST: &str = "0123456789";

/// Outcome of one recognition call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recognition {
    pub raw_text: String,
    /// Candidate reading: every ASCII digit of `raw_text`, in order.
    pub digits: String,
}

impl Recognition {
    pub fn from_raw(raw_text: String) -> Self {
        let digits = sanitize_digits(&raw_text);
        Self { raw_text, digits }
    }

    /// True when the digits cannot stand as a reading and a person has to
    /// type the value in.
    pub fn low_confidence(&self) -> bool {
        ReadingValue::parse(&self.digits).is_err()
    }
}

/// Strips everything but ASCII digits instead of rejecting partial garbage.
pub fn sanitize_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Runs the OCR engine in single-line, digits-only mode.
#[derive(Clone)]
pub struct DigitExtractor {
    engine: Arc<dyn OcrEngine>,
}

impl DigitExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn request() -> RecognitionRequest {
        RecognitionRequest {
            whitelist: DIGIT_WHITELIST,
            page_segmentation: SINGLE_LINE,
        }
    }

    pub fn extract(&self, image: &NormalizedImage) -> Result<Recognition, IngestError> {
        let raw = self.engine.recognize(image.path(), &Self::request())?;
        let recognition = Recognition::from_raw(raw);

        tracing::debug!(
            raw = %recognition.raw_text.trim(),
            digits = %recognition.digits,
            "digit extraction finished"
        );

        Ok(recognition)
    }
}
