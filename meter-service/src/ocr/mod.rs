//! Photograph → digits: normalization, the OCR engine seam, and the digit
//! extractor that constrains and sanitizes recognition output.

pub mod engine;
pub mod extract;
pub mod preprocess;

pub use engine::{OcrEngine, RecognitionRequest, TesseractCli, SINGLE_LINE};
pub use extract::{sanitize_digits, DigitExtractor, Recognition, DIGIT_WHITELIST};
pub use preprocess::{NormalizeOptions, NormalizedImage, Normalizer};
