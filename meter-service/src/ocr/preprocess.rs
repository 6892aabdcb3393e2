use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat};
use tempfile::NamedTempFile;

use crate::IngestError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    /// Wider photographs are scaled down to this width, keeping aspect ratio.
    pub max_width: u32,
    /// Contrast adjustment in (-1, 1); positive values stretch away from mid-grey.
    pub contrast: f32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_width: 800,
            contrast: 0.5,
        }
    }
}

/// A normalized photograph staged on disk for the OCR engine.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct NormalizedImage {
    file: NamedTempFile,
    width: u32,
    height: u32,
}

impl NormalizedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Prepares meter photographs for constrained digit recognition:
/// downscale, greyscale, then a fixed contrast stretch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    /// Decodes and transforms `payload` without touching the filesystem.
    pub fn prepare(&self, payload: &[u8]) -> Result<GrayImage, IngestError> {
        if payload.is_empty() {
            return Err(IngestError::InvalidImage("empty image payload".to_string()));
        }

        let decoded = image::load_from_memory(payload)
            .map_err(|e| IngestError::InvalidImage(format!("cannot decode image: {e}")))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(IngestError::InvalidImage("image has no pixels".to_string()));
        }

        let mut grey = downscale(decoded, self.options.max_width).to_luma8();
        stretch_contrast(&mut grey, self.options.contrast);
        Ok(grey)
    }

    /// Runs [`Normalizer::prepare`] and writes the result to a temporary PNG.
    pub fn normalize(&self, payload: &[u8]) -> Result<NormalizedImage, IngestError> {
        let grey = self.prepare(payload)?;

        // Staging failures are host faults, not a problem with the photograph.
        let file = tempfile::Builder::new()
            .prefix("meter-normalized-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| IngestError::OcrEngineUnavailable(format!("cannot stage normalized image: {e}")))?;
        grey.save_with_format(file.path(), ImageFormat::Png)
            .map_err(|e| IngestError::OcrEngineUnavailable(format!("cannot write normalized image: {e}")))?;

        tracing::debug!(
            width = grey.width(),
            height = grey.height(),
            path = %file.path().display(),
            "normalized meter image"
        );

        Ok(NormalizedImage {
            width: grey.width(),
            height: grey.height(),
            file,
        })
    }
}

fn downscale(img: DynamicImage, max_width: u32) -> DynamicImage {
    if img.width() <= max_width {
        return img;
    }
    let height = (u64::from(img.height()) * u64::from(max_width) / u64::from(img.width())).max(1);
    let height = u32::try_from(height).unwrap_or(u32::MAX);
    img.resize_exact(max_width, height, FilterType::Triangle)
}

/// Linear contrast stretch around mid-grey.
///
/// `amount` in (-1, 1) maps to a slope of `(1 + amount) / (1 - amount)`, so
/// 0.5 triples the distance of every pixel from 127.
pub fn stretch_contrast(img: &mut GrayImage, amount: f32) {
    let amount = amount.clamp(-0.99, 0.99);
    let slope = (1.0 + amount) / (1.0 - amount);

    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        let stretched = ((v as f32 - 127.0) * slope + 127.0).floor();
        *out = stretched.clamp(0.0, 255.0) as u8;
    }

    for pixel in img.pixels_mut() {
        pixel[0] = lut[usize::from(pixel[0])];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode_png(img: DynamicImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn empty_payload_is_invalid() {
        let res = Normalizer::default().prepare(&[]);
        assert!(matches!(res, Err(IngestError::InvalidImage(_))));
    }

    #[test]
    fn corrupt_payload_is_invalid() {
        let res = Normalizer::default().prepare(b"definitely not a photograph");
        assert!(matches!(res, Err(IngestError::InvalidImage(_))));
    }

    #[test]
    fn wide_images_are_downscaled_keeping_aspect() {
        let img = RgbImage::from_pixel(1600, 400, Rgb([200, 10, 10]));
        let payload = encode_png(DynamicImage::ImageRgb8(img));

        let grey = Normalizer::default().prepare(&payload).unwrap();
        assert_eq!(grey.dimensions(), (800, 200));
    }

    #[test]
    fn narrow_images_keep_their_size() {
        let img = RgbImage::from_pixel(320, 240, Rgb([90, 90, 90]));
        let payload = encode_png(DynamicImage::ImageRgb8(img));

        let grey = Normalizer::default().prepare(&payload).unwrap();
        assert_eq!(grey.dimensions(), (320, 240));
    }

    #[test]
    fn contrast_pushes_pixels_away_from_mid_grey() {
        let mut img: GrayImage = ImageBuffer::from_fn(4, 1, |x, _| Luma([[40u8, 100, 127, 200][x as usize]]));
        stretch_contrast(&mut img, 0.5);

        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 0)[0], 46);
        assert_eq!(img.get_pixel(2, 0)[0], 127);
        assert_eq!(img.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn normalize_is_deterministic() {
        let img = RgbImage::from_fn(64, 32, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 128]));
        let payload = encode_png(DynamicImage::ImageRgb8(img));
        let normalizer = Normalizer::default();

        assert_eq!(normalizer.prepare(&payload).unwrap(), normalizer.prepare(&payload).unwrap());
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let payload = encode_png(DynamicImage::ImageRgb8(img));

        let staged = Normalizer::default().normalize(&payload).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }
}
