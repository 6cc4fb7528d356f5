use std::path::{Path, PathBuf};

use faceid::{ExtractionError, SignatureExtractor, SignatureVector};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Reads the red channel of the first row as the signature. An all-black row
/// is treated as an image without a face.
pub struct PixelExtractor;

impl SignatureExtractor for PixelExtractor {
    fn extract_signature(&self, image: &DynamicImage) -> Result<SignatureVector, ExtractionError> {
        let values: Vec<f32> = (0..image.width())
            .map(|x| image.get_pixel(x, 0)[0] as f32 / 255.0)
            .collect();
        if values.iter().all(|v| *v == 0.0) {
            return Err(ExtractionError::NoFaceDetected);
        }
        Ok(SignatureVector::new(values))
    }
}

/// Extractor whose models never loaded.
pub struct Unloaded;

impl SignatureExtractor for Unloaded {
    fn check_ready(&self) -> Result<(), ExtractionError> {
        Err(ExtractionError::ModelLoad("no weights in /nonexistent".into()))
    }

    fn extract_signature(&self, _image: &DynamicImage) -> Result<SignatureVector, ExtractionError> {
        Err(ExtractionError::ModelLoad("no weights in /nonexistent".into()))
    }
}

/// Write a one-row PNG whose red channel holds `values`.
pub fn write_sample(dir: &Path, name: &str, values: &[u8]) -> PathBuf {
    let mut img = RgbImage::new(values.len() as u32, 1);
    for (x, v) in values.iter().enumerate() {
        img.put_pixel(x as u32, 0, Rgb([*v, 0, 0]));
    }
    let path = dir.join(name);
    img.save(&path).expect("write sample image");
    path
}

/// The signature `PixelExtractor` produces for `values`.
pub fn signature_of(values: &[u8]) -> SignatureVector {
    SignatureVector::new(values.iter().map(|v| *v as f32 / 255.0).collect())
}
