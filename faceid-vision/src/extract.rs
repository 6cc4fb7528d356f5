use image::DynamicImage;
use thiserror::Error;

use crate::SignatureVector;

/// Failure modes of a signature extractor.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The image contains no detectable face.
    #[error("no face detected")]
    NoFaceDetected,

    /// The backing models could not be loaded. Nothing can be extracted.
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// The backend failed on this particular image.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Turns an image into a single face signature.
///
/// Implementations must be idempotent and free of observable side effects so
/// that samples can be processed concurrently.
pub trait SignatureExtractor: Send + Sync {
    /// Reports whether the backend is usable at all.
    fn check_ready(&self) -> Result<(), ExtractionError> {
        Ok(())
    }

    /// Extract the descriptor of one face in `image`.
    fn extract_signature(&self, image: &DynamicImage) -> Result<SignatureVector, ExtractionError>;
}

impl<T: SignatureExtractor + ?Sized> SignatureExtractor for Box<T> {
    fn check_ready(&self) -> Result<(), ExtractionError> {
        (**self).check_ready()
    }

    fn extract_signature(&self, image: &DynamicImage) -> Result<SignatureVector, ExtractionError> {
        (**self).extract_signature(image)
    }
}
