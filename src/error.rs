use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors of gallery building and matching.
///
/// Per-sample failures never surface here; they are collected in
/// [`crate::builder::BuildReport`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("face models unavailable: {0}")]
    ModelsUnavailable(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("gallery is not ready")]
    GalleryNotReady,

    #[error("invalid gallery: {0}")]
    InvalidGallery(String),
}
