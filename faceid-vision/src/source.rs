use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageError};
use thiserror::Error;

/// Failure modes of an image source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported image format: {}", path.display())]
    UnsupportedFormat {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("unreadable image {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// Resolves a sample locator into decoded pixels.
pub trait ImageSource: Send + Sync {
    fn load_image(&self, locator: &Path) -> Result<DynamicImage, LoadError>;
}

/// Loads images from the local filesystem, format guessed from the extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageSource;

impl ImageSource for FsImageSource {
    fn load_image(&self, locator: &Path) -> Result<DynamicImage, LoadError> {
        if !locator.exists() {
            return Err(LoadError::NotFound(locator.to_path_buf()));
        }
        image::open(locator).map_err(|err| classify(locator, err))
    }
}

fn classify(path: &Path, err: ImageError) -> LoadError {
    let path = path.to_path_buf();
    match err {
        ImageError::IoError(ref io) if io.kind() == ErrorKind::NotFound => LoadError::NotFound(path),
        ImageError::Unsupported(_) => LoadError::UnsupportedFormat { path, source: err },
        other => LoadError::Unreadable {
            path,
            source: other,
        },
    }
}
