pub mod align;
pub mod detect;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod signature;
pub mod source;
mod tensor;

// Re-export commonly used types
pub use detect::{DetectorParams, Face};
pub use extract::{ExtractionError, SignatureExtractor};
pub use pipeline::OnnxExtractor;
pub use signature::SignatureVector;
pub use source::{FsImageSource, ImageSource, LoadError};
