pub mod builder;
pub mod config;
pub mod error;
pub mod gallery;
pub mod matcher;
pub mod roster;
pub mod state;
pub mod storage;

// Re-export vision types for convenience
pub use faceid_vision::{
    ExtractionError, Face, FsImageSource, ImageSource, LoadError, OnnxExtractor,
    SignatureExtractor, SignatureVector,
};

pub use builder::{BuildReport, GalleryBuilder};
pub use error::{Error, Result};
pub use gallery::{Gallery, Identity};
pub use matcher::{match_signature, MatchResult, Matcher, NeighborIndex};
pub use roster::Roster;
pub use state::{GalleryHandle, GalleryState};
