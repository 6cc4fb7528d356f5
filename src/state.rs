use std::sync::Arc;

use log::{error, info};
use parking_lot::{Mutex, RwLock};

use crate::builder::{BuildReport, GalleryBuilder};
use crate::error::{Error, Result};
use crate::gallery::Gallery;
use crate::matcher::{MatchResult, Matcher};
use crate::roster::Roster;
use crate::SignatureVector;

/// Where the shared gallery is in its lifecycle.
#[derive(Debug, Clone)]
pub enum GalleryState {
    Uninitialized,
    /// A build is running; `previous` keeps serving matches meanwhile.
    Building { previous: Option<Arc<Gallery>> },
    Ready(Arc<Gallery>),
    Failed(String),
}

impl GalleryState {
    /// The gallery matches should use right now, if any.
    pub fn gallery(&self) -> Option<Arc<Gallery>> {
        match self {
            GalleryState::Ready(g) => Some(Arc::clone(g)),
            GalleryState::Building { previous } => previous.clone(),
            GalleryState::Uninitialized | GalleryState::Failed(_) => None,
        }
    }
}

/// Owns the current gallery and swaps in rebuilt ones atomically.
///
/// Matches take an `Arc` snapshot, so a rebuild never shows them a
/// half-built gallery. Rebuilds are serialized.
pub struct GalleryHandle {
    state: RwLock<GalleryState>,
    rebuild: Mutex<()>,
}

impl Default for GalleryHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryHandle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GalleryState::Uninitialized),
            rebuild: Mutex::new(()),
        }
    }

    /// A handle that is immediately ready, e.g. from a cached gallery.
    pub fn with_gallery(gallery: Gallery) -> Self {
        Self {
            state: RwLock::new(GalleryState::Ready(Arc::new(gallery))),
            rebuild: Mutex::new(()),
        }
    }

    pub fn state(&self) -> GalleryState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), GalleryState::Ready(_))
    }

    pub fn snapshot(&self) -> Option<Arc<Gallery>> {
        self.state.read().gallery()
    }

    /// Build a new gallery and swap it in once complete.
    ///
    /// On failure the previous gallery, if there was one, stays in service;
    /// otherwise the handle ends up `Failed`.
    pub fn rebuild(&self, builder: &GalleryBuilder<'_>, roster: &Roster) -> Result<BuildReport> {
        let _serial = self.rebuild.lock();
        let previous = self.snapshot();
        *self.state.write() = GalleryState::Building {
            previous: previous.clone(),
        };

        match builder.build(roster) {
            Ok((gallery, report)) => {
                info!("Installing gallery with {} identities", gallery.len());
                *self.state.write() = GalleryState::Ready(Arc::new(gallery));
                Ok(report)
            }
            Err(e) => {
                error!("Gallery build failed: {}", e);
                *self.state.write() = match previous {
                    Some(g) => GalleryState::Ready(g),
                    None => GalleryState::Failed(e.to_string()),
                };
                Err(e)
            }
        }
    }

    /// Match against the gallery currently in service.
    pub fn match_query(&self, matcher: &Matcher, query: &SignatureVector) -> Result<MatchResult> {
        let gallery = self.snapshot().ok_or(Error::GalleryNotReady)?;
        matcher.match_query(gallery.as_ref(), query)
    }
}
