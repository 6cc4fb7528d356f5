use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::warn;

use crate::gallery::Gallery;

const GALLERY_FILE: &str = "gallery.bin";

pub fn gallery_path(store: &Path) -> PathBuf {
    store.join(GALLERY_FILE)
}

/// Load the cached gallery under `store`, if one has been saved.
pub fn load_gallery(store: &Path) -> Result<Option<Gallery>> {
    let file = gallery_path(store);
    if !file.exists() {
        return Ok(None);
    }

    let data = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let gallery: Gallery =
        postcard::from_bytes(&data).with_context(|| format!("decoding {}", file.display()))?;
    gallery
        .validate()
        .with_context(|| format!("validating {}", file.display()))?;
    if gallery.is_empty() {
        warn!("Ignoring empty gallery cache at {}", file.display());
        return Ok(None);
    }
    Ok(Some(gallery))
}

/// Cache `gallery` under `store`. An empty gallery is never written.
pub fn save_gallery(store: &Path, gallery: &Gallery) -> Result<()> {
    if gallery.is_empty() {
        bail!("refusing to cache a gallery with no identities");
    }
    std::fs::create_dir_all(store)?;
    let file = gallery_path(store);
    let data = postcard::to_allocvec(gallery)?;
    std::fs::write(&file, data).with_context(|| format!("writing {}", file.display()))?;
    Ok(())
}

/// Remove the cached gallery. Returns whether there was one.
pub fn purge(store: &Path) -> Result<bool> {
    let file = gallery_path(store);
    if !file.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&file).with_context(|| format!("removing {}", file.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignatureVector;

    #[test]
    fn test_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = dir.path().join("store");
        assert!(load_gallery(&store)?.is_none());

        let gallery = Gallery::from_identities(vec![
            (
                "lennard",
                vec![
                    SignatureVector::new(vec![0.1, 0.2, 0.3]),
                    SignatureVector::new(vec![0.3, 0.2, 0.1]),
                ],
            ),
            ("raj", vec![SignatureVector::new(vec![-1.0, 0.0, 1.0])]),
        ])?;
        save_gallery(&store, &gallery)?;

        let loaded = load_gallery(&store)?.expect("cached gallery");
        assert_eq!(loaded, gallery);
        assert_eq!(loaded.dim(), Some(3));

        assert!(purge(&store)?);
        assert!(!purge(&store)?);
        assert!(load_gallery(&store)?.is_none());
        Ok(())
    }

    #[test]
    fn test_empty_gallery_is_not_cached() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(save_gallery(dir.path(), &Gallery::empty()).is_err());
        assert!(!gallery_path(dir.path()).exists());

        // a stale empty cache reads as no cache at all
        std::fs::write(
            gallery_path(dir.path()),
            postcard::to_allocvec(&Gallery::empty())?,
        )?;
        assert!(load_gallery(dir.path())?.is_none());
        Ok(())
    }

    #[test]
    fn test_garbage_cache_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(gallery_path(dir.path()), [0xff, 0xff, 0xff, 0xff, 0x01])?;
        assert!(load_gallery(dir.path()).is_err());
        Ok(())
    }
}
