use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::gallery::Gallery;
use crate::roster::Roster;
use crate::{ExtractionError, ImageSource, LoadError, SignatureExtractor, SignatureVector};

/// Why a single sample did not contribute a signature.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Extract(#[from] ExtractionError),

    #[error("signature has {got} dimensions, gallery uses {expected}")]
    Dimension { expected: usize, got: usize },
}

#[derive(Debug)]
pub struct SampleFailure {
    pub label: String,
    pub locator: PathBuf,
    pub reason: SampleError,
}

/// What happened during one build, besides the gallery itself.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Accepted signature count per committed label.
    pub accepted: BTreeMap<String, usize>,
    /// Samples that were skipped.
    pub failures: Vec<SampleFailure>,
    /// Labels left out because none of their samples produced a signature.
    pub omitted: Vec<String>,
}

impl BuildReport {
    pub fn identity_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.omitted.is_empty()
    }
}

/// Builds a [`Gallery`] from a [`Roster`] using the given collaborators.
pub struct GalleryBuilder<'a> {
    source: &'a dyn ImageSource,
    extractor: &'a dyn SignatureExtractor,
    workers: usize,
    dim: Option<usize>,
}

impl<'a> GalleryBuilder<'a> {
    pub fn new(source: &'a dyn ImageSource, extractor: &'a dyn SignatureExtractor) -> Self {
        Self {
            source,
            extractor,
            workers: 1,
            dim: None,
        }
    }

    /// Maximum concurrent extractions. `0` lets rayon pick, `1` runs inline.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Require every signature to have this length.
    pub fn dimension(mut self, dim: usize) -> Self {
        self.dim = Some(dim);
        self
    }

    /// Extract every sample and commit each label that kept at least one
    /// signature.
    ///
    /// Only fails with [`Error::ModelsUnavailable`]: per-sample problems are
    /// logged and listed in the returned [`BuildReport`].
    pub fn build(&self, roster: &Roster) -> Result<(Gallery, BuildReport)> {
        self.extractor
            .check_ready()
            .map_err(|e| Error::ModelsUnavailable(e.to_string()))?;

        info!(
            "Building gallery: {} identities, {} samples",
            roster.len(),
            roster.sample_count()
        );

        let jobs: Vec<(usize, &Path)> = roster
            .entries()
            .iter()
            .enumerate()
            .flat_map(|(i, entry)| entry.samples.iter().map(move |p| (i, p.as_path())))
            .collect();
        let outcomes = self.extract_all(&jobs);

        if let Some(msg) = outcomes.iter().find_map(|outcome| match outcome {
            Err(SampleError::Extract(ExtractionError::ModelLoad(msg))) => Some(msg.clone()),
            _ => None,
        }) {
            return Err(Error::ModelsUnavailable(msg));
        }

        let mut pending: Vec<Vec<(&Path, std::result::Result<SignatureVector, SampleError>)>> =
            roster.entries().iter().map(|_| Vec::new()).collect();
        for ((idx, path), outcome) in jobs.into_iter().zip(outcomes) {
            pending[idx].push((path, outcome));
        }

        // Commit in label order so the first accepted signature, and with it
        // the gallery dimension, does not depend on roster order.
        let entries = roster.entries();
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| entries[a].label.cmp(&entries[b].label));

        let mut dim = self.dim;
        let mut gallery = Gallery::empty();
        let mut report = BuildReport::default();

        for idx in order {
            let label = &entries[idx].label;
            let mut accepted = Vec::new();
            for (path, outcome) in pending[idx].drain(..) {
                match outcome.and_then(|sig| check_dimension(&mut dim, sig)) {
                    Ok(sig) => accepted.push(sig),
                    Err(reason) => {
                        warn!("Skipping sample {} for {}: {}", path.display(), label, reason);
                        report.failures.push(SampleFailure {
                            label: label.clone(),
                            locator: path.to_path_buf(),
                            reason,
                        });
                    }
                }
            }

            if accepted.is_empty() {
                warn!("No valid face signatures found for {}; identity omitted", label);
                report.omitted.push(label.clone());
                continue;
            }
            debug!("Committing {} with {} signature(s)", label, accepted.len());
            report.accepted.insert(label.clone(), accepted.len());
            gallery.commit(label.clone(), accepted)?;
        }

        info!(
            "Gallery ready: {} identities, {} signatures ({} samples skipped, {} identities omitted)",
            gallery.len(),
            gallery.signature_count(),
            report.failures.len(),
            report.omitted.len()
        );
        Ok((gallery, report))
    }

    fn extract_all(
        &self,
        jobs: &[(usize, &Path)],
    ) -> Vec<std::result::Result<SignatureVector, SampleError>> {
        let run = |&(_, path): &(usize, &Path)| self.extract_one(path);
        if self.workers == 1 || jobs.len() < 2 {
            return jobs.iter().map(run).collect();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| jobs.par_iter().map(run).collect()),
            Err(e) => {
                warn!("Failed to start extraction workers, running inline: {}", e);
                jobs.iter().map(run).collect()
            }
        }
    }

    fn extract_one(&self, path: &Path) -> std::result::Result<SignatureVector, SampleError> {
        let image = self.source.load_image(path)?;
        let signature = self.extractor.extract_signature(&image)?;
        debug!(
            "Extracted {}-d signature from {}",
            signature.len(),
            path.display()
        );
        Ok(signature)
    }
}

fn check_dimension(
    dim: &mut Option<usize>,
    signature: SignatureVector,
) -> std::result::Result<SignatureVector, SampleError> {
    let expected = *dim.get_or_insert(signature.len());
    if signature.len() != expected {
        return Err(SampleError::Dimension {
            expected,
            got: signature.len(),
        });
    }
    Ok(signature)
}
