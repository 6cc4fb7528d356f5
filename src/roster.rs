use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

/// One label and the ordered locators of its sample images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub label: String,
    pub samples: Vec<PathBuf>,
}

/// The identities to enroll. Labels are unique; adding an existing label
/// appends to its samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L, I, P>(&mut self, label: L, samples: I)
    where
        L: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let label = label.into();
        let samples = samples.into_iter().map(Into::into);
        match self.entries.iter_mut().find(|e| e.label == label) {
            Some(entry) => entry.samples.extend(samples),
            None => self.entries.push(RosterEntry {
                label,
                samples: samples.collect(),
            }),
        }
    }

    pub fn with<L, I, P>(mut self, label: L, samples: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.add(label, samples);
        self
    }

    /// `<dir>/<label>_<i>.<ext>` for `i` in `1..=per_label`.
    pub fn from_pattern<S: AsRef<str>>(
        dir: &Path,
        labels: &[S],
        per_label: usize,
        ext: &str,
    ) -> Self {
        let mut roster = Self::new();
        for label in labels {
            let label = label.as_ref();
            roster.add(
                label,
                (1..=per_label).map(|i| dir.join(format!("{}_{}.{}", label, i, ext))),
            );
        }
        roster
    }

    /// Collect `<label>_<n>.<ext>` files from `dir`, samples ordered by `n`.
    /// When `labels` is non-empty only those labels are kept, and a requested
    /// label without files is still listed so the build reports it as omitted.
    pub fn discover<S: AsRef<str>>(dir: &Path, labels: &[S], ext: &str) -> Result<Self> {
        let mut found: BTreeMap<String, Vec<(u32, PathBuf)>> = labels
            .iter()
            .map(|l| (l.as_ref().to_string(), Vec::new()))
            .collect();
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((label, index)) = stem.rsplit_once('_') else {
                continue;
            };
            let Ok(index) = index.parse::<u32>() else {
                continue;
            };
            if label.is_empty() {
                continue;
            }
            if !labels.is_empty() && !labels.iter().any(|l| l.as_ref() == label) {
                continue;
            }
            found
                .entry(label.to_string())
                .or_default()
                .push((index, path));
        }

        let mut roster = Self::new();
        for (label, mut samples) in found {
            if samples.is_empty() {
                warn!("No samples found for {} in {}", label, dir.display());
            }
            samples.sort();
            roster.add(label, samples.into_iter().map(|(_, p)| p));
        }
        Ok(roster)
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.entries.iter().map(|e| e.samples.len()).sum()
    }
}
