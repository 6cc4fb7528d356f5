use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::SignatureVector;

/// A known person and the reference signatures collected from their samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    label: String,
    signatures: Vec<SignatureVector>,
}

impl Identity {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reference signatures in sample insertion order. Never empty.
    pub fn signatures(&self) -> &[SignatureVector] {
        &self.signatures
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Read-only set of identities keyed by label.
///
/// Iteration is in lexical label order, then sample order; the matcher's
/// tie-break relies on it. All signatures share one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
    identities: BTreeMap<String, Identity>,
    dim: Option<usize>,
}

impl Gallery {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a gallery from `(label, signatures)` pairs, checking that labels
    /// are unique, no identity is empty and every signature has the same length.
    pub fn from_identities<I, L>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, Vec<SignatureVector>)>,
        L: Into<String>,
    {
        let mut gallery = Self::empty();
        for (label, signatures) in entries {
            gallery.commit(label.into(), signatures)?;
        }
        Ok(gallery)
    }

    pub(crate) fn commit(&mut self, label: String, signatures: Vec<SignatureVector>) -> Result<()> {
        if self.identities.contains_key(&label) {
            return Err(Error::InvalidGallery(format!("duplicate label {:?}", label)));
        }
        let Some(first) = signatures.first() else {
            return Err(Error::InvalidGallery(format!(
                "identity {:?} has no signatures",
                label
            )));
        };
        let dim = self.dim.unwrap_or(first.len());
        if let Some(bad) = signatures.iter().find(|s| s.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: bad.len(),
            });
        }
        self.dim = Some(dim);
        self.identities
            .insert(label.clone(), Identity { label, signatures });
        Ok(())
    }

    /// Re-check the invariants, e.g. after deserializing.
    pub fn validate(&self) -> Result<()> {
        let mut dims = self
            .identities
            .values()
            .flat_map(|id| id.signatures.iter().map(SignatureVector::len));
        let actual = dims.next();
        if let Some(expected) = actual {
            if let Some(got) = dims.find(|d| *d != expected) {
                return Err(Error::DimensionMismatch { expected, got });
            }
        }
        if actual != self.dim {
            return Err(Error::InvalidGallery(format!(
                "recorded dimension {:?} does not match signatures ({:?})",
                self.dim, actual
            )));
        }
        for (key, identity) in &self.identities {
            if key != &identity.label {
                return Err(Error::InvalidGallery(format!(
                    "key {:?} holds identity {:?}",
                    key, identity.label
                )));
            }
            if identity.signatures.is_empty() {
                return Err(Error::InvalidGallery(format!(
                    "identity {:?} has no signatures",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Length of every stored signature, `None` for an empty gallery.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&Identity> {
        self.identities.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.identities.contains_key(label)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.identities.keys().map(String::as_str)
    }

    /// Total number of reference signatures.
    pub fn signature_count(&self) -> usize {
        self.identities.values().map(Identity::len).sum()
    }
}
