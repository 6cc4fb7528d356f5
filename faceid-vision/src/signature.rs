use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Fixed-length face descriptor produced by a [`crate::SignatureExtractor`].
///
/// Vectors are only comparable when their lengths are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureVector {
    values: Array1<f32>,
}

impl SignatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values: Array1::from_vec(values),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn view(&self) -> ArrayView1<'_, f32> {
        self.values.view()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.values.iter()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.values.to_vec()
    }

    /// Scale to unit L2 norm. Zero vectors are returned unchanged.
    pub fn l2_normalized(mut self) -> Self {
        let norm = self.values.dot(&self.values).sqrt();
        if norm > 0.0 {
            self.values.mapv_inplace(|x| x / norm);
        }
        self
    }
}

impl From<Vec<f32>> for SignatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

impl From<&[f32]> for SignatureVector {
    fn from(values: &[f32]) -> Self {
        Self::new(values.to_vec())
    }
}
