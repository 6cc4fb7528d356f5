use ndarray::{ArrayView1, Zip};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::gallery::Gallery;
use crate::SignatureVector;

pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Shown to users when no identity is close enough.
pub const UNKNOWN_PERSON: &str = "Unknown Person";

/// Outcome of matching one query signature against a gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchResult {
    Matched { label: String, confidence: f32 },
    Unmatched { best_distance: f32 },
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            MatchResult::Matched { label, .. } => Some(label),
            MatchResult::Unmatched { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.label().unwrap_or(UNKNOWN_PERSON)
    }
}

/// Closest reference owned by `label`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor<'g> {
    pub label: &'g str,
    pub distance: f32,
}

/// Nearest-neighbour lookup over reference signatures.
///
/// [`Gallery`] implements it with an exhaustive scan; an approximate index can
/// stand in for large galleries. Callers guarantee `query.len() == dim()`.
pub trait NeighborIndex {
    /// Length of the indexed signatures, `None` when nothing is indexed.
    fn dim(&self) -> Option<usize>;

    /// The single closest reference. Ties go to the first in label order,
    /// then insertion order.
    fn nearest(&self, query: &SignatureVector) -> Option<Neighbor<'_>>;

    /// Up to `k` identities ordered by their best distance.
    fn rank(&self, query: &SignatureVector, k: usize) -> Vec<Neighbor<'_>>;
}

impl NeighborIndex for Gallery {
    fn dim(&self) -> Option<usize> {
        Gallery::dim(self)
    }

    fn nearest(&self, query: &SignatureVector) -> Option<Neighbor<'_>> {
        let q = query.view();
        let mut best: Option<Neighbor<'_>> = None;
        for identity in self.identities() {
            for reference in identity.signatures() {
                let distance = euclidean(q, reference.view());
                // strict comparison keeps the earliest of equal distances; NaN never wins
                if best.map_or(!distance.is_nan(), |b| distance < b.distance) {
                    best = Some(Neighbor {
                        label: identity.label(),
                        distance,
                    });
                }
            }
        }
        best
    }

    fn rank(&self, query: &SignatureVector, k: usize) -> Vec<Neighbor<'_>> {
        let q = query.view();
        let mut ranked: Vec<Neighbor<'_>> = self
            .identities()
            .map(|identity| Neighbor {
                label: identity.label(),
                distance: identity
                    .signatures()
                    .iter()
                    .map(|r| euclidean(q, r.view()))
                    .fold(f32::NAN, f32::min),
            })
            .collect();
        // stable: equal distances keep label order
        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        ranked.truncate(k);
        ranked
    }
}

/// Euclidean distance between two signatures of equal length.
pub fn euclidean_distance(a: &SignatureVector, b: &SignatureVector) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(euclidean(a.view(), b.view()))
}

fn euclidean(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    Zip::from(a)
        .and(b)
        .fold(0.0f32, |acc, x, y| {
            let d = x - y;
            acc + d * d
        })
        .sqrt()
}

/// `(1 - distance) * 100`, clamped to `[0, 100]`.
pub fn confidence(distance: f32) -> f32 {
    ((1.0 - distance) * 100.0).clamp(0.0, 100.0)
}

/// Classifies the nearest reference against a distance threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matcher {
    threshold: f32,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Matcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Match `query` against `index`.
    ///
    /// An empty index yields `Unmatched` with an infinite distance; a query
    /// no reference can be compared with (NaN components) yields `Unmatched`
    /// with a NaN distance. The only error is [`Error::DimensionMismatch`].
    pub fn match_query<I>(&self, index: &I, query: &SignatureVector) -> Result<MatchResult>
    where
        I: NeighborIndex + ?Sized,
    {
        let Some(dim) = index.dim() else {
            return Ok(MatchResult::Unmatched {
                best_distance: f32::INFINITY,
            });
        };
        check_dimension(dim, query)?;

        Ok(match index.nearest(query) {
            Some(n) if n.distance < self.threshold => MatchResult::Matched {
                label: n.label.to_string(),
                confidence: confidence(n.distance),
            },
            Some(n) => MatchResult::Unmatched {
                best_distance: n.distance,
            },
            None => MatchResult::Unmatched {
                best_distance: f32::NAN,
            },
        })
    }

    /// The `k` closest identities, for diagnostics.
    pub fn rank<'g, I>(
        &self,
        index: &'g I,
        query: &SignatureVector,
        k: usize,
    ) -> Result<Vec<Neighbor<'g>>>
    where
        I: NeighborIndex + ?Sized,
    {
        match index.dim() {
            Some(dim) => {
                check_dimension(dim, query)?;
                Ok(index.rank(query, k))
            }
            None => Ok(Vec::new()),
        }
    }
}

fn check_dimension(expected: usize, query: &SignatureVector) -> Result<()> {
    if query.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            got: query.len(),
        });
    }
    Ok(())
}

/// Match with a one-off threshold.
pub fn match_signature(
    gallery: &Gallery,
    query: &SignatureVector,
    threshold: f32,
) -> Result<MatchResult> {
    Matcher::new(threshold).match_query(gallery, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sig(values: &[f32]) -> SignatureVector {
        SignatureVector::from(values)
    }

    fn random_sig(rng: &mut StdRng, dim: usize) -> SignatureVector {
        SignatureVector::new((0..dim).map(|_| rng.gen_range(-0.3..0.3)).collect())
    }

    fn random_gallery(rng: &mut StdRng, dim: usize) -> Gallery {
        Gallery::from_identities(["lennard", "raj", "sheldon"].map(|label| {
            let n = rng.gen_range(1..5);
            (label, (0..n).map(|_| random_sig(rng, dim)).collect())
        }))
        .unwrap()
    }

    #[test]
    fn test_euclidean_distance() {
        let d = euclidean_distance(&sig(&[0.0, 0.0]), &sig(&[3.0, 4.0])).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
        assert!(matches!(
            euclidean_distance(&sig(&[0.0]), &sig(&[0.0, 1.0])),
            Err(Error::DimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(confidence(0.0), 100.0);
        assert!((confidence(0.25) - 75.0).abs() < 1e-4);
        assert_eq!(confidence(1.5), 0.0);
        assert_eq!(confidence(-0.5), 100.0);
    }

    #[test]
    fn test_empty_gallery_is_unmatched() {
        let gallery = Gallery::empty();
        for threshold in [0.0, 0.6, 100.0] {
            let result = match_signature(&gallery, &sig(&[1.0, 2.0, 3.0]), threshold).unwrap();
            assert_eq!(
                result,
                MatchResult::Unmatched {
                    best_distance: f32::INFINITY
                }
            );
        }
    }

    #[test]
    fn test_exact_reference_scores_100() {
        let mut rng = StdRng::seed_from_u64(7);
        let gallery = random_gallery(&mut rng, 16);
        for identity in gallery.identities() {
            for reference in identity.signatures() {
                let result = match_signature(&gallery, reference, 1e-6).unwrap();
                assert!(result.is_match());
                if let MatchResult::Matched { confidence, .. } = result {
                    assert_eq!(confidence, 100.0);
                }
            }
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let gallery = Gallery::from_identities(vec![("raj", vec![sig(&[0.0, 0.0])])]).unwrap();
        let query = sig(&[0.0, 0.5]);
        assert!(!match_signature(&gallery, &query, 0.5).unwrap().is_match());
        assert_eq!(
            match_signature(&gallery, &query, 0.51).unwrap(),
            MatchResult::Matched {
                label: "raj".into(),
                confidence: 50.0
            }
        );
    }

    #[test]
    fn test_unmatched_reports_best_distance() {
        let gallery = Gallery::from_identities(vec![
            ("raj", vec![sig(&[3.0, 4.0])]),
            ("sheldon", vec![sig(&[0.0, 2.0]), sig(&[6.0, 8.0])]),
        ])
        .unwrap();
        let result = Matcher::default().match_query(&gallery, &sig(&[0.0, 0.0])).unwrap();
        assert_eq!(result, MatchResult::Unmatched { best_distance: 2.0 });
        assert_eq!(result.display_name(), UNKNOWN_PERSON);
    }

    #[test]
    fn test_ties_go_to_first_label() {
        let gallery = Gallery::from_identities(vec![
            ("sheldon", vec![sig(&[0.0, -0.1])]),
            ("lennard", vec![sig(&[0.1, 0.0])]),
            ("raj", vec![sig(&[0.0, 0.1])]),
        ])
        .unwrap();
        for _ in 0..10 {
            let result = Matcher::default().match_query(&gallery, &sig(&[0.0, 0.0])).unwrap();
            assert_eq!(result.label(), Some("lennard"));
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut rng = StdRng::seed_from_u64(11);
        let gallery = random_gallery(&mut rng, 8);
        for len in [0, 1, 7, 9, 128] {
            let err = Matcher::default()
                .match_query(&gallery, &random_sig(&mut rng, len))
                .unwrap_err();
            assert!(matches!(err, Error::DimensionMismatch { expected: 8, got } if got == len));
        }
        assert!(Matcher::default()
            .match_query(&gallery, &random_sig(&mut rng, 8))
            .is_ok());
    }

    #[test]
    fn test_deterministic_and_monotonic_in_threshold() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let gallery = random_gallery(&mut rng, 8);
            let query = random_sig(&mut rng, 8);
            let mut was_match = false;
            for step in 0..=20 {
                let threshold = step as f32 * 0.1;
                let first = match_signature(&gallery, &query, threshold).unwrap();
                let second = match_signature(&gallery, &query, threshold).unwrap();
                assert_eq!(first, second);
                if was_match {
                    assert!(first.is_match(), "match lost when raising threshold");
                }
                was_match = first.is_match();
            }
        }
    }

    #[test]
    fn test_nan_never_wins() {
        let gallery = Gallery::from_identities(vec![
            ("lennard", vec![sig(&[f32::NAN, 0.0])]),
            ("raj", vec![sig(&[0.2, 0.0])]),
        ])
        .unwrap();
        let result = Matcher::default().match_query(&gallery, &sig(&[0.0, 0.0])).unwrap();
        assert_eq!(result.label(), Some("raj"));
    }

    #[test]
    fn test_nan_query_is_not_an_empty_gallery() {
        let gallery =
            Gallery::from_identities(vec![("raj", vec![sig(&[0.2, 0.0])])]).unwrap();
        match Matcher::default()
            .match_query(&gallery, &sig(&[f32::NAN, 0.0]))
            .unwrap()
        {
            MatchResult::Unmatched { best_distance } => assert!(best_distance.is_nan()),
            other => panic!("expected unmatched, got {:?}", other),
        }

        match Matcher::default()
            .match_query(&Gallery::empty(), &sig(&[f32::NAN, 0.0]))
            .unwrap()
        {
            MatchResult::Unmatched { best_distance } => assert!(best_distance.is_infinite()),
            other => panic!("expected unmatched, got {:?}", other),
        }
    }

    #[test]
    fn test_rank() {
        let gallery = Gallery::from_identities(vec![
            ("lennard", vec![sig(&[5.0, 0.0]), sig(&[1.0, 0.0])]),
            ("raj", vec![sig(&[0.0, 3.0])]),
            ("sheldon", vec![sig(&[0.0, 0.5])]),
        ])
        .unwrap();
        let ranked = Matcher::default()
            .rank(&gallery, &sig(&[0.0, 0.0]), 2)
            .unwrap();
        let labels: Vec<&str> = ranked.iter().map(|n| n.label).collect();
        assert_eq!(labels, vec!["sheldon", "lennard"]);
        assert!((ranked[1].distance - 1.0).abs() < 1e-6);
        assert!(Matcher::default()
            .rank(&Gallery::empty(), &sig(&[0.0]), 3)
            .unwrap()
            .is_empty());
    }
}
