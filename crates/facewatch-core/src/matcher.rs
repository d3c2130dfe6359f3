//! Nearest-neighbour identity lookup against the registry.

use crate::registry::Registry;
use crate::types::Embedding;

/// Label assigned to faces that match no enrolled identity.
pub const UNKNOWN: &str = "Unknown";

/// Maximum embedding distance accepted as the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

/// Result of matching one observed embedding against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest registry entry (`None` for an empty registry).
    pub distance: Option<f32>,
    /// Registry index of the matched entry (if any).
    pub index: Option<usize>,
    /// Name of the matched entry (if any).
    pub name: Option<String>,
}

impl MatchResult {
    pub fn unknown(distance: Option<f32>) -> Self {
        Self {
            matched: false,
            distance,
            index: None,
            name: None,
        }
    }

    /// Display label: the matched name, or [`UNKNOWN`].
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN)
    }
}

/// Strategy for resolving an observed embedding to an enrolled identity.
pub trait Matcher {
    fn identify(
        &self,
        probe: &Embedding,
        registry: &Registry,
        distance: &dyn Fn(&Embedding, &Embedding) -> f32,
    ) -> MatchResult;
}

/// Picks the single closest registry entry, then accepts it only if it lies
/// within `tolerance`. A second entry that is also within tolerance is never
/// reported.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatcher {
    pub tolerance: f32,
}

impl Default for NearestMatcher {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl NearestMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }
}

impl Matcher for NearestMatcher {
    fn identify(
        &self,
        probe: &Embedding,
        registry: &Registry,
        distance: &dyn Fn(&Embedding, &Embedding) -> f32,
    ) -> MatchResult {
        let distances = face_distances(registry, probe, distance);
        let matches = within_tolerance(&distances, self.tolerance);

        let Some(best) = argmin(&distances) else {
            return MatchResult::unknown(None);
        };

        if matches[best] {
            MatchResult {
                matched: true,
                distance: Some(distances[best]),
                index: Some(best),
                name: Some(registry.names()[best].clone()),
            }
        } else {
            MatchResult::unknown(Some(distances[best]))
        }
    }
}

/// Distance from `probe` to every registry embedding, in registry order.
pub fn face_distances(
    registry: &Registry,
    probe: &Embedding,
    distance: &dyn Fn(&Embedding, &Embedding) -> f32,
) -> Vec<f32> {
    registry
        .embeddings()
        .iter()
        .map(|known| distance(known, probe))
        .collect()
}

/// Per-entry acceptance flags: `true` where the distance is within `tolerance`.
pub fn within_tolerance(distances: &[f32], tolerance: f32) -> Vec<bool> {
    distances.iter().map(|&d| d <= tolerance).collect()
}

/// Index of the smallest distance; the first one wins on ties. NaN never wins.
fn argmin(distances: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &d) in distances.iter().enumerate() {
        if d.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn euclidean(a: &Embedding, b: &Embedding) -> f32 {
        a.euclidean_distance(b)
    }

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_exact_embedding_matches() {
        let registry = Registry::from_entries([("alice", emb(&[0.1, 0.2, 0.3]))]);
        let result = NearestMatcher::default().identify(&emb(&[0.1, 0.2, 0.3]), &registry, &euclidean);
        assert!(result.matched);
        assert_eq!(result.label(), "alice");
        assert_eq!(result.index, Some(0));
        assert_eq!(result.distance, Some(0.0));
    }

    #[test]
    fn test_empty_registry_is_unknown() {
        let registry = Registry::new();
        for probe in [emb(&[0.0, 0.0]), emb(&[1e6, -1e6]), emb(&[])] {
            let result = NearestMatcher::default().identify(&probe, &registry, &euclidean);
            assert!(!result.matched);
            assert_eq!(result.label(), UNKNOWN);
            assert_eq!(result.distance, None);
        }
    }

    #[test]
    fn test_nearest_beyond_tolerance_is_unknown() {
        let registry = Registry::from_entries([
            ("alice", emb(&[1.0, 0.0])),
            ("bob", emb(&[0.0, 1.0])),
        ]);
        // Closest is alice at 0.6, which exceeds 0.5.
        let result = NearestMatcher::default().identify(&emb(&[1.6, 0.0]), &registry, &euclidean);
        assert!(!result.matched);
        assert_eq!(result.label(), UNKNOWN);
        assert!((result.distance.unwrap() - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_marginally_closer_entry_wins() {
        let registry = Registry::from_entries([
            ("alice", emb(&[0.0, 0.0])),
            ("bob", emb(&[0.6, 0.0])),
        ]);
        // 0.29 from alice, 0.31 from bob: both within tolerance.
        let probe = emb(&[0.29, 0.0]);
        let result = NearestMatcher::default().identify(&probe, &registry, &euclidean);
        assert_eq!(result.label(), "alice");

        let flags = within_tolerance(&face_distances(&registry, &probe, &euclidean), 0.5);
        assert_eq!(flags, vec![true, true]);
    }

    #[test]
    fn test_exact_tie_picks_first_entry() {
        let registry = Registry::from_entries([
            ("alice", emb(&[-0.2, 0.0])),
            ("bob", emb(&[0.2, 0.0])),
        ]);
        let result = NearestMatcher::default().identify(&emb(&[0.0, 0.0]), &registry, &euclidean);
        assert_eq!(result.label(), "alice");
    }

    #[test]
    fn test_matching_is_deterministic() {
        let registry = Registry::from_entries([
            ("alice", emb(&[0.3, 0.4])),
            ("bob", emb(&[0.5, 0.1])),
            ("carol", emb(&[0.9, 0.9])),
        ]);
        let probe = emb(&[0.45, 0.15]);
        let first = NearestMatcher::default().identify(&probe, &registry, &euclidean);
        for _ in 0..10 {
            assert_eq!(NearestMatcher::default().identify(&probe, &registry, &euclidean), first);
        }
        assert_eq!(first.label(), "bob");
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let registry = Registry::from_entries([("alice", emb(&[0.0]))]);
        let result = NearestMatcher::new(0.5).identify(&emb(&[0.5]), &registry, &euclidean);
        assert!(result.matched);
    }

    #[test]
    fn test_argmin_skips_nan() {
        assert_eq!(argmin(&[]), None);
        assert_eq!(argmin(&[0.3, f32::NAN, 0.1, 0.1]), Some(2));
    }
}
