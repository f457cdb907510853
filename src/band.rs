//! Distractor search under a widening similarity band.
//!
//! The scan walks a fresh random permutation of the catalog on every pass and
//! keeps candidates whose similarity to the target falls inside the band.
//! When a pass ends short of the requested count the band grows by
//! [`RELAXATION_STEP`] on both sides; once it covers `0..=100` the search
//! gives up with whatever it found.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::rng::shuffled_indices;
use crate::similarity::{SimilarityBand, SimilarityMatrix};

pub const RELAXATION_STEP: u8 = 5;

/// Result of [`find_similar`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandOutcome {
    /// Accepted distractors in acceptance order.
    pub found: Vec<usize>,
    /// The band in effect when the search stopped.
    pub band: SimilarityBand,
    /// Number of full permutations consumed.
    pub passes: usize,
    /// False when the band reached `0..=100` before `required` was met.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    Relaxing,
    Done,
    PartialDone,
}

/// Finds `required` distinct items, other than `target`, whose similarity to
/// `target` lies inside `band`, widening the band as needed.
///
/// Indices refer to positions in both `catalog` and `similarity`.
pub fn find_similar<R: Rng + ?Sized>(
    rng: &mut R,
    target: usize,
    band: SimilarityBand,
    required: usize,
    catalog: &Catalog,
    similarity: &SimilarityMatrix,
) -> BandOutcome {
    let mut band = band;
    let mut found: Vec<usize> = Vec::with_capacity(required);
    let mut order = shuffled_indices(rng, similarity.len());
    let mut passes = 1;
    debug!(
        target = catalog.name(target),
        lower = band.lower,
        upper = band.upper,
        required,
        "search limits"
    );

    let mut state = if required == 0 {
        ScanState::Done
    } else {
        ScanState::Scanning
    };
    loop {
        state = match state {
            ScanState::Scanning => match order.pop() {
                None if band.is_maximal() => ScanState::PartialDone,
                None => ScanState::Relaxing,
                Some(candidate) => {
                    let admissible = candidate != target
                        && !found.contains(&candidate)
                        && similarity
                            .get(candidate, target)
                            .is_some_and(|score| band.contains(score));
                    if admissible {
                        found.push(candidate);
                    }
                    if found.len() >= required {
                        ScanState::Done
                    } else {
                        ScanState::Scanning
                    }
                }
            },
            ScanState::Relaxing => {
                band = band.relaxed(RELAXATION_STEP);
                passes += 1;
                debug!(lower = band.lower, upper = band.upper, "new limits");
                order = shuffled_indices(rng, similarity.len());
                ScanState::Scanning
            }
            ScanState::Done => break,
            ScanState::PartialDone => {
                warn!(
                    target = catalog.name(target),
                    required,
                    found = found.len(),
                    "could not satisfy the requirement"
                );
                break;
            }
        };
    }

    for (position, &index) in found.iter().enumerate() {
        debug!(position, index, name = catalog.name(index), "distractor");
    }

    BandOutcome {
        complete: state == ScanState::Done,
        found,
        band,
        passes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn catalog(len: usize) -> Catalog {
        Catalog::new(
            (0..len)
                .map(|i| Item::new(format!("creature {i}"), 0, vec![]))
                .collect(),
        )
        .expect("non-empty")
    }

    /// Every pair scores `score(i, j)`.
    fn matrix(len: usize, score: impl Fn(usize, usize) -> u8) -> SimilarityMatrix {
        let rows: Vec<Vec<u8>> = (0..len)
            .map(|i| (0..i).map(|j| score(i, j)).collect())
            .collect();
        SimilarityMatrix::from_rows(&rows).expect("valid rows")
    }

    #[test]
    fn finds_exactly_the_requested_count_inside_the_band() {
        // Items 1..=6 sit at 30 from the target, the rest at 90.
        let len = 20;
        let similarity = matrix(len, |i, j| {
            let other = if j == 0 { i } else if i == 0 { j } else { return 50 };
            if other <= 6 { 30 } else { 90 }
        });
        let catalog = catalog(len);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let outcome = find_similar(
                &mut rng,
                0,
                SimilarityBand::new(25, 35),
                4,
                &catalog,
                &similarity,
            );
            assert!(outcome.complete);
            assert_eq!(outcome.found.len(), 4);
            assert_eq!(outcome.passes, 1);
            let distinct: HashSet<_> = outcome.found.iter().copied().collect();
            assert_eq!(distinct.len(), 4);
            assert!(!outcome.found.contains(&0));
            assert!(outcome.found.iter().all(|&index| (1..=6).contains(&index)));
        }
    }

    #[test]
    fn relaxes_until_candidates_appear() {
        let len = 10;
        let similarity = matrix(len, |_, _| 50);
        let catalog = catalog(len);
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = find_similar(
            &mut rng,
            3,
            SimilarityBand::new(80, 100),
            5,
            &catalog,
            &similarity,
        );
        assert!(outcome.complete);
        assert_eq!(outcome.found.len(), 5);
        // 80 -> 50 takes six relaxations.
        assert_eq!(outcome.band, SimilarityBand::new(50, 100));
        assert_eq!(outcome.passes, 7);
        assert!(!outcome.found.contains(&3));
    }

    #[test]
    fn returns_partial_result_once_band_is_maximal() {
        let len = 4;
        let similarity = matrix(len, |_, _| 10);
        let catalog = catalog(len);
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = find_similar(
            &mut rng,
            1,
            SimilarityBand::new(40, 60),
            7,
            &catalog,
            &similarity,
        );
        assert!(!outcome.complete);
        assert_eq!(outcome.band, SimilarityBand::FULL);
        let mut found = outcome.found.clone();
        found.sort_unstable();
        assert_eq!(found, vec![0, 2, 3]);
    }

    #[test]
    fn band_only_widens_and_stays_clamped() {
        let len = 6;
        let similarity = matrix(len, |i, j| ((i * 17 + j * 31) % 101) as u8);
        let catalog = catalog(len);
        let mut rng = StdRng::seed_from_u64(99);
        for target in 0..len {
            let start = SimilarityBand::new(45, 55);
            let outcome = find_similar(&mut rng, target, start, len - 1, &catalog, &similarity);
            assert!(outcome.band.lower <= start.lower);
            assert!(outcome.band.upper >= start.upper);
            assert!(outcome.band.upper <= 100);
            assert!(outcome.found.len() <= len - 1);
            assert!(outcome.passes <= 100 / RELAXATION_STEP as usize + 1);
        }
    }

    #[test]
    fn zero_required_is_immediately_done() {
        let similarity = matrix(3, |_, _| 0);
        let mut rng = StdRng::seed_from_u64(0);
        let outcome = find_similar(
            &mut rng,
            0,
            SimilarityBand::new(0, 10),
            0,
            &catalog(3),
            &similarity,
        );
        assert!(outcome.complete);
        assert!(outcome.found.is_empty());
    }

    #[test]
    fn single_item_catalog_yields_nothing() {
        let similarity = matrix(1, |_, _| 0);
        let mut rng = StdRng::seed_from_u64(0);
        let outcome = find_similar(
            &mut rng,
            0,
            SimilarityBand::new(10, 20),
            1,
            &catalog(1),
            &similarity,
        );
        assert!(!outcome.complete);
        assert!(outcome.found.is_empty());
        assert!(outcome.band.is_maximal());
    }
}
