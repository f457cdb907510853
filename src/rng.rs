//! Random helpers shared by the selection engines.
//!
//! Every function takes the generator explicitly so callers decide between a
//! seeded `StdRng` (tests, reproducible CLI runs) and an entropy-seeded one.

use rand::Rng;
use rand::seq::SliceRandom;

/// Uniform index in `0..maximum`.
///
/// # Panics
///
/// Panics when `maximum` is zero.
pub fn random_below<R: Rng + ?Sized>(rng: &mut R, maximum: usize) -> usize {
    rng.gen_range(0..maximum)
}

/// Returns a shuffled copy of `items`, leaving the input untouched.
pub fn shuffled<T: Clone, R: Rng + ?Sized>(rng: &mut R, items: &[T]) -> Vec<T> {
    let mut result = items.to_vec();
    result.shuffle(rng);
    result
}

/// A random permutation of `0..len`.
pub fn shuffled_indices<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn random_below_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert!(random_below(&mut rng, 10) < 10);
        }
        assert_eq!(random_below(&mut rng, 1), 0);
    }

    #[test]
    fn random_below_spreads_values() {
        let mut rng = StdRng::seed_from_u64(11);
        let seen: HashSet<_> = (0..200).map(|_| random_below(&mut rng, 100)).collect();
        assert!(seen.len() > 50);
    }

    #[test]
    fn shuffle_of_trivial_inputs_is_identity() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(shuffled::<u8, _>(&mut rng, &[]).is_empty());
        assert_eq!(shuffled(&mut rng, &[42]), vec![42]);
    }

    #[test]
    fn shuffle_preserves_multiset_and_input() {
        let mut rng = StdRng::seed_from_u64(5);
        let input = vec![1, 1, 2, 2, 3, 3, 9];
        let mut result = shuffled(&mut rng, &input);
        assert_eq!(input, vec![1, 1, 2, 2, 3, 3, 9]);
        result.sort_unstable();
        assert_eq!(result, input);
    }

    #[test]
    fn shuffle_produces_varied_orderings() {
        let mut rng = StdRng::seed_from_u64(13);
        let input: Vec<u32> = (1..=8).collect();
        let orderings: HashSet<Vec<u32>> = (0..20).map(|_| shuffled(&mut rng, &input)).collect();
        assert!(orderings.len() > 5);
    }

    #[test]
    fn shuffled_indices_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut indices = shuffled_indices(&mut rng, 25);
        indices.sort_unstable();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
    }
}
