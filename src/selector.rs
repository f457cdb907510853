use rand::Rng;
use tracing::debug;

use crate::catalog::Catalog;
use crate::rng::random_below;

pub const DEFAULT_TARGET_ATTEMPTS: usize = 10;

/// Picks the index of the item the player has to identify.
///
/// Draws uniformly until an item whose rating does not exceed `level` turns
/// up. After `attempts` rejected draws the last candidate is returned anyway,
/// so the gate is a preference rather than a guarantee.
pub fn choose_target<R: Rng + ?Sized>(
    rng: &mut R,
    level: u8,
    catalog: &Catalog,
    attempts: usize,
) -> usize {
    let attempts = attempts.max(1);
    let mut candidate = random_below(rng, catalog.len());
    let mut attempt = 1;
    loop {
        let rating = catalog.difficulty(candidate);
        if rating.is_some_and(|rating| rating <= level) {
            return candidate;
        }
        debug!(
            name = catalog.name(candidate),
            ?rating,
            level,
            attempt,
            "target too difficult"
        );
        if attempt >= attempts {
            break;
        }
        candidate = random_below(rng, catalog.len());
        attempt += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn catalog(ratings: &[u8]) -> Catalog {
        Catalog::new(
            ratings
                .iter()
                .enumerate()
                .map(|(i, &rating)| Item::new(format!("creature {i}"), rating, vec![]))
                .collect(),
        )
        .expect("non-empty")
    }

    #[test]
    fn always_returns_a_valid_index() {
        let catalog = catalog(&[4, 4, 4, 4, 4]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            assert!(choose_target(&mut rng, 0, &catalog, DEFAULT_TARGET_ATTEMPTS) < 5);
        }
    }

    #[test]
    fn eligible_items_are_preferred() {
        // Half of the catalog qualifies at level 0; with ten attempts the miss
        // rate should sit near 0.5^10.
        let ratings: Vec<u8> = (0..20).map(|i| if i % 2 == 0 { 0 } else { 3 }).collect();
        let catalog = catalog(&ratings);
        let mut rng = StdRng::seed_from_u64(2024);
        let misses = (0..1000)
            .map(|_| choose_target(&mut rng, 0, &catalog, DEFAULT_TARGET_ATTEMPTS))
            .filter(|&index| catalog.difficulty(index) != Some(0))
            .count();
        assert!(misses <= 10, "too many ineligible targets: {misses}");
    }

    #[test]
    fn single_attempt_misses_about_half_the_time() {
        let ratings: Vec<u8> = (0..20).map(|i| if i % 2 == 0 { 0 } else { 3 }).collect();
        let catalog = catalog(&ratings);
        let mut rng = StdRng::seed_from_u64(77);
        let misses = (0..2000)
            .map(|_| choose_target(&mut rng, 0, &catalog, 1))
            .filter(|&index| catalog.difficulty(index) != Some(0))
            .count();
        assert!((850..=1150).contains(&misses), "miss count {misses}");

        let mut rng = StdRng::seed_from_u64(78);
        let misses = (0..2000)
            .map(|_| choose_target(&mut rng, 0, &catalog, 2))
            .filter(|&index| catalog.difficulty(index) != Some(0))
            .count();
        assert!((380..=620).contains(&misses), "miss count {misses}");
    }

    #[test]
    fn falls_back_when_nothing_qualifies() {
        let catalog = catalog(&[3, 4]);
        let mut rng = StdRng::seed_from_u64(9);
        let index = choose_target(&mut rng, 0, &catalog, 3);
        assert!(index < 2);
    }

    #[test]
    fn zero_attempts_still_draws_once() {
        let catalog = catalog(&[0]);
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(choose_target(&mut rng, 0, &catalog, 0), 0);
    }

    #[test]
    fn high_levels_accept_everything() {
        let catalog = catalog(&[0, 1, 2, 3, 4]);
        let mut rng = StdRng::seed_from_u64(21);
        let seen: std::collections::HashSet<_> = (0..200)
            .map(|_| choose_target(&mut rng, 4, &catalog, DEFAULT_TARGET_ATTEMPTS))
            .collect();
        assert_eq!(seen.len(), 5);
    }
}
