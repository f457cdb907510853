use rayon::prelude::*;
use serde::Serialize;

use crate::GameError;

pub const MAX_SIMILARITY: u8 = 100;

/// Pairwise similarity between catalog items, scored `0..=100`.
///
/// Only the strict lower triangle is stored: the score for `(i, j)` lives at
/// `(max(i, j), min(i, j))` and an item is never compared with itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityMatrix {
    len: usize,
    scores: Vec<u8>,
}

impl SimilarityMatrix {
    /// Builds a matrix from rows where row `i` holds the scores for columns
    /// `0..i`. A trailing diagonal entry is accepted and ignored.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, GameError> {
        let len = rows.len();
        let mut scores = Vec::with_capacity(triangle_len(len));
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() < i {
                return Err(GameError::MalformedSimilarity {
                    row: i,
                    reason: format!("expected at least {i} scores, found {}", row.len()),
                });
            }
            if let Some(score) = row[..i].iter().find(|&&score| score > MAX_SIMILARITY) {
                return Err(GameError::MalformedSimilarity {
                    row: i,
                    reason: format!("score {score} exceeds {MAX_SIMILARITY}"),
                });
            }
            scores.extend_from_slice(&row[..i]);
        }
        Ok(Self { len, scores })
    }

    /// Scores every pair of taxonomy strings with [`similarity_percent`].
    pub fn from_taxonomies<S: AsRef<str> + Sync>(taxonomies: &[S]) -> Self {
        let rows: Vec<Vec<u8>> = (0..taxonomies.len())
            .into_par_iter()
            .map(|i| {
                let current = taxonomies[i].as_ref();
                taxonomies[..i]
                    .iter()
                    .map(|other| similarity_percent(current, other.as_ref()))
                    .collect()
            })
            .collect();
        Self {
            len: taxonomies.len(),
            scores: rows.into_iter().flatten().collect(),
        }
    }

    /// Number of items the matrix covers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Similarity of two distinct items; `None` for `a == b` or out-of-range
    /// indices.
    pub fn get(&self, a: usize, b: usize) -> Option<u8> {
        if a == b || a >= self.len || b >= self.len {
            return None;
        }
        let (i, j) = (a.max(b), a.min(b));
        self.scores.get(triangle_len(i) + j).copied()
    }
}

fn triangle_len(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Closed interval of acceptable similarity scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimilarityBand {
    pub lower: u8,
    pub upper: u8,
}

impl SimilarityBand {
    pub const FULL: SimilarityBand = SimilarityBand {
        lower: 0,
        upper: MAX_SIMILARITY,
    };

    pub const fn new(lower: u8, upper: u8) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, score: u8) -> bool {
        score >= self.lower && score <= self.upper
    }

    /// True once relaxing can no longer admit anything new.
    pub fn is_maximal(&self) -> bool {
        self.lower == 0 && self.upper >= MAX_SIMILARITY
    }

    /// Widens both ends by `step`, clamped to `0..=100`.
    pub fn relaxed(&self, step: u8) -> Self {
        Self {
            lower: self.lower.saturating_sub(step),
            upper: self.upper.saturating_add(step).min(MAX_SIMILARITY),
        }
    }
}

/// Position-weighted similarity of two space-separated taxonomy strings.
///
/// Earlier ranks weigh more than later ones and the longer taxonomy sets the
/// denominator, so a difference in depth lowers the score. Returns `0.0`
/// (nothing shared) through `1.0` (identical).
pub fn taxonomy_similarity(a: &str, b: &str) -> f64 {
    match taxonomy_weights(a, b) {
        Some((matched, total)) => matched as f64 / total as f64,
        None => 0.0,
    }
}

/// [`taxonomy_similarity`] scaled to `0..=100`, rounded down.
pub fn similarity_percent(a: &str, b: &str) -> u8 {
    match taxonomy_weights(a, b) {
        Some((matched, total)) => (matched * 100 / total) as u8,
        None => 0,
    }
}

fn taxonomy_weights(a: &str, b: &str) -> Option<(usize, usize)> {
    let left = ranks(a);
    let right = ranks(b);
    let depth = left.len().max(right.len());
    if depth == 0 {
        return None;
    }
    let total = depth * (depth + 1) / 2;
    let matched = left
        .iter()
        .zip(&right)
        .enumerate()
        .filter(|(_, (x, y))| x == y)
        .map(|(i, _)| depth - i)
        .sum::<usize>();
    Some((matched, total))
}

fn ranks(taxonomy: &str) -> Vec<&str> {
    if taxonomy.is_empty() {
        Vec::new()
    } else {
        taxonomy.split(' ').collect()
    }
}
