use serde::Serialize;

use crate::GameError;
use crate::similarity::SimilarityMatrix;

/// A creature that can be the answer to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub index: usize,
    pub name: String,
    /// Lowest game difficulty at which this item may be chosen as a target.
    pub difficulty: u8,
    pub thumbnails: Vec<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, difficulty: u8, thumbnails: Vec<String>) -> Self {
        Self {
            index: 0,
            name: name.into(),
            difficulty,
            thumbnails,
        }
    }
}

/// Ordered, non-empty list of items. An item's `index` is its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(mut items: Vec<Item>) -> Result<Self, GameError> {
        if items.is_empty() {
            return Err(GameError::EmptyCatalog);
        }
        for (index, item) in items.iter_mut().enumerate() {
            item.index = index;
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn name(&self, index: usize) -> &str {
        self.items
            .get(index)
            .map(|item| item.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn difficulty(&self, index: usize) -> Option<u8> {
        self.items.get(index).map(|item| item.difficulty)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name.eq_ignore_ascii_case(name))
    }
}

/// A catalog together with the similarity scores between its items.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    catalog: Catalog,
    similarity: SimilarityMatrix,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        catalog: Catalog,
        similarity: SimilarityMatrix,
    ) -> Result<Self, GameError> {
        if catalog.len() != similarity.len() {
            return Err(GameError::SizeMismatch {
                catalog: catalog.len(),
                similarity: similarity.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            catalog,
            similarity,
        })
    }

    /// Builds the similarity matrix from one taxonomy string per item.
    pub fn from_taxonomies<S: AsRef<str> + Sync>(
        name: impl Into<String>,
        items: Vec<Item>,
        taxonomies: &[S],
    ) -> Result<Self, GameError> {
        let catalog = Catalog::new(items)?;
        let similarity = SimilarityMatrix::from_taxonomies(taxonomies);
        Self::new(name, catalog, similarity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }
}
