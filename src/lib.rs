mod data;
mod error;

pub mod band;
pub mod catalog;
pub mod difficulty;
pub mod pages;
pub mod rng;
pub mod round;
pub mod score;
pub mod search;
pub mod selector;
pub mod similarity;

#[cfg(feature = "web")]
pub mod session;
#[cfg(feature = "web")]
pub mod web;

pub use band::{BandOutcome, RELAXATION_STEP, find_similar};
pub use catalog::{Catalog, Dataset, Item};
pub use difficulty::{DifficultySettings, LevelSettings, points_for};
pub use error::GameError;
pub use pages::{PageScope, page_title, page_url, title_case};
pub use round::{GameMode, Round, build_round, choose_thumbnail};
pub use score::Scoreboard;
pub use search::{SearchConfig, SearchIndex, SearchPage, SearchResult, SearchSession, tokenize};
pub use selector::{DEFAULT_TARGET_ATTEMPTS, choose_target};
pub use similarity::{SimilarityBand, SimilarityMatrix};

use data::{
    ArchivedDataStore, ArchivedDatasetRecord, ArchivedPackedStrings, ArchivedRange,
    ArchivedStringId,
};
use once_cell::sync::Lazy;
use rkyv::access_unchecked;
use rkyv::util::AlignedVec;
use std::io::Cursor;
use std::str;
use tracing::{debug, error};
use zstd::stream::decode_all;

static DATA_BYTES: &[u8] = include_bytes!(env!("DETECTIVE_DATA"));

static DATA_SLICE: Lazy<&'static AlignedVec> = Lazy::new(|| {
    let decompressed = decode_all(Cursor::new(DATA_BYTES)).expect("decompress detective data");
    let mut aligned = AlignedVec::with_capacity(decompressed.len());
    aligned.extend_from_slice(&decompressed);
    Box::leak(Box::new(aligned))
});
static DATA_STORE: Lazy<&'static ArchivedDataStore> =
    Lazy::new(|| unsafe { access_unchecked::<ArchivedDataStore>(DATA_SLICE.as_slice()) });

static DATASETS: Lazy<Vec<Dataset>> = Lazy::new(|| {
    let store = data_store();
    store
        .datasets
        .iter()
        .filter_map(|record| match load_dataset(store, record) {
            Ok(dataset) => Some(dataset),
            Err(err) => {
                error!(error = %err, "skipping bundled dataset");
                None
            }
        })
        .collect()
});

static SEARCH_INDICES: Lazy<Vec<SearchIndex>> = Lazy::new(|| {
    let store = data_store();
    PageScope::ALL
        .into_iter()
        .map(|scope| {
            let titles = store
                .page_scopes
                .iter()
                .find(|record| store.strings.get(record.scope) == scope.as_str())
                .map(|record| {
                    string_iter(store, &record.titles, store.page_titles.as_slice())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            SearchIndex::new(scope, titles)
        })
        .collect()
});

/// Read-only access to the creatures and page lists compiled into the binary.
pub struct BundledData;

impl BundledData {
    pub fn datasets() -> &'static [Dataset] {
        DATASETS.as_slice()
    }

    pub fn dataset_names() -> Vec<&'static str> {
        DATASETS.iter().map(Dataset::name).collect()
    }

    pub fn dataset(name: &str) -> Result<&'static Dataset, GameError> {
        DATASETS
            .iter()
            .find(|dataset| dataset.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| GameError::UnknownDataset(name.to_string()))
    }

    /// The dataset a game mode plays by default.
    pub fn dataset_for(mode: GameMode) -> Result<&'static Dataset, GameError> {
        Self::dataset(mode.dataset())
    }

    pub fn search_index(scope: PageScope) -> &'static SearchIndex {
        let position = PageScope::ALL
            .iter()
            .position(|candidate| *candidate == scope)
            .unwrap_or(0);
        &SEARCH_INDICES[position]
    }
}

fn data_store() -> &'static ArchivedDataStore {
    &DATA_STORE
}

fn load_dataset(
    store: &ArchivedDataStore,
    record: &ArchivedDatasetRecord,
) -> Result<Dataset, GameError> {
    let name = store.strings.get(record.name);
    let creatures = range_slice(store.creatures.as_slice(), &record.creatures);
    let mut items = Vec::with_capacity(creatures.len());
    let mut taxonomies = Vec::with_capacity(creatures.len());
    for creature in creatures {
        let thumbnails = string_iter(
            store,
            &creature.thumbnails,
            store.creature_thumbnails.as_slice(),
        )
        .map(str::to_string)
        .collect();
        items.push(Item::new(
            store.strings.get(creature.name),
            creature.difficulty,
            thumbnails,
        ));
        taxonomies.push(store.strings.get(creature.taxonomy));
    }
    debug!(dataset = name, creatures = items.len(), "loading bundled dataset");
    Dataset::from_taxonomies(name, items, &taxonomies)
}

fn string_iter<'a>(
    store: &'a ArchivedDataStore,
    range: &'a ArchivedRange,
    bucket: &'a [ArchivedStringId],
) -> impl Iterator<Item = &'a str> + 'a {
    let slice = range_slice(bucket, range);
    slice.iter().map(move |id| store.strings.get(*id))
}

fn range_slice<'a, T>(data: &'a [T], range: &ArchivedRange) -> &'a [T] {
    let start = range.start.to_native() as usize;
    let len = range.len.to_native() as usize;
    &data[start..start + len]
}

impl ArchivedPackedStrings {
    fn get(&self, id: ArchivedStringId) -> &str {
        let idx = id.to_native() as usize;
        let start = self.offsets.as_slice()[idx].to_native() as usize;
        let len = self.lengths.as_slice()[idx].to_native() as usize;
        let data = self.data.as_slice();
        let bytes = &data[start..start + len];
        str::from_utf8(bytes).expect("stored string data is valid UTF-8")
    }
}
