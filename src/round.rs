use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::GameError;
use crate::band::find_similar;
use crate::catalog::{Dataset, Item};
use crate::difficulty::DifficultySettings;
use crate::rng::{random_below, shuffled};
use crate::selector::choose_target;
use crate::similarity::SimilarityBand;

pub const MAIN_DATASET: &str = "main";
pub const REEF_DATASET: &str = "reef";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// The player sees a name and picks the matching picture.
    #[default]
    Images,
    /// The player sees pictures and picks the matching name.
    Names,
    /// Name rounds over the reef dataset, always at the hardest level.
    Reef,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Images => "images",
            GameMode::Names => "names",
            GameMode::Reef => "reef",
        }
    }

    pub fn dataset(&self) -> &'static str {
        match self {
            GameMode::Reef => REEF_DATASET,
            GameMode::Images | GameMode::Names => MAIN_DATASET,
        }
    }

    /// Whether the prompt shows target thumbnails and the options show names.
    pub fn shows_pictures(&self) -> bool {
        !matches!(self, GameMode::Images)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "images" | "image" => Ok(GameMode::Images),
            "names" | "name" => Ok(GameMode::Names),
            "reef" => Ok(GameMode::Reef),
            other => Err(format!(
                "unknown game mode {other:?} (expected images, names or reef)"
            )),
        }
    }
}

/// One quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Round {
    pub mode: GameMode,
    pub level: u8,
    pub target: usize,
    pub distractors: Vec<usize>,
    /// Where the target sits among [`Round::options`].
    pub correct_position: usize,
    /// Target thumbnails shown as the prompt (name modes).
    pub prompt_thumbnails: Vec<String>,
    /// One thumbnail per option, in option order (image mode).
    pub option_thumbnails: Vec<Option<String>>,
    /// Similarity band the distractors were finally drawn from.
    pub band: SimilarityBand,
    /// False when fewer distractors were found than the level asks for.
    pub complete: bool,
}

impl Round {
    pub fn option_count(&self) -> usize {
        self.distractors.len() + 1
    }

    /// Item indices in display order.
    pub fn options(&self) -> Vec<usize> {
        let mut options = Vec::with_capacity(self.option_count());
        let mut distractors = self.distractors.iter();
        for position in 0..self.option_count() {
            if position == self.correct_position {
                options.push(self.target);
            } else if let Some(&index) = distractors.next() {
                options.push(index);
            }
        }
        options
    }

    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_position
    }
}

/// Builds a round for `mode` at `level`.
///
/// Reef rounds ignore `level` and play the hardest one. A dataset too small
/// to fill the level's option count yields a round with fewer options.
pub fn build_round<R: Rng + ?Sized>(
    rng: &mut R,
    dataset: &Dataset,
    mode: GameMode,
    level: u8,
    settings: &DifficultySettings,
) -> Result<Round, GameError> {
    let level = match mode {
        GameMode::Reef => settings.hardest(),
        GameMode::Images | GameMode::Names => settings.level(level)?,
    };
    let catalog = dataset.catalog();
    let target = choose_target(rng, level.level, catalog, settings.target_attempts);
    debug!(
        dataset = dataset.name(),
        %mode,
        level = level.level,
        target = catalog.name(target),
        "building round"
    );

    let outcome = find_similar(
        rng,
        target,
        level.band,
        level.options.saturating_sub(1),
        catalog,
        dataset.similarity(),
    );
    let correct_position = random_below(rng, outcome.found.len() + 1);

    let mut round = Round {
        mode,
        level: level.level,
        target,
        distractors: outcome.found,
        correct_position,
        prompt_thumbnails: Vec::new(),
        option_thumbnails: Vec::new(),
        band: outcome.band,
        complete: outcome.complete,
    };

    if mode.shows_pictures() {
        if let Some(item) = catalog.get(target) {
            round.prompt_thumbnails = sample_thumbnails(rng, item, level.samples);
        }
    } else {
        round.option_thumbnails = round
            .options()
            .into_iter()
            .map(|index| {
                catalog
                    .get(index)
                    .and_then(|item| item.thumbnails.choose(rng))
                    .cloned()
            })
            .collect();
    }
    Ok(round)
}

/// Up to `count` distinct thumbnails of `item` in random order.
pub fn sample_thumbnails<R: Rng + ?Sized>(rng: &mut R, item: &Item, count: usize) -> Vec<String> {
    let mut thumbnails = shuffled(rng, &item.thumbnails);
    thumbnails.truncate(count);
    thumbnails
}

/// Picks a random thumbnail of `item`, avoiding `previous` when the item has
/// any other picture.
pub fn choose_thumbnail<'a, R: Rng + ?Sized>(
    rng: &mut R,
    item: &'a Item,
    previous: Option<&str>,
) -> Option<&'a str> {
    let mut candidates: Vec<&'a str> = item.thumbnails.iter().map(String::as_str).collect();
    candidates.shuffle(rng);
    candidates
        .iter()
        .copied()
        .find(|thumbnail| Some(*thumbnail) != previous)
        .or_else(|| candidates.first().copied())
}
