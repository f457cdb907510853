use std::fmt;

use serde::Serialize;

use crate::GameError;
use crate::selector::DEFAULT_TARGET_ATTEMPTS;
use crate::similarity::SimilarityBand;

/// Tuning for one game difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelSettings {
    pub level: u8,
    pub label: &'static str,
    /// Starting band for distractors.
    pub band: SimilarityBand,
    /// Options shown to the player, the correct one included.
    pub options: usize,
    /// Target thumbnails shown in name rounds.
    pub samples: usize,
}

impl LevelSettings {
    /// Points for a mistake-free answer: `10^(level + 1)`.
    pub fn points(&self) -> u64 {
        points_for(self.level)
    }
}

impl fmt::Display for LevelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.level)
    }
}

pub fn points_for(level: u8) -> u64 {
    10u64.saturating_pow(u32::from(level) + 1)
}

static DEFAULT_LEVELS: [LevelSettings; 5] = [
    LevelSettings {
        level: 0,
        label: "very easy",
        band: SimilarityBand::new(0, 10),
        options: 2,
        samples: 2,
    },
    LevelSettings {
        level: 1,
        label: "easy",
        band: SimilarityBand::new(15, 25),
        options: 2,
        samples: 2,
    },
    LevelSettings {
        level: 2,
        label: "moderate",
        band: SimilarityBand::new(25, 35),
        options: 4,
        samples: 2,
    },
    LevelSettings {
        level: 3,
        label: "hard",
        band: SimilarityBand::new(40, 40),
        options: 6,
        samples: 1,
    },
    LevelSettings {
        level: 4,
        label: "very hard",
        band: SimilarityBand::new(80, 100),
        options: 8,
        samples: 1,
    },
];

/// The difficulty table used when building rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultySettings {
    pub levels: Vec<LevelSettings>,
    pub target_attempts: usize,
}

impl Default for DifficultySettings {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            target_attempts: DEFAULT_TARGET_ATTEMPTS,
        }
    }
}

impl DifficultySettings {
    pub fn level(&self, level: u8) -> Result<&LevelSettings, GameError> {
        self.levels
            .get(usize::from(level))
            .ok_or(GameError::DifficultyOutOfRange {
                level,
                max: self.max_level(),
            })
    }

    pub fn max_level(&self) -> u8 {
        self.levels.len().saturating_sub(1) as u8
    }

    pub fn hardest(&self) -> &LevelSettings {
        self.levels.last().unwrap_or(&DEFAULT_LEVELS[4])
    }
}
