use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    UnknownDataset(String),
    DifficultyOutOfRange { level: u8, max: u8 },
    EmptyCatalog,
    SizeMismatch { catalog: usize, similarity: usize },
    MalformedSimilarity { row: usize, reason: String },
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::UnknownDataset(name) => write!(f, "unknown dataset {name:?}"),
            GameError::DifficultyOutOfRange { level, max } => {
                write!(f, "difficulty {level} is out of range (0..={max})")
            }
            GameError::EmptyCatalog => write!(f, "catalog must contain at least one item"),
            GameError::SizeMismatch {
                catalog,
                similarity,
            } => write!(
                f,
                "catalog has {catalog} items but the similarity matrix covers {similarity}"
            ),
            GameError::MalformedSimilarity { row, reason } => {
                write!(f, "malformed similarity row {row}: {reason}")
            }
        }
    }
}

impl std::error::Error for GameError {}
