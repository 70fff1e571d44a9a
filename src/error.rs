use crate::grid::Coord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parameter {name} expects {expected} values, got {actual}")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("expected {expected} chromosomes, got {actual}")]
    ChromosomeCount { expected: usize, actual: usize },
    #[error("missing chromosome {0}")]
    MissingChromosome(String),
    #[error("parents differ at chromosome {index}: {reason}")]
    CrossoverMismatch { index: usize, reason: String },
    #[error("invalid chromosome: {0}")]
    InvalidChromosome(String),
    #[error("no empty cell left to spawn an apple")]
    NoEmptyCell,
    #[error("snake body cell {0:?} is outside the playable grid")]
    BodyOutsideGrid(Coord),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("selection failed: {0}")]
    Selection(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
