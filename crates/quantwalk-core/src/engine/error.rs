use thiserror::Error;

use crate::core::models::cell::CellError;
use crate::engine::config::ConfigError;

/// Errors raised by the move protocol and its collaborators.
///
/// Geometric rejection of a proposed move is *not* an error: it is reported
/// through the `Ok(false)` return of `propose_move` and handled inline every
/// step. The variants here indicate driver bugs or incompatible
/// configurations and must not be silently tolerated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Particle set '{set}' has no species; populate the species table before regrouping")]
    SpeciesMissing { set: String },

    #[error("Group id {group} of particle {index} is out of bounds for {species} species")]
    GroupOutOfBounds {
        index: usize,
        group: usize,
        species: usize,
    },

    #[error("Regrouping produced a corrupt permutation for set '{set}'")]
    CorruptGrouping { set: String },

    #[error("Particle index {index} is out of bounds for {total} particles")]
    ParticleOutOfBounds { index: usize, total: usize },

    #[error("A move for particle {active} is already in flight")]
    MoveInFlight { active: usize },

    #[error("Illegal accept of particle {found}: the active particle is {expected:?}")]
    AcceptMismatch {
        expected: Option<usize>,
        found: usize,
    },

    #[error("No pending trial row for particle {particle}; evaluate a move before committing")]
    TrialRowMissing { particle: usize },

    #[error("Distance table registration needs a named particle set")]
    UnnamedParticleSet,

    #[error("No distance table registered for partner '{partner}'")]
    UnknownTable { partner: String },

    #[error("Distance table index {index} is out of bounds ({tables} tables)")]
    UnknownTableIndex { index: usize, tables: usize },

    #[error("Source set has {found} particles but table '{table}' was built for {expected}")]
    SourceSizeMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error("Position data covers {found} particles but the set holds {expected}")]
    PositionCountMismatch { expected: usize, found: usize },

    #[error("Batch arrays cover {found} walkers but the ensemble has {expected}")]
    BatchShapeMismatch { expected: usize, found: usize },

    #[error("Cell construction failed: {source}")]
    Cell {
        #[from]
        source: CellError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
