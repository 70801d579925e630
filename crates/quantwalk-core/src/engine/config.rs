use crate::core::models::cell::{BoundaryConditions, SimulationCell};
use crate::core::utils::geometry::Real;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Configuration defines no particle sets")]
    EmptySets,

    #[error("Walker count must be at least 1 (got {0})")]
    InvalidWalkerCount(usize),

    #[error("Particle set definitions need a non-empty name")]
    UnnamedSet,

    #[error("Set '{set}' defines no species")]
    NoSpecies { set: String },

    #[error("Species '{species}' in set '{set}' has zero members")]
    EmptySpecies { set: String, species: String },

    #[error("Set '{set}' provides {found} positions for {expected} particles")]
    PositionCountMismatch {
        set: String,
        expected: usize,
        found: usize,
    },

    #[error("Periodic boundaries need a lattice matrix")]
    MissingLattice,

    #[error("Invalid cell: {0}")]
    InvalidCell(String),

    #[error("Failed to read configuration file: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// One species within a particle-set definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub charge: Real,
    pub mass: Real,
    pub count: usize,
}

/// One particle set: its species layout and, optionally, explicit initial
/// positions in group order (fixed centers such as ions need them; sampled
/// particles may start anywhere).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetConfig {
    pub name: String,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub positions: Option<Vec<[Real; 3]>>,
}

impl SetConfig {
    pub fn total_count(&self) -> usize {
        self.species.iter().map(|s| s.count).sum()
    }
}

/// Simulation cell definition; the lattice is given row-wise and only
/// required for periodic boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub boundary: BoundaryConditions,
    #[serde(default)]
    pub lattice: Option<[[Real; 3]; 3]>,
}

impl CellConfig {
    pub fn open() -> Self {
        Self {
            boundary: BoundaryConditions::Open,
            lattice: None,
        }
    }

    /// Builds the concrete simulation cell this configuration describes.
    pub fn build(&self) -> Result<SimulationCell, ConfigError> {
        match self.boundary {
            BoundaryConditions::Open => Ok(SimulationCell::open()),
            BoundaryConditions::Periodic => {
                let rows = self.lattice.ok_or(ConfigError::MissingLattice)?;
                let flat: Vec<Real> = rows.iter().flatten().copied().collect();
                let lattice = Matrix3::from_row_slice(&flat);
                SimulationCell::periodic(lattice)
                    .map_err(|e| ConfigError::InvalidCell(e.to_string()))
            }
        }
    }
}

/// Top-level configuration for building a walker ensemble.
///
/// The first set is the sampled one, replicated once per walker; any further
/// sets are shared fixed sources (e.g. ions) each walker keeps a distance
/// table against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub cell: CellConfig,
    pub sets: Vec<SetConfig>,
    pub walkers: usize,
}

impl SimulationConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sets.is_empty() {
            return Err(ConfigError::EmptySets);
        }
        if self.walkers == 0 {
            return Err(ConfigError::InvalidWalkerCount(self.walkers));
        }
        if self.cell.boundary == BoundaryConditions::Periodic && self.cell.lattice.is_none() {
            return Err(ConfigError::MissingLattice);
        }
        for set in &self.sets {
            if set.name.is_empty() {
                return Err(ConfigError::UnnamedSet);
            }
            if set.species.is_empty() {
                return Err(ConfigError::NoSpecies {
                    set: set.name.clone(),
                });
            }
            for species in &set.species {
                if species.count == 0 {
                    return Err(ConfigError::EmptySpecies {
                        set: set.name.clone(),
                        species: species.name.clone(),
                    });
                }
            }
            if let Some(positions) = &set.positions {
                if positions.len() != set.total_count() {
                    return Err(ConfigError::PositionCountMismatch {
                        set: set.name.clone(),
                        expected: set.total_count(),
                        found: positions.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    cell: Option<CellConfig>,
    sets: Vec<SetConfig>,
    walkers: Option<usize>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, cell: CellConfig) -> Self {
        self.cell = Some(cell);
        self
    }

    pub fn add_set(mut self, set: SetConfig) -> Self {
        self.sets.push(set);
        self
    }

    pub fn walkers(mut self, walkers: usize) -> Self {
        self.walkers = Some(walkers);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = SimulationConfig {
            cell: self.cell.ok_or(ConfigError::MissingParameter("cell"))?,
            sets: self.sets,
            walkers: self
                .walkers
                .ok_or(ConfigError::MissingParameter("walkers"))?,
        };
        config.validate()?;
        Ok(config)
    }
}
