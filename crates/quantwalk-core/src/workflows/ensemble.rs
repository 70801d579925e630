use crate::core::models::cell::SimulationCell;
use crate::core::models::species::SpeciesSet;
use crate::core::utils::geometry::PosVector;
use crate::engine::config::{SetConfig, SimulationConfig};
use crate::engine::error::EngineError;
use crate::engine::particle_set::ParticleSet;
use tracing::{info, instrument};

/// A ready-to-sample ensemble: one sampled configuration per walker, plus
/// the shared fixed source sets (e.g. ions) every walker keeps a distance
/// table against.
#[derive(Debug, Clone)]
pub struct Ensemble {
    pub walkers: Vec<ParticleSet>,
    pub sources: Vec<ParticleSet>,
}

impl Ensemble {
    pub fn num_walkers(&self) -> usize {
        self.walkers.len()
    }
}

/// Builds a walker ensemble from a validated configuration.
///
/// The first configured set is replicated once per walker; the remaining
/// sets become shared sources. Each walker is wired with its self-pair table
/// and one table per source, regrouped, and primed with a full distance
/// evaluation, so every cache reflects the initial committed positions.
#[instrument(skip_all, name = "ensemble_build")]
pub fn build_ensemble(config: &SimulationConfig) -> Result<Ensemble, EngineError> {
    config.validate()?;
    let cell = config.cell.build()?;
    info!(
        sets = config.sets.len(),
        walkers = config.walkers,
        boundary = ?config.cell.boundary,
        "building walker ensemble"
    );

    let mut sets = config
        .sets
        .iter()
        .map(|set_config| build_set(set_config, &cell))
        .collect::<Result<Vec<_>, _>>()?;
    let sources = sets.split_off(1);
    let template = sets.pop().ok_or_else(|| {
        EngineError::Internal("validated configuration lost its primary set".to_string())
    })?;

    let mut walkers = Vec::with_capacity(config.walkers);
    for _ in 0..config.walkers {
        let mut walker = template.clone();
        walker.add_self_table()?;
        for source in &sources {
            walker.add_table(source)?;
        }
        walker.update()?;
        walkers.push(walker);
    }

    info!(
        walkers = walkers.len(),
        particles = template.total_num(),
        sources = sources.len(),
        "ensemble ready"
    );
    Ok(Ensemble { walkers, sources })
}

fn build_set(config: &SetConfig, cell: &SimulationCell) -> Result<ParticleSet, EngineError> {
    let mut species = SpeciesSet::new();
    let counts: Vec<usize> = config.species.iter().map(|s| s.count).collect();
    for s in &config.species {
        species.add_species(&s.name, s.charge, s.mass);
    }

    let mut set = ParticleSet::new(&config.name, species, cell.clone());
    set.create(&counts);
    if let Some(positions) = &config.positions {
        for (i, p) in positions.iter().enumerate() {
            set.set_position(i, PosVector::new(p[0], p[1], p[2]));
        }
    }
    set.regroup()?;
    Ok(set)
}
