use crate::core::models::cell::{BoundaryConditions, SimulationCell};
use crate::core::models::species::SpeciesSet;
use crate::core::utils::geometry::{PosVector, Real};
use crate::engine::distance_table::DistanceTable;
use crate::engine::error::EngineError;
use std::collections::HashMap;
use tracing::debug;

/// One particle configuration: positions, species grouping, and the distance
/// tables that cache its pairwise geometry.
///
/// A particle's index is its identity for the lifetime of the set; regrouping
/// never reorders storage, it only records the group-ordered permutation.
///
/// The move protocol is a two-state machine. From `Idle` (no active
/// particle), [`ParticleSet::propose_move`] transitions to `Proposed`: one
/// particle has a trial position and every owned table holds a freshly
/// evaluated scratch row. [`ParticleSet::accept_move`] commits the trial and
/// every scratch row; [`ParticleSet::reject_move`] drops them. Both return to
/// `Idle`. Exactly one particle per set may be in flight at a time.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    name: String,
    species: SpeciesSet,
    cell: SimulationCell,
    use_bound_box: bool,
    positions: Vec<PosVector>,
    group_id: Vec<usize>,
    /// Group range offsets: particles of group `g` occupy
    /// `sub_ptcl[g]..sub_ptcl[g+1]` in group order.
    sub_ptcl: Vec<usize>,
    id: Vec<usize>,
    indirect_id: Vec<usize>,
    mass: Vec<Real>,
    charge: Vec<Real>,
    same_mass: bool,
    is_grouped: bool,
    active_particle: Option<usize>,
    active_position: PosVector,
    tables: Vec<DistanceTable>,
    table_index: HashMap<String, usize>,
}

impl ParticleSet {
    pub fn new(name: &str, species: SpeciesSet, cell: SimulationCell) -> Self {
        let use_bound_box = cell.boundary() == BoundaryConditions::Periodic;
        Self {
            name: name.to_string(),
            species,
            cell,
            use_bound_box,
            positions: Vec::new(),
            group_id: Vec::new(),
            sub_ptcl: vec![0],
            id: Vec::new(),
            indirect_id: Vec::new(),
            mass: Vec::new(),
            charge: Vec::new(),
            same_mass: true,
            is_grouped: true,
            active_particle: None,
            active_position: PosVector::zeros(),
            tables: Vec::new(),
            table_index: HashMap::new(),
        }
    }

    /// Allocates storage for the given per-group particle counts.
    ///
    /// All positions start at the origin; group ids are laid out contiguously
    /// in group order. Any previously registered distance tables are dropped,
    /// since their shapes no longer apply.
    pub fn create(&mut self, counts: &[usize]) {
        self.sub_ptcl = vec![0; counts.len() + 1];
        for (g, &n) in counts.iter().enumerate() {
            self.sub_ptcl[g + 1] = self.sub_ptcl[g] + n;
        }
        let total = self.sub_ptcl[counts.len()];

        self.positions = vec![PosVector::zeros(); total];
        self.group_id = Vec::with_capacity(total);
        for (g, &n) in counts.iter().enumerate() {
            self.group_id.extend(std::iter::repeat(g).take(n));
        }
        self.id = (0..total).collect();
        self.indirect_id = (0..total).collect();
        self.mass = vec![1.0; total];
        self.charge = vec![0.0; total];
        self.same_mass = true;
        self.is_grouped = true;
        self.active_particle = None;
        self.tables.clear();
        self.table_index.clear();
    }

    /// Establishes species grouping: fills per-particle mass and charge from
    /// the species table, writes member counts back, rebuilds the group
    /// offsets, and records whether identity order equals group order.
    ///
    /// The group-ordered permutation is validated to be a true permutation of
    /// the identity; anything else indicates corrupt group ids.
    pub fn regroup(&mut self) -> Result<(), EngineError> {
        let nspecies = self.species.len();
        if nspecies == 0 {
            return Err(EngineError::SpeciesMissing {
                set: self.name.clone(),
            });
        }

        for i in 0..self.positions.len() {
            let g = self.group_id[i];
            if g >= nspecies {
                return Err(EngineError::GroupOutOfBounds {
                    index: i,
                    group: g,
                    species: nspecies,
                });
            }
            self.charge[i] = self.species.charge_of(g);
            self.mass[i] = self.species.mass_of(g);
        }

        let m0 = self.species.mass_of(0);
        self.same_mass = (0..nspecies).all(|g| self.species.mass_of(g) == m0);
        if self.same_mass {
            debug!(set = %self.name, mass = m0, "all species share one mass");
        } else {
            debug!(set = %self.name, "distinct per-species masses");
        }

        let mut counts = vec![0usize; nspecies];
        for &g in &self.group_id {
            counts[g] += 1;
        }
        self.sub_ptcl = vec![0; nspecies + 1];
        for g in 0..nspecies {
            self.sub_ptcl[g + 1] = self.sub_ptcl[g] + counts[g];
            self.species.set_member_count(g, counts[g]);
        }

        let mut next = 0;
        for g in 0..nspecies {
            for i in 0..self.group_id.len() {
                if self.group_id[i] == g {
                    self.indirect_id[next] = self.id[i];
                    next += 1;
                }
            }
        }

        let mut seen = vec![false; self.indirect_id.len()];
        for &p in &self.indirect_id {
            if p >= seen.len() || seen[p] {
                return Err(EngineError::CorruptGrouping {
                    set: self.name.clone(),
                });
            }
            seen[p] = true;
        }

        self.is_grouped = self
            .indirect_id
            .iter()
            .enumerate()
            .all(|(i, &p)| p == self.id[i]);
        if self.is_grouped {
            debug!(set = %self.name, "particles are grouped; species ranges are contiguous");
        } else {
            debug!(set = %self.name, "identity order differs from group order; species-wise loops must use the indirect index");
        }
        Ok(())
    }

    // --- distance table registry ---------------------------------------

    fn ensure_self_table(&mut self) -> Result<usize, EngineError> {
        if self.name.is_empty() {
            return Err(EngineError::UnnamedParticleSet);
        }
        if self.tables.is_empty() {
            debug!(set = %self.name, "creating self-pair distance table #0");
            self.tables
                .push(DistanceTable::like_pairs(&self.name, self.positions.len()));
            self.table_index.insert(self.name.clone(), 0);
        }
        Ok(0)
    }

    /// Registers the self-pair table (always table 0) and returns its index.
    pub fn add_self_table(&mut self) -> Result<usize, EngineError> {
        self.ensure_self_table()
    }

    /// Registers a table against `partner`, keyed by the partner's name.
    ///
    /// The self-pair table is created first if it does not exist yet.
    /// Re-registering a known partner reuses the existing table. The table
    /// holds a snapshot of the partner's committed coordinates; call
    /// [`ParticleSet::refresh_table`] after the partner changes.
    pub fn add_table(&mut self, partner: &ParticleSet) -> Result<usize, EngineError> {
        self.ensure_self_table()?;
        if partner.name == self.name {
            return Ok(0);
        }
        if let Some(&tid) = self.table_index.get(&partner.name) {
            debug!(set = %self.name, table = tid, partner = %partner.name, "reusing distance table");
            return Ok(tid);
        }
        let tid = self.tables.len();
        debug!(set = %self.name, table = tid, partner = %partner.name, "creating distance table");
        self.tables.push(DistanceTable::unlike_pairs(
            &self.name,
            &partner.name,
            self.positions.len(),
            &partner.positions,
        ));
        self.table_index.insert(partner.name.clone(), tid);
        Ok(tid)
    }

    /// Re-derives the table registered for `partner` from the partner's
    /// current committed coordinates, then recomputes it in full.
    pub fn refresh_table(&mut self, partner: &ParticleSet) -> Result<(), EngineError> {
        let &tid = self
            .table_index
            .get(&partner.name)
            .ok_or_else(|| EngineError::UnknownTable {
                partner: partner.name.clone(),
            })?;
        let table = &mut self.tables[tid];
        if !table.is_like_table() {
            table.refresh_source(&partner.positions)?;
        }
        table.evaluate_all(&self.positions)
    }

    pub fn table(&self, index: usize) -> Option<&DistanceTable> {
        self.tables.get(index)
    }

    pub fn table_for(&self, partner: &str) -> Option<&DistanceTable> {
        self.table_index.get(partner).map(|&tid| &self.tables[tid])
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    // --- move protocol --------------------------------------------------

    /// Proposes moving particle `iat` by `displ`.
    ///
    /// Returns `Ok(true)` and transitions to `Proposed` when the trial
    /// position is representable: the trial position is recorded and every
    /// owned table evaluates its scratch row against it. Returns `Ok(false)`
    /// when boundary enforcement rejects the move geometrically; the state
    /// stays `Idle` and no table is touched. Proposing while another move is
    /// in flight is a protocol violation.
    pub fn propose_move(&mut self, iat: usize, displ: PosVector) -> Result<bool, EngineError> {
        if let Some(active) = self.active_particle {
            return Err(EngineError::MoveInFlight { active });
        }
        if iat >= self.positions.len() {
            return Err(EngineError::ParticleOutOfBounds {
                index: iat,
                total: self.positions.len(),
            });
        }
        let trial = self.positions[iat] + displ;
        if self.use_bound_box {
            if self.cell.is_out_of_bound(self.cell.to_unit(displ)) {
                return Ok(false);
            }
            if !self.cell.is_valid(self.cell.to_unit(trial)) {
                return Ok(false);
            }
        }
        self.active_particle = Some(iat);
        self.active_position = trial;
        for table in &mut self.tables {
            table.evaluate_move(&self.positions, trial, iat)?;
        }
        Ok(true)
    }

    /// Proposes a move of particle `iat` constrained to a sphere around its
    /// committed position (angular-quadrature probes).
    ///
    /// No boundary check is performed: the probe radius is chosen by the
    /// caller around an already-valid position.
    pub fn propose_move_on_sphere(
        &mut self,
        iat: usize,
        displ: PosVector,
    ) -> Result<(), EngineError> {
        if let Some(active) = self.active_particle {
            return Err(EngineError::MoveInFlight { active });
        }
        if iat >= self.positions.len() {
            return Err(EngineError::ParticleOutOfBounds {
                index: iat,
                total: self.positions.len(),
            });
        }
        let trial = self.positions[iat] + displ;
        self.active_particle = Some(iat);
        self.active_position = trial;
        for table in &mut self.tables {
            table.evaluate_move_on_sphere(&self.positions, trial, iat)?;
        }
        Ok(())
    }

    /// Commits the move in flight for particle `iat`: the trial position
    /// becomes the committed position and every table commits its scratch
    /// row. The two indices must match; anything else is a driver bug and
    /// fails loudly rather than corrupting sampling state.
    pub fn accept_move(&mut self, iat: usize) -> Result<(), EngineError> {
        match self.active_particle {
            Some(active) if active == iat => {
                for table in &mut self.tables {
                    table.update(iat)?;
                }
                self.positions[iat] = self.active_position;
                self.active_particle = None;
                Ok(())
            }
            expected => Err(EngineError::AcceptMismatch {
                expected,
                found: iat,
            }),
        }
    }

    /// Discards the move in flight, if any. Positions and committed table
    /// data are untouched; the scratch rows become unreachable. Safe to call
    /// from `Idle` (idempotent no-op).
    pub fn reject_move(&mut self, _iat: usize) {
        for table in &mut self.tables {
            table.discard();
        }
        self.active_particle = None;
    }

    /// Per-sweep bookkeeping reset after a full pass over all particles.
    /// Clears the active-particle guard without recomputing any table.
    pub fn finish_sweep(&mut self) {
        for table in &mut self.tables {
            table.discard();
        }
        self.active_particle = None;
    }

    /// Full refresh: recomputes every owned table from committed positions
    /// and clears any active move. Used at initialization and after bulk
    /// repositioning.
    pub fn update(&mut self) -> Result<(), EngineError> {
        for table in &mut self.tables {
            table.evaluate_all(&self.positions)?;
        }
        self.active_particle = None;
        Ok(())
    }

    // --- walker snapshots ------------------------------------------------

    /// Adopts a full position snapshot (e.g. a stored walker) and refreshes
    /// every table.
    pub fn load_positions(&mut self, positions: &[PosVector]) -> Result<(), EngineError> {
        if positions.len() != self.positions.len() {
            return Err(EngineError::PositionCountMismatch {
                expected: self.positions.len(),
                found: positions.len(),
            });
        }
        self.positions.copy_from_slice(positions);
        self.update()
    }

    /// Copies out the committed positions (e.g. to store a walker).
    pub fn save_positions(&self) -> Vec<PosVector> {
        self.positions.clone()
    }

    // --- accessors --------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell(&self) -> &SimulationCell {
        &self.cell
    }

    pub fn species(&self) -> &SpeciesSet {
        &self.species
    }

    /// Enables or disables boundary enforcement for proposed moves.
    pub fn set_bound_box(&mut self, yes: bool) {
        self.use_bound_box = yes;
    }

    pub fn total_num(&self) -> usize {
        self.positions.len()
    }

    pub fn groups(&self) -> usize {
        self.sub_ptcl.len().saturating_sub(1)
    }

    /// Index range of group `g` in group order.
    pub fn group_range(&self, g: usize) -> std::ops::Range<usize> {
        self.sub_ptcl[g]..self.sub_ptcl[g + 1]
    }

    pub fn positions(&self) -> &[PosVector] {
        &self.positions
    }

    pub fn position(&self, i: usize) -> PosVector {
        self.positions[i]
    }

    /// Directly overwrites a committed position. Setup-time only: distance
    /// tables are stale until the next [`ParticleSet::update`].
    pub fn set_position(&mut self, i: usize, position: PosVector) {
        self.positions[i] = position;
    }

    pub fn group(&self, i: usize) -> usize {
        self.group_id[i]
    }

    pub fn charge(&self, i: usize) -> Real {
        self.charge[i]
    }

    pub fn mass(&self, i: usize) -> Real {
        self.mass[i]
    }

    pub fn same_mass(&self) -> bool {
        self.same_mass
    }

    pub fn is_grouped(&self) -> bool {
        self.is_grouped
    }

    /// Group-ordered permutation of particle identities, rebuilt by
    /// [`ParticleSet::regroup`].
    pub fn indirect_id(&self) -> &[usize] {
        &self.indirect_id
    }

    pub fn active_particle(&self) -> Option<usize> {
        self.active_particle
    }

    /// Trial position of the move in flight, if any.
    pub fn active_position(&self) -> Option<PosVector> {
        self.active_particle.map(|_| self.active_position)
    }
}
