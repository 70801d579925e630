use crate::core::utils::geometry::{PosVector, Real};
use crate::engine::error::EngineError;
use itertools::Itertools;
use tracing::{debug, trace};

/// Incrementally maintained matrix of pairwise distances and displacements
/// between two particle groups.
///
/// The table always reflects the last *committed* state of both groups; trial
/// data for the one move in flight lives in a separate scratch row that is
/// only reachable while the move is pending. Storage is a single canonical
/// structure-of-arrays layout: flat row-major matrices, one contiguous
/// allocation per field.
///
/// Sign convention, fixed once: `displacement(i, j) = partner[j] - owner[i]`,
/// where the owner indexes rows and the partner indexes columns. For
/// self-pair tables (owner == partner) the matrix is antisymmetric in the
/// displacements and symmetric in the distances, with a zero diagonal.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    name: String,
    rows: usize,
    cols: usize,
    distances: Vec<Real>,
    displacements: Vec<PosVector>,
    trial_distances: Vec<Real>,
    trial_displacements: Vec<PosVector>,
    /// Particle the scratch row was evaluated for; `None` means no trial is
    /// pending and the scratch row must not be read.
    trial_row: Option<usize>,
    /// Committed coordinates of the partner group. `None` marks a self-pair
    /// table, whose partner is the owner itself.
    source: Option<Vec<PosVector>>,
}

impl DistanceTable {
    /// Table between a group and itself (e.g. electron-electron).
    pub fn like_pairs(owner: &str, count: usize) -> Self {
        Self::with_shape(format!("d_{owner}_{owner}"), count, count, None)
    }

    /// Table between an owner group and a distinct partner group
    /// (e.g. electron-ion). The partner's committed coordinates are held as
    /// an explicit snapshot; call [`DistanceTable::refresh_source`] after the
    /// partner changes.
    pub fn unlike_pairs(
        owner: &str,
        source_name: &str,
        rows: usize,
        source: &[PosVector],
    ) -> Self {
        Self::with_shape(
            format!("d_{source_name}_{owner}"),
            rows,
            source.len(),
            Some(source.to_vec()),
        )
    }

    fn with_shape(name: String, rows: usize, cols: usize, source: Option<Vec<PosVector>>) -> Self {
        Self {
            name,
            rows,
            cols,
            distances: vec![0.0; rows * cols],
            displacements: vec![PosVector::zeros(); rows * cols],
            trial_distances: vec![0.0; cols],
            trial_displacements: vec![PosVector::zeros(); cols],
            trial_row: None,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of row particles (the owning group).
    pub fn targets(&self) -> usize {
        self.rows
    }

    /// Number of column particles (the partner group).
    pub fn centers(&self) -> usize {
        self.cols
    }

    pub fn is_like_table(&self) -> bool {
        self.source.is_none()
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.cols + j
    }

    /// Full O(rows × cols) recomputation from committed coordinates.
    ///
    /// Any pending trial row is dropped; the scratch data would be stale.
    pub fn evaluate_all(&mut self, owner: &[PosVector]) -> Result<(), EngineError> {
        if owner.len() != self.rows {
            return Err(EngineError::PositionCountMismatch {
                expected: self.rows,
                found: owner.len(),
            });
        }
        debug!(table = %self.name, rows = self.rows, cols = self.cols, "full distance recomputation");

        match &self.source {
            None => {
                for i in 0..self.rows {
                    let ii = self.idx(i, i);
                    self.distances[ii] = 0.0;
                    self.displacements[ii] = PosVector::zeros();
                }
                for (i, j) in (0..self.rows).tuple_combinations() {
                    let dr = owner[j] - owner[i];
                    let r = dr.norm();
                    let ij = self.idx(i, j);
                    let ji = self.idx(j, i);
                    self.distances[ij] = r;
                    self.distances[ji] = r;
                    self.displacements[ij] = dr;
                    self.displacements[ji] = -dr;
                }
            }
            Some(source) => {
                for i in 0..self.rows {
                    for j in 0..self.cols {
                        let dr = source[j] - owner[i];
                        let k = i * self.cols + j;
                        self.distances[k] = dr.norm();
                        self.displacements[k] = dr;
                    }
                }
            }
        }
        self.trial_row = None;
        Ok(())
    }

    /// O(cols) evaluation of the scratch row for a proposed move of particle
    /// `iat` to `trial`. The committed matrix is not touched.
    pub fn evaluate_move(
        &mut self,
        owner: &[PosVector],
        trial: PosVector,
        iat: usize,
    ) -> Result<(), EngineError> {
        if iat >= self.rows {
            return Err(EngineError::ParticleOutOfBounds {
                index: iat,
                total: self.rows,
            });
        }
        match &self.source {
            None => {
                if owner.len() != self.rows {
                    return Err(EngineError::PositionCountMismatch {
                        expected: self.rows,
                        found: owner.len(),
                    });
                }
                for j in 0..self.cols {
                    let dr = owner[j] - trial;
                    self.trial_displacements[j] = dr;
                    self.trial_distances[j] = dr.norm();
                }
                // The self-distance slot carries no information; pin it.
                self.trial_distances[iat] = 0.0;
                self.trial_displacements[iat] = PosVector::zeros();
            }
            Some(source) => {
                for j in 0..self.cols {
                    let dr = source[j] - trial;
                    self.trial_displacements[j] = dr;
                    self.trial_distances[j] = dr.norm();
                }
            }
        }
        self.trial_row = Some(iat);
        Ok(())
    }

    /// Scratch-row evaluation for a move constrained to a fixed-radius sphere
    /// around the particle's committed position (angular-quadrature probes).
    ///
    /// Same contract as [`DistanceTable::evaluate_move`]; only the geometric
    /// source of `trial` differs, so the arithmetic is shared.
    pub fn evaluate_move_on_sphere(
        &mut self,
        owner: &[PosVector],
        trial: PosVector,
        iat: usize,
    ) -> Result<(), EngineError> {
        self.evaluate_move(owner, trial, iat)
    }

    /// Commits the pending scratch row into the matrix at row `iat`.
    ///
    /// Self-pair tables mirror the row into column `iat` with the sign of the
    /// displacement flipped, so symmetry holds after every commit. Committing
    /// without a prior evaluation for the same particle is a protocol
    /// violation.
    pub fn update(&mut self, iat: usize) -> Result<(), EngineError> {
        match self.trial_row {
            Some(row) if row == iat => {}
            _ => return Err(EngineError::TrialRowMissing { particle: iat }),
        }
        match &self.source {
            None => {
                for j in 0..self.cols {
                    if j == iat {
                        continue;
                    }
                    let r = self.trial_distances[j];
                    let dr = self.trial_displacements[j];
                    let ij = self.idx(iat, j);
                    let ji = self.idx(j, iat);
                    self.distances[ij] = r;
                    self.distances[ji] = r;
                    self.displacements[ij] = dr;
                    self.displacements[ji] = -dr;
                }
            }
            Some(_) => {
                let start = iat * self.cols;
                self.distances[start..start + self.cols].copy_from_slice(&self.trial_distances);
                self.displacements[start..start + self.cols]
                    .copy_from_slice(&self.trial_displacements);
            }
        }
        trace!(table = %self.name, particle = iat, "committed trial row");
        self.trial_row = None;
        Ok(())
    }

    /// Abandons the pending scratch row. Always safe; no mutation beyond the
    /// pending tag occurs.
    pub fn discard(&mut self) {
        self.trial_row = None;
    }

    /// Re-derives the partner snapshot of an unlike table after the partner
    /// configuration changed. The caller is expected to follow up with
    /// [`DistanceTable::evaluate_all`].
    pub fn refresh_source(&mut self, source: &[PosVector]) -> Result<(), EngineError> {
        match &mut self.source {
            None => Err(EngineError::Internal(format!(
                "table '{}' is a self-pair table and has no source snapshot",
                self.name
            ))),
            Some(snapshot) => {
                if source.len() != self.cols {
                    return Err(EngineError::SourceSizeMismatch {
                        table: self.name.clone(),
                        expected: self.cols,
                        found: source.len(),
                    });
                }
                snapshot.copy_from_slice(source);
                Ok(())
            }
        }
    }

    /// Committed distance between row particle `i` and column particle `j`.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> Real {
        self.distances[self.idx(i, j)]
    }

    /// Committed displacement `partner[j] - owner[i]`.
    #[inline]
    pub fn displacement(&self, i: usize, j: usize) -> PosVector {
        self.displacements[self.idx(i, j)]
    }

    /// Committed distance row of particle `i`.
    pub fn row(&self, i: usize) -> &[Real] {
        &self.distances[i * self.cols..(i + 1) * self.cols]
    }

    /// Committed displacement row of particle `i`.
    pub fn displacement_row(&self, i: usize) -> &[PosVector] {
        &self.displacements[i * self.cols..(i + 1) * self.cols]
    }

    /// Particle the pending trial row belongs to, if a move is in flight.
    pub fn trial_particle(&self) -> Option<usize> {
        self.trial_row
    }

    /// Trial distances of the pending move; `None` when no move is pending,
    /// so trial data can never be mistaken for committed data.
    pub fn trial_distances(&self) -> Option<&[Real]> {
        self.trial_row.map(|_| self.trial_distances.as_slice())
    }

    /// Trial displacements of the pending move.
    pub fn trial_displacements(&self) -> Option<&[PosVector]> {
        self.trial_row.map(|_| self.trial_displacements.as_slice())
    }
}
