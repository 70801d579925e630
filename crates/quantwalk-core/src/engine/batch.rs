use crate::core::utils::geometry::{PosVector, Real};
use crate::engine::error::EngineError;
use crate::engine::executor::ExecutionContext;
use crate::engine::particle_set::ParticleSet;
use tracing::trace;

/// Compacts a per-walker flag array into a dense index list, so dispatches
/// spend no parallel lanes on inactive walkers.
pub fn active_map(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}

/// Applies one move-protocol operation across an ensemble of independent
/// walkers as a single data-parallel dispatch.
///
/// Walkers share no mutable state, so no cross-walker synchronization exists;
/// each dispatch is a barrier, and per-walker results are identical to
/// calling the single-configuration API once per walker. Batching changes
/// scheduling, never outcomes.
#[derive(Debug, Default, Clone)]
pub struct BatchDispatcher<C: ExecutionContext> {
    ctx: C,
}

impl<C: ExecutionContext> BatchDispatcher<C> {
    pub fn new(ctx: C) -> Self {
        Self { ctx }
    }

    fn check_shape(walkers: usize, found: usize) -> Result<(), EngineError> {
        if walkers == found {
            Ok(())
        } else {
            Err(EngineError::BatchShapeMismatch {
                expected: walkers,
                found,
            })
        }
    }

    /// Proposes moving particle `iat` in every walker, each by its own
    /// displacement.
    ///
    /// Returns one validity flag per walker: `false` marks a geometric
    /// (boundary) rejection, which leaves that walker `Idle` and excludes it
    /// from subsequent table work this step without aborting the batch.
    /// Protocol violations in any walker fail the whole call.
    pub fn propose(
        &self,
        walkers: &mut [ParticleSet],
        iat: usize,
        displacements: &[PosVector],
    ) -> Result<Vec<bool>, EngineError> {
        Self::check_shape(walkers.len(), displacements.len())?;
        let results = self
            .ctx
            .dispatch_mut(walkers, |w, walker| walker.propose_move(iat, displacements[w]));
        results.into_iter().collect()
    }

    /// Partitions the walkers flagged active this step into an accepted
    /// subset, committed with `accept_move` semantics, and a rejected subset,
    /// cleared with `reject_move` semantics. Inactive walkers are untouched.
    ///
    /// The accepted subset is compacted into a dense handle list before
    /// dispatch (the gather step), so lane count equals accepted count.
    pub fn accept_reject(
        &self,
        walkers: &mut [ParticleSet],
        iat: usize,
        is_accepted: &[bool],
        is_active: &[bool],
    ) -> Result<(), EngineError> {
        Self::check_shape(walkers.len(), is_accepted.len())?;
        Self::check_shape(walkers.len(), is_active.len())?;

        let mut accepted: Vec<&mut ParticleSet> = Vec::with_capacity(walkers.len());
        for (w, walker) in walkers.iter_mut().enumerate() {
            if !is_active[w] {
                continue;
            }
            if is_accepted[w] {
                accepted.push(walker);
            } else {
                walker.reject_move(iat);
            }
        }
        trace!(
            particle = iat,
            accepted = accepted.len(),
            "batched accept/reject dispatch"
        );

        self.ctx
            .dispatch_mut(&mut accepted, |_, walker| walker.accept_move(iat))
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    /// Batched per-sweep bookkeeping reset.
    pub fn finish_sweep(&self, walkers: &mut [ParticleSet]) {
        self.ctx.dispatch_mut(walkers, |_, walker| walker.finish_sweep());
    }

    /// Batched full table refresh from committed positions.
    pub fn refresh(&self, walkers: &mut [ParticleSet]) -> Result<(), EngineError> {
        self.ctx
            .dispatch_mut(walkers, |_, walker| walker.update())
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    /// Gathers the pending trial rows of table `table` across the active
    /// walkers into one contiguous buffer, laid out walker-major: the row of
    /// active walker `k` occupies `out[k * centers..(k + 1) * centers]`.
    ///
    /// The flat (walker × partner) index space makes occupancy a function of
    /// total work rather than walker count. Every active walker must have a
    /// pending trial row on a table of identical shape.
    pub fn gather_trial_distances(
        &self,
        walkers: &[ParticleSet],
        table: usize,
        is_active: &[bool],
    ) -> Result<Vec<Real>, EngineError> {
        Self::check_shape(walkers.len(), is_active.len())?;
        let map = active_map(is_active);
        let Some(&first) = map.first() else {
            return Ok(Vec::new());
        };

        let centers = walkers[first]
            .table(table)
            .ok_or(EngineError::UnknownTableIndex {
                index: table,
                tables: walkers[first].num_tables(),
            })?
            .centers();
        for &w in &map {
            let t = walkers[w]
                .table(table)
                .ok_or(EngineError::UnknownTableIndex {
                    index: table,
                    tables: walkers[w].num_tables(),
                })?;
            if t.centers() != centers {
                return Err(EngineError::BatchShapeMismatch {
                    expected: centers,
                    found: t.centers(),
                });
            }
            if t.trial_distances().is_none() {
                return Err(EngineError::TrialRowMissing {
                    particle: walkers[w].active_particle().unwrap_or(usize::MAX),
                });
            }
        }

        Ok(self.ctx.dispatch(map.len() * centers, |k| {
            let walker = &walkers[map[k / centers]];
            walker.table(table).unwrap().trial_distances().unwrap()[k % centers]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::cell::SimulationCell;
    use crate::core::models::species::SpeciesSet;
    use crate::engine::executor::SerialContext;
    use crate::engine::utils::moves::gaussian_displacements;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn make_walker(cell: SimulationCell, shift: Real) -> ParticleSet {
        let mut species = SpeciesSet::new();
        species.add_species("u", -1.0, 1.0);
        let mut set = ParticleSet::new("e", species, cell);
        set.create(&[3]);
        set.set_position(0, PosVector::new(0.2 + shift, 0.3, 0.4));
        set.set_position(1, PosVector::new(1.1, 0.9 + shift, 0.2));
        set.set_position(2, PosVector::new(0.7, 1.4, 1.3 + shift));
        set.regroup().unwrap();
        set.add_self_table().unwrap();
        set.update().unwrap();
        set
    }

    fn open_ensemble(count: usize) -> Vec<ParticleSet> {
        (0..count)
            .map(|w| make_walker(SimulationCell::open(), 0.05 * w as Real))
            .collect()
    }

    fn assert_same_state(a: &ParticleSet, b: &ParticleSet) {
        assert_eq!(a.save_positions(), b.save_positions());
        for i in 0..a.total_num() {
            assert_eq!(a.table(0).unwrap().row(i), b.table(0).unwrap().row(i));
        }
        assert_eq!(a.active_particle(), b.active_particle());
    }

    #[test]
    fn batch_matches_sequential_walker_by_walker() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let mut batched = open_ensemble(6);
        let mut sequential = batched.clone();
        let mut rng = StdRng::seed_from_u64(42);

        for iat in 0..3 {
            let kicks = gaussian_displacements(&mut rng, batched.len(), 0.3).unwrap();
            // Deterministic accept pattern standing in for the Metropolis
            // decision the driver would make.
            let accept: Vec<bool> = (0..batched.len()).map(|w| (w + iat) % 2 == 0).collect();

            let valid = dispatcher.propose(&mut batched, iat, &kicks).unwrap();
            dispatcher
                .accept_reject(&mut batched, iat, &accept, &valid)
                .unwrap();

            for (w, walker) in sequential.iter_mut().enumerate() {
                let ok = walker.propose_move(iat, kicks[w]).unwrap();
                assert_eq!(ok, valid[w]);
                if !ok {
                    continue;
                }
                if accept[w] {
                    walker.accept_move(iat).unwrap();
                } else {
                    walker.reject_move(iat);
                }
            }
        }

        for (a, b) in batched.iter().zip(&sequential) {
            assert_same_state(a, b);
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn rayon_batch_matches_serial_batch() {
        use crate::engine::executor::RayonContext;

        let serial = BatchDispatcher::new(SerialContext);
        let parallel = BatchDispatcher::new(RayonContext);
        let mut a = open_ensemble(8);
        let mut b = a.clone();
        let mut rng = StdRng::seed_from_u64(7);

        let kicks = gaussian_displacements(&mut rng, a.len(), 0.2).unwrap();
        let accept = vec![true; a.len()];

        let va = serial.propose(&mut a, 1, &kicks).unwrap();
        let vb = parallel.propose(&mut b, 1, &kicks).unwrap();
        assert_eq!(va, vb);

        serial.accept_reject(&mut a, 1, &accept, &va).unwrap();
        parallel.accept_reject(&mut b, 1, &accept, &vb).unwrap();

        for (x, y) in a.iter().zip(&b) {
            assert_same_state(x, y);
        }
    }

    #[test]
    fn boundary_rejections_do_not_abort_the_batch() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let mut walkers: Vec<ParticleSet> = (0..3)
            .map(|_| {
                let mut w = make_walker(SimulationCell::cubic(2.0).unwrap(), 0.0);
                w.update().unwrap();
                w
            })
            .collect();

        // Walker 1 gets a displacement past the minimum image; the others
        // stay well inside the cell.
        let kicks = vec![
            PosVector::new(0.1, 0.0, 0.0),
            PosVector::new(1.8, 0.0, 0.0),
            PosVector::new(0.0, 0.1, 0.0),
        ];
        let valid = dispatcher.propose(&mut walkers, 0, &kicks).unwrap();
        assert_eq!(valid, vec![true, false, true]);
        assert_eq!(walkers[1].active_particle(), None);

        let accept = vec![true, true, true];
        dispatcher
            .accept_reject(&mut walkers, 0, &accept, &valid)
            .unwrap();
        // The invalid walker was excluded from the accept dispatch.
        assert_eq!(walkers[1].position(0), PosVector::new(0.2, 0.3, 0.4));
    }

    #[test]
    fn inactive_walkers_are_untouched() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let mut walkers = open_ensemble(2);

        let kicks = vec![PosVector::new(0.1, 0.0, 0.0); 2];
        let valid = dispatcher.propose(&mut walkers, 0, &kicks).unwrap();
        assert_eq!(valid, vec![true, true]);

        // Mark walker 1 inactive: its pending move must survive untouched.
        let active = vec![true, false];
        let accept = vec![true, true];
        dispatcher
            .accept_reject(&mut walkers, 0, &accept, &active)
            .unwrap();

        assert_eq!(walkers[0].active_particle(), None);
        assert_eq!(walkers[1].active_particle(), Some(0));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let mut walkers = open_ensemble(3);
        let kicks = vec![PosVector::zeros(); 2];
        assert!(matches!(
            dispatcher.propose(&mut walkers, 0, &kicks),
            Err(EngineError::BatchShapeMismatch {
                expected: 3,
                found: 2,
            })
        ));
    }

    #[test]
    fn active_map_compacts_flags() {
        assert_eq!(active_map(&[true, false, true, true]), vec![0, 2, 3]);
        assert!(active_map(&[false, false]).is_empty());
    }

    #[test]
    fn gather_trial_distances_packs_rows_walker_major() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let mut walkers = open_ensemble(3);
        let kicks = vec![PosVector::new(0.05, 0.0, 0.0); 3];
        let valid = dispatcher.propose(&mut walkers, 2, &kicks).unwrap();

        let packed = dispatcher
            .gather_trial_distances(&walkers, 0, &valid)
            .unwrap();
        let centers = walkers[0].table(0).unwrap().centers();
        assert_eq!(packed.len(), 3 * centers);

        for (k, walker) in walkers.iter().enumerate() {
            let row = walker.table(0).unwrap().trial_distances().unwrap();
            assert_eq!(&packed[k * centers..(k + 1) * centers], row);
        }
    }

    #[test]
    fn gather_without_pending_trials_is_an_error() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let walkers = open_ensemble(2);
        let active = vec![true, true];
        assert!(matches!(
            dispatcher.gather_trial_distances(&walkers, 0, &active),
            Err(EngineError::TrialRowMissing { .. })
        ));
    }

    #[test]
    fn batched_sweep_reset_clears_every_walker() {
        let dispatcher = BatchDispatcher::new(SerialContext);
        let mut walkers = open_ensemble(4);
        let kicks = vec![PosVector::new(0.1, 0.0, 0.0); 4];
        dispatcher.propose(&mut walkers, 0, &kicks).unwrap();

        dispatcher.finish_sweep(&mut walkers);
        assert!(walkers.iter().all(|w| w.active_particle().is_none()));
    }
}
