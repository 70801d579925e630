#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A data-parallel execution context: bulk-synchronous dispatch over flat
/// index spaces.
///
/// Both forms are barriers: they return only once every work item has
/// completed, so a commit dispatched through a context is fully visible
/// before the next proposal is evaluated. Results are gathered in index
/// order and per-item kernels are independent, which is what makes batched
/// execution bit-for-bit identical to sequential execution regardless of
/// backend.
pub trait ExecutionContext: Sync {
    /// Dispatches `count` independent work items over a flat index space.
    fn dispatch<R, K>(&self, count: usize, kernel: K) -> Vec<R>
    where
        R: Send,
        K: Fn(usize) -> R + Send + Sync;

    /// Dispatches one logical worker per item of a mutable slice (the
    /// hierarchical, team-per-walker form).
    fn dispatch_mut<T, R, K>(&self, items: &mut [T], kernel: K) -> Vec<R>
    where
        T: Send,
        R: Send,
        K: Fn(usize, &mut T) -> R + Send + Sync;
}

/// Reference backend: runs every work item on the calling thread, in index
/// order. Always available; the correctness baseline for the others.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialContext;

impl ExecutionContext for SerialContext {
    fn dispatch<R, K>(&self, count: usize, kernel: K) -> Vec<R>
    where
        R: Send,
        K: Fn(usize) -> R + Send + Sync,
    {
        (0..count).map(kernel).collect()
    }

    fn dispatch_mut<T, R, K>(&self, items: &mut [T], kernel: K) -> Vec<R>
    where
        T: Send,
        R: Send,
        K: Fn(usize, &mut T) -> R + Send + Sync,
    {
        items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| kernel(i, item))
            .collect()
    }
}

/// Multi-threaded backend over the rayon work-stealing pool. Occupancy is
/// determined by total work, not by how the caller shaped it.
#[cfg(feature = "parallel")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonContext;

#[cfg(feature = "parallel")]
impl ExecutionContext for RayonContext {
    fn dispatch<R, K>(&self, count: usize, kernel: K) -> Vec<R>
    where
        R: Send,
        K: Fn(usize) -> R + Send + Sync,
    {
        (0..count).into_par_iter().map(kernel).collect()
    }

    fn dispatch_mut<T, R, K>(&self, items: &mut [T], kernel: K) -> Vec<R>
    where
        T: Send,
        R: Send,
        K: Fn(usize, &mut T) -> R + Send + Sync,
    {
        items
            .par_iter_mut()
            .enumerate()
            .map(|(i, item)| kernel(i, item))
            .collect()
    }
}

/// The preferred backend for this build.
#[cfg(feature = "parallel")]
pub type DefaultContext = RayonContext;

/// The preferred backend for this build.
#[cfg(not(feature = "parallel"))]
pub type DefaultContext = SerialContext;
