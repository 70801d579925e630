use crate::core::utils::geometry::{PosVector, Real};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Displacement width must be positive and finite (got {0})")]
    InvalidWidth(f64),
}

/// Draws one isotropic Gaussian trial displacement per walker.
///
/// `sigma` is the per-axis width, i.e. `sqrt(tau)` for a drift-free
/// diffusion kick with time step `tau`. Components are drawn in walker
/// order, x then y then z, so a seeded generator yields a reproducible
/// stream.
pub fn gaussian_displacements<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    sigma: Real,
) -> Result<Vec<PosVector>, SamplingError> {
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(SamplingError::InvalidWidth(sigma));
    }
    let normal = Normal::new(0.0, sigma).map_err(|_| SamplingError::InvalidWidth(sigma))?;
    Ok((0..count)
        .map(|_| {
            PosVector::new(
                normal.sample(rng),
                normal.sample(rng),
                normal.sample(rng),
            )
        })
        .collect())
}
