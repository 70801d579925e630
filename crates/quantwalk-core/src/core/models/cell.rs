use crate::core::utils::geometry::{PosVector, Real};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("Lattice matrix is singular and cannot define a periodic cell")]
    SingularLattice,
}

/// Boundary handling applied when a move is proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryConditions {
    /// No boundaries; every point is representable.
    Open,
    /// Periodic boundaries; positions live in the unit cell of the lattice.
    Periodic,
}

/// The simulation cell: lattice vectors plus boundary conditions.
///
/// The cell answers exactly two questions for the move protocol, both posed
/// in reduced (lattice) coordinates obtained from [`SimulationCell::to_unit`]:
///
/// - is a proposed *displacement* out of bound (any reduced component larger
///   than 1/2 in magnitude, i.e. beyond the minimum image)?
/// - is a proposed *position* inside the valid `[0, 1)` domain?
///
/// Open cells answer "no" and "yes" unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationCell {
    boundary: BoundaryConditions,
    lattice: Matrix3<Real>,
    inverse: Matrix3<Real>,
}

impl SimulationCell {
    /// An unbounded cell. The lattice is the identity, so reduced and
    /// Cartesian coordinates coincide.
    pub fn open() -> Self {
        Self {
            boundary: BoundaryConditions::Open,
            lattice: Matrix3::identity(),
            inverse: Matrix3::identity(),
        }
    }

    /// A periodic cell spanned by the columns of `lattice`.
    pub fn periodic(lattice: Matrix3<Real>) -> Result<Self, CellError> {
        let inverse = lattice.try_inverse().ok_or(CellError::SingularLattice)?;
        Ok(Self {
            boundary: BoundaryConditions::Periodic,
            lattice,
            inverse,
        })
    }

    /// A periodic cubic cell with edge length `a`.
    pub fn cubic(a: Real) -> Result<Self, CellError> {
        Self::periodic(Matrix3::identity() * a)
    }

    pub fn boundary(&self) -> BoundaryConditions {
        self.boundary
    }

    pub fn lattice(&self) -> &Matrix3<Real> {
        &self.lattice
    }

    /// Reduced (lattice) coordinates of a Cartesian vector.
    #[inline]
    pub fn to_unit(&self, cartesian: PosVector) -> PosVector {
        self.inverse * cartesian
    }

    /// Cartesian coordinates of a reduced vector.
    #[inline]
    pub fn to_cartesian(&self, unit: PosVector) -> PosVector {
        self.lattice * unit
    }

    /// Minimum-image test on a reduced *displacement*: true when any
    /// component reaches past half a lattice vector.
    #[inline]
    pub fn is_out_of_bound(&self, unit: PosVector) -> bool {
        match self.boundary {
            BoundaryConditions::Open => false,
            BoundaryConditions::Periodic => unit.iter().any(|c| c.abs() > 0.5),
        }
    }

    /// Domain test on a reduced *position*: true when the point is
    /// representable under the cell's boundary conditions.
    #[inline]
    pub fn is_valid(&self, unit: PosVector) -> bool {
        match self.boundary {
            BoundaryConditions::Open => true,
            BoundaryConditions::Periodic => unit.iter().all(|&c| (0.0..1.0).contains(&c)),
        }
    }
}

impl Default for SimulationCell {
    fn default() -> Self {
        Self::open()
    }
}
