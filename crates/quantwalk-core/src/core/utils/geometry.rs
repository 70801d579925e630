use nalgebra::{Matrix3, Vector3};

/// Scalar type used for all positions, distances, and derived quantities.
pub type Real = f64;

/// A 3-D position or displacement in Cartesian coordinates.
pub type PosVector = Vector3<Real>;

/// A 3-D gradient value, dimensionally distinct from a position but sharing
/// its representation.
pub type GradVector = Vector3<Real>;

/// Displacement from `from` to `to`.
#[inline]
pub fn displacement(from: &PosVector, to: &PosVector) -> PosVector {
    to - from
}

/// Euclidean distance between two points.
///
/// By construction `distance(a, b) == displacement(a, b).norm()`.
#[inline]
pub fn distance(a: &PosVector, b: &PosVector) -> Real {
    (b - a).norm()
}

/// Outer product `a ⊗ b`, yielding the 3×3 matrix with entries `a_i * b_j`.
#[inline]
pub fn outer_product(a: &PosVector, b: &PosVector) -> Matrix3<Real> {
    a * b.transpose()
}
