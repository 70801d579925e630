//! # Core Module
//!
//! This module provides the stateless foundations of the engine: geometry
//! primitives, the simulation cell, and the species table.
//!
//! ## Overview
//!
//! Everything here is plain data with pure operations. The stateful move
//! protocol and its caches live in [`crate::engine`]; this layer only answers
//! geometric and taxonomic questions posed by that layer.
//!
//! ## Architecture
//!
//! - **Geometry Primitives** ([`utils::geometry`]) - Scalar/vector aliases over
//!   `nalgebra` and the handful of products the engine needs
//! - **Simulation Cell** ([`models::cell`]) - Lattice matrix, reduced
//!   coordinates, and the open/periodic boundary tests consulted once per
//!   proposed move
//! - **Species Table** ([`models::species`]) - Per-species charge, mass, and
//!   member counts consumed by the regroup operation

pub mod models;
pub mod utils;
