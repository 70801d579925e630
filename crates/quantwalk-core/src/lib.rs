//! # Quantwalk Core Library
//!
//! A high-performance particle-configuration and pairwise-distance engine for
//! quantum Monte Carlo sampling, covering the kinematic bookkeeping that sits
//! underneath wavefunction evaluation: particle positions, incrementally
//! maintained distance tables, and the propose/accept/reject move protocol,
//! replicated across an ensemble of independent walkers.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless geometry primitives over
//!   `nalgebra`, the simulation cell (boundary collaborator), and the species
//!   table consumed by group bookkeeping.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer implements the
//!   transactional single-particle move protocol. It includes the
//!   incremental-update `DistanceTable`, the `ParticleSet` state machine, the
//!   data-parallel `ExecutionContext`, and the batched dispatcher that applies
//!   one protocol step across many walkers per dispatch.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer:
//!   it ties `engine` and `core` together to build a ready-to-sample walker
//!   ensemble from a validated configuration.
//!
//! The engine performs no acceptance arithmetic: a Monte Carlo driver proposes
//! moves, evaluates wavefunction ratios from the cached distance rows, and
//! tells each configuration to accept or reject.

pub mod core;
pub mod engine;
pub mod workflows;
