//! # Workflows Module
//!
//! This module provides the high-level entry points that tie the engine and
//! core layers together.
//!
//! ## Overview
//!
//! Workflows own the setup choreography a Monte Carlo driver should not have
//! to repeat: validating a configuration, constructing particle sets, wiring
//! distance tables, and priming every cache with an initial full evaluation.
//! After [`ensemble::build_ensemble`] returns, the driver can start the
//! propose/accept/reject loop immediately.
//!
//! ## Architecture
//!
//! - **Ensemble Construction** ([`ensemble`]) - Builds a ready-to-sample
//!   walker ensemble from a validated [`crate::engine::config::SimulationConfig`]

pub mod ensemble;
