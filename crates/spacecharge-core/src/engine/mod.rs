//! # Engine Module
//!
//! This module implements the self-consistent solver for the space-charge potential at a
//! grain boundary, together with the configuration, state tracking and error reporting
//! around it.
//!
//! ## Overview
//!
//! A [`solver::Calculation`] owns a [`crate::core::grid::Grid`] and the solver settings,
//! iterates the damped Poisson-Boltzmann fixed point until the potential stops changing,
//! and then answers the derived queries: the full solution, per-label subgrids, the
//! grain-boundary resistivity ratio and its Mott-Schottky inversion. The Gouy-Chapman
//! mole-fraction correction wraps the same inner solve in an outer loop.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Solver, grid, model, analysis and correction settings with builders
//! - **Solver** ([`solver`]) - The fixed-point primitive and the `Calculation` state machine
//! - **Correction** ([`correction`]) - Outer loop matching solved averages to the nominal composition
//! - **Subgrids** ([`subgrid`]) - Read-side partition of the converged profiles
//! - **State Tracking** ([`state`]) - Solve states, solutions and subgrid records
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - The engine error taxonomy
//!
//! ## Key Capabilities
//!
//! - **Mott-Schottky and Gouy-Chapman** models through per-defect roles, sharing one solver loop
//! - **Periodic and Dirichlet** boundary conditions, with exact neutrality of periodic cells
//! - **Cooperative cancellation** by iteration cap or wall-clock budget
//! - **Explicit failure reporting** carrying the last iterate and residual

pub mod config;
pub mod correction;
pub mod error;
pub mod progress;
pub mod solver;
pub mod state;
pub mod subgrid;
