//! # spacecharge Core Library
//!
//! A one-dimensional Poisson-Boltzmann solver for ionic point-defect segregation at grain
//! boundaries, together with the two observables usually derived from it: the grain-boundary
//! resistivity ratio and the Mott-Schottky estimate of the space-charge potential.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that the physics, the iterative machinery
//! and the end-to-end procedures can be tested in isolation.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`DefectSpecies`, `Site`,
//!   `SiteCollection`, `Grid`), site-data input, and pure numerics (Boltzmann occupation,
//!   the tridiagonal Poisson operator, resistivity integration, the Mott-Schottky relation).
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It owns the `Calculation` state
//!   machine, the damped fixed-point iteration, the Gouy-Chapman mole-fraction correction,
//!   configuration builders, progress reporting and the error taxonomy.
//!
//! - **[`workflows`]: The Public API.** Complete procedures: a single (temperature,
//!   composition) run from site data to reported observables, and an independent-run sweep
//!   with partial-failure semantics.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;
