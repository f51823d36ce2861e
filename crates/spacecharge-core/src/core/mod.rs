//! # Core Module
//!
//! Stateless building blocks of the space-charge model.
//!
//! ## Overview
//!
//! The core module holds everything that does not depend on the progress of a calculation:
//! the defect and site data models, the non-uniform grid and its Laplacian stencils, site-data
//! input, and the numerical kernels the engine composes into a self-consistent solve.
//!
//! ## Architecture
//!
//! - **Constants** ([`constants`]) - Physical constants in the unit system used throughout
//! - **Data Models** ([`models`]) - Defect species, sites, site collections and their views
//! - **Grid** ([`grid`]) - Non-uniform discretisation derived from a site collection
//! - **Continuum Models** ([`continuum`]) - Resampling of site data onto a continuum mesh
//! - **Input** ([`io`]) - Site-data records and the CSV loader
//! - **Physics** ([`physics`]) - Poisson operator, resistivity ratio, Mott-Schottky relation
//! - **Utilities** ([`utils`]) - Scalar root finding and quadrature
//!
//! ## Units
//!
//! Positions are in metres, energies in electronvolts, potentials in volts and temperatures
//! in kelvin. Defect amounts are site mole fractions (occupancy probabilities).

pub mod constants;
pub mod continuum;
pub mod grid;
pub mod io;
pub mod models;
pub mod physics;
pub mod utils;
