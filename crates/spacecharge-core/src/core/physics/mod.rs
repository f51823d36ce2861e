//! # Physics Kernels
//!
//! Pure numerical building blocks of the space-charge model.
//!
//! - [`poisson`] - Discrete 1-D Poisson operator on the non-uniform grid, factorised once and
//!   reused for every right-hand side, with periodic and Dirichlet closures
//! - [`resistivity`] - Grain-boundary to bulk resistivity ratio of a mobile defect profile
//! - [`mott_schottky`] - The Mott-Schottky relation between that ratio and the space-charge
//!   potential, and its inversion

pub mod mott_schottky;
pub mod poisson;
pub mod resistivity;
