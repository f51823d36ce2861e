//! # Workflows Module
//!
//! High-level procedures that take site data and a configuration all the way to the
//! reported observables.
//!
//! ## Overview
//!
//! Workflows are the entry points for users of the library. A run prepares the sites
//! (core model, optional continuum resampling, boundary-condition roles), optionally
//! corrects the composition, solves for the potential and evaluates the resistivity ratio
//! and its Mott-Schottky inversion. A sweep repeats independent runs over temperatures and
//! compositions.
//!
//! ## Architecture
//!
//! - **Run Workflow** ([`run`]) - One (temperature, composition) calculation from end to end
//! - **Sweep Workflow** ([`sweep`]) - Independent runs in parallel, collected by index
//!
//! ## Key Capabilities
//!
//! - **Partial failure**: a failed run is reported next to the successful ones
//! - **Progress monitoring** with phase and task events
//! - **Parallel execution** through `rayon` when the `parallel` feature is enabled

pub mod run;
pub mod sweep;
