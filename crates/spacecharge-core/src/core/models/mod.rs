//! # Core Models Module
//!
//! Data structures describing the defect chemistry of a grain-boundary region.
//!
//! ## Overview
//!
//! A calculation starts from an ordered set of lattice sites. Each site hosts one or more
//! defect species, each with a segregation energy at that site, a bulk reference mole
//! fraction, and a boundary-condition role that decides whether the species takes part in
//! the self-consistent update or stays clamped at its bulk value.
//!
//! ## Key Components
//!
//! - [`defect`] - Immutable defect species shared by every site hosting it, and the
//!   per-site defect entry with its [`defect::DefectRole`]
//! - [`site`] - A single lattice plane: position, hosted defects, optional static charge,
//!   and the site-exclusion Boltzmann occupation
//! - [`collection`] - The ordered [`collection::SiteCollection`] and its mutable label views
//! - [`error`] - Validation errors raised while building the models
//!
//! ## Usage
//!
//! ```ignore
//! use spacecharge::core::models::{collection::SiteCollection, defect::DefectSpecies};
//!
//! let vacancy = Arc::new(DefectSpecies::new("Vo", 2.0, 0.05, 1.0));
//! let mut sites = SiteCollection::new(sites)?;
//! sites.subset_mut("site_2").clamp_defect("Gd");
//! ```

pub mod collection;
pub mod defect;
pub mod error;
pub mod site;
