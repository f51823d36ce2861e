//! # Site Data Input
//!
//! Records describing the lattice planes of a grain-boundary model and the loaders producing
//! them.
//!
//! - [`site_data`] - `SiteRecord` rows, the range-clipped `SiteData` set with its Laplacian
//!   limits, the core model, and conversion into a `SiteCollection`
//! - [`traits`] - The `SiteDataFile` loader interface
//! - [`delimited`] - Comma-separated implementation of the loader

pub mod delimited;
pub mod site_data;
pub mod traits;
