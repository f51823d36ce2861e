//! Shared fixture: a symmetric grain boundary on an alternating two-sublattice lattice.
//!
//! Nodes sit at `x = k * SPACING` for `k` in `[-half_width, half_width)`. Even `k` are
//! `site_1` planes hosting oxygen vacancies (`z = +2`), odd `k` are `site_2` planes hosting
//! an acceptor dopant (`z = -1`). Only the core plane `k = 0` attracts vacancies. With an
//! even `half_width` both sublattices have the same number of planes, so the bulk is
//! neutral and the periodic cell repeats the alternation across the seam.

use crate::core::grid::Grid;
use crate::core::io::site_data::{SiteData, SiteRecord};
use crate::core::models::collection::SiteCollection;
use crate::core::models::defect::{DefectSpecies, SiteDefect};
use crate::core::models::site::Site;
use crate::core::physics::poisson::BoundaryCondition;
use crate::engine::config::SolverConfig;
use std::sync::Arc;

pub(crate) const SITE_1: &str = "site_1";
pub(crate) const SITE_2: &str = "site_2";
pub(crate) const VACANCY: &str = "Vo";
pub(crate) const DOPANT: &str = "Gd";

pub(crate) const SPACING: f64 = 1e-10;
pub(crate) const AREA: f64 = 1e-19;
pub(crate) const PERMITTIVITY: f64 = 55.0;

pub(crate) const REFERENCE_TEMPERATURES: [f64; 6] =
    [773.15, 873.15, 973.15, 1073.15, 1173.15, 1273.15];

#[derive(Debug, Clone, Copy)]
pub(crate) struct FixtureOptions {
    pub half_width: i32,
    pub vacancy_fraction: f64,
    pub dopant_fraction: f64,
    pub core_energy: f64,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            half_width: 80,
            vacancy_fraction: 0.002,
            dopant_fraction: 0.004,
            core_energy: -0.8,
        }
    }
}

impl FixtureOptions {
    pub fn species(&self) -> (Arc<DefectSpecies>, Arc<DefectSpecies>) {
        (
            Arc::new(DefectSpecies::new(VACANCY, 2.0, self.vacancy_fraction, 1.0)),
            Arc::new(DefectSpecies::new(DOPANT, -1.0, self.dopant_fraction, 0.0)),
        )
    }

    fn plane(&self, k: i32) -> (&'static str, f64) {
        if k.rem_euclid(2) == 0 {
            (SITE_1, if k == 0 { self.core_energy } else { 0.0 })
        } else {
            (SITE_2, 0.0)
        }
    }
}

pub(crate) fn alternating_sites(options: FixtureOptions) -> SiteCollection {
    let (vacancy, dopant) = options.species();
    let sites = (-options.half_width..options.half_width)
        .map(|k| {
            let (label, energy) = options.plane(k);
            let species = if label == SITE_1 { &vacancy } else { &dopant };
            Site::new(
                label,
                k as f64 * SPACING,
                vec![SiteDefect::new(species.clone(), energy)],
            )
        })
        .collect();
    SiteCollection::new(sites).expect("fixture sites are valid")
}

/// Input rows for the fixture lattice, extended by `margin` planes on each side of the
/// requested range `[-half_width, half_width)`.
pub(crate) fn site_records(options: FixtureOptions, margin: i32) -> Vec<SiteRecord> {
    (-options.half_width - margin..options.half_width + margin)
        .map(|k| {
            let (label, energy) = options.plane(k);
            let defect = if label == SITE_1 { VACANCY } else { DOPANT };
            SiteRecord::new(label, 0.0, k as f64 * SPACING, vec![(defect.to_string(), energy)])
        })
        .collect()
}

/// Grid limits enclosing exactly the fixture planes.
pub(crate) fn grid_range(options: FixtureOptions) -> (f64, f64) {
    (
        (-options.half_width as f64 - 0.5) * SPACING,
        (options.half_width as f64 - 0.5) * SPACING,
    )
}

pub(crate) fn site_data(options: FixtureOptions) -> SiteData {
    let (x_min, x_max) = grid_range(options);
    SiteData::new(site_records(options, 2), x_min, x_max).expect("fixture data is valid")
}

pub(crate) fn grid(sites: &SiteCollection) -> Grid<'_> {
    Grid::new(sites, None, AREA).expect("fixture grid is valid")
}

pub(crate) fn solver_config(temperature: f64, boundary: BoundaryCondition) -> SolverConfig {
    SolverConfig::builder()
        .temperature(temperature)
        .relative_permittivity(PERMITTIVITY)
        .boundary(boundary)
        .alpha(0.01)
        .convergence(1e-7)
        .max_iterations(200_000)
        .build()
        .expect("fixture solver settings are valid")
}

/// Holds the dopant at its bulk value, as in the Mott-Schottky model.
pub(crate) fn clamp_dopant(sites: &mut SiteCollection) {
    sites.subset_mut(SITE_2).clamp_defect(DOPANT);
}
