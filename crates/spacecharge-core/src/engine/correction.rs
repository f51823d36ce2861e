use super::config::{CorrectionConfig, SolverConfig};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::solver::solve_to_convergence;
use crate::core::constants::thermal_energy;
use crate::core::grid::{Grid, LaplacianLimits};
use crate::core::models::collection::SiteCollection;
use crate::core::physics::poisson::PoissonSolver;
use tracing::{debug, info, instrument};

const STAGE: &str = "mole-fraction correction";

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOutcome {
    /// Converged potential for the corrected composition.
    pub phi: Vec<f64>,
    pub iterations: usize,
    /// Largest `|average / target - 1|` over the corrected defects.
    pub deviation: f64,
}

/// Site-weighted mean local mole fraction of `defect` over its free entries.
fn average_mole_fraction(sites: &SiteCollection, phi: &[f64], kt: f64, defect: &str) -> Option<f64> {
    let (total, weight) = sites
        .iter()
        .zip(phi)
        .filter(|(site, _)| site.defect(defect).is_some_and(|d| !d.is_clamped()))
        .filter_map(|(site, &p)| {
            site.mole_fraction_of(defect, p, kt)
                .map(|x| (site.weight * x, site.weight))
        })
        .fold((0.0, 0.0), |(t, w), (x, sw)| (t + x, w + sw));
    (weight > 0.0).then(|| total / weight)
}

/// Rescales bulk mole fractions until the solved spatial averages match the nominal ones.
///
/// Every free defect with a positive nominal mole fraction is corrected. Each trial
/// composition is solved to convergence, warm-started from the previous potential, and
/// the bulk value is multiplied by `target / average`. The positions never change, so one
/// Poisson factorisation serves every trial.
///
/// # Errors
///
/// [`EngineError::ConvergenceFailure`] with the stage `"mole-fraction correction"` if the
/// averages are not within tolerance after the configured number of trials, plus any error
/// of the inner solve.
#[instrument(skip_all, name = "mole_fraction_correction")]
pub fn correct_mole_fractions(
    sites: &mut SiteCollection,
    limits: Option<LaplacianLimits>,
    cross_section_area: f64,
    solver: &SolverConfig,
    correction: &CorrectionConfig,
    reporter: &ProgressReporter,
) -> Result<CorrectionOutcome, EngineError> {
    let kt = thermal_energy(solver.temperature);
    let targets: Vec<(String, f64)> = sites
        .species()
        .iter()
        .filter(|s| s.mole_fraction > 0.0)
        .filter(|s| sites.bulk_mole_fraction(&s.label).is_some())
        .map(|s| (s.label.clone(), s.mole_fraction))
        .collect();

    let poisson = {
        let grid = Grid::new(sites, limits, cross_section_area)?;
        PoissonSolver::new(&grid, solver.relative_permittivity, solver.boundary)?
    };

    let mut phi = vec![0.0; sites.len()];
    let mut deviation = f64::INFINITY;
    reporter.report(Progress::PhaseStart { name: "Mole-fraction correction" });

    for iteration in 1..=correction.max_iterations {
        let (converged, averages) = {
            let grid = Grid::new(sites, limits, cross_section_area)?;
            let converged = solve_to_convergence(&grid, &poisson, solver, phi, reporter)?;
            let averages: Vec<Option<f64>> = targets
                .iter()
                .map(|(label, _)| average_mole_fraction(sites, &converged.phi, kt, label))
                .collect();
            (converged, averages)
        };
        phi = converged.phi;

        deviation = 0.0;
        let mut updates = Vec::with_capacity(targets.len());
        for ((label, target), average) in targets.iter().zip(&averages) {
            let Some(average) = *average else { continue };
            deviation = f64::max(deviation, (average / target - 1.0).abs());
            let bulk = sites
                .bulk_mole_fraction(label)
                .ok_or_else(|| EngineError::UnknownDefect(label.clone()))?;
            updates.push((label, bulk * target / average));
        }
        debug!(iteration, deviation, "Mole-fraction correction trial.");

        if deviation < correction.tolerance {
            reporter.report(Progress::PhaseFinish);
            info!(iterations = iteration, deviation, "Mole fractions corrected.");
            return Ok(CorrectionOutcome {
                phi,
                iterations: iteration,
                deviation,
            });
        }
        for (label, bulk) in updates {
            sites.set_bulk_mole_fraction(label, bulk)?;
        }
    }

    reporter.report(Progress::PhaseFinish);
    Err(EngineError::ConvergenceFailure {
        stage: STAGE,
        iterations: correction.max_iterations,
        residual: deviation,
        last_iterate: phi,
    })
}
