use super::config::{AnalysisConfig, SolverConfig};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::state::{DefectProfile, SolveState, Solution, SubGrid};
use super::subgrid;
use crate::core::constants::thermal_energy;
use crate::core::grid::Grid;
use crate::core::models::collection::SiteCollection;
use crate::core::physics::mott_schottky::{self, InversionError};
use crate::core::physics::poisson::{BoundaryCondition, PoissonSolver};
use crate::core::physics::resistivity::{self, ResistivityError, ResistivityRatio};
use crate::core::utils::roots::{RootError, expand_bracket, safeguarded_newton};
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

const STAGE: &str = "potential solve";
const REPORT_INTERVAL: usize = 5_000;

const SHIFT_BRACKET: f64 = 0.01;
const SHIFT_EXPANSIONS: usize = 80;
const SHIFT_TOLERANCE: f64 = 1e-13;
const SHIFT_ITERATIONS: usize = 200;

/// Output of [`solve_to_convergence`].
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence {
    pub phi: Vec<f64>,
    pub iterations: usize,
    pub residual: f64,
}

/// Net charge (units of e, weighted) of every node at potential `phi`.
pub fn node_charges(sites: &SiteCollection, phi: &[f64], kt: f64, site_charges: bool) -> Vec<f64> {
    sites
        .iter()
        .zip(phi)
        .map(|(site, &p)| site.charge(p, kt, site_charges))
        .collect()
}

/// Constant `s` such that the cell is neutral at `phi + s`.
///
/// The total charge is non-increasing in `s`, so the root is unique when it exists.
fn neutralising_shift(
    sites: &SiteCollection,
    phi: &[f64],
    kt: f64,
    site_charges: bool,
    guess: f64,
) -> Result<f64, EngineError> {
    let charge_and_slope = |s: f64| {
        sites
            .iter()
            .zip(phi)
            .map(|(site, &p)| site.charge_and_derivative(p + s, kt, site_charges))
            .fold((0.0, 0.0), |(q, dq), (a, b)| (q + a, dq + b))
    };

    if charge_and_slope(guess).0 == 0.0 {
        return Ok(guess);
    }
    let fail = |e: RootError| EngineError::ChargeNeutrality {
        reason: e.to_string(),
    };
    let (lo, hi) = expand_bracket(
        |s| charge_and_slope(s).0,
        guess - SHIFT_BRACKET,
        guess + SHIFT_BRACKET,
        SHIFT_EXPANSIONS,
    )
    .map_err(fail)?;
    safeguarded_newton(charge_and_slope, lo, hi, SHIFT_TOLERANCE, SHIFT_ITERATIONS).map_err(fail)
}

/// Damped fixed-point iteration of the Poisson-Boltzmann problem on `grid`.
///
/// Each step computes the charge density from the current potential, solves Poisson's
/// equation for a trial potential and moves `alpha` of the way towards it. Converges when
/// `max |trial - phi| < convergence`, returning the trial potential. With periodic
/// boundaries the trial potential is shifted so the cell is exactly neutral.
///
/// # Errors
///
/// [`EngineError::ConvergenceFailure`] when the iteration cap is reached, the iterate
/// stops being finite or a later iterate can no longer be neutralised.
/// [`EngineError::Cancelled`] when the time budget runs out, and
/// [`EngineError::ChargeNeutrality`] when the periodic cell cannot be neutralised at all.
pub fn solve_to_convergence(
    grid: &Grid<'_>,
    poisson: &PoissonSolver,
    config: &SolverConfig,
    initial: Vec<f64>,
    reporter: &ProgressReporter,
) -> Result<Convergence, EngineError> {
    if initial.len() != grid.len() {
        return Err(EngineError::InputFormat(format!(
            "initial potential has {} entries, the grid has {} nodes",
            initial.len(),
            grid.len()
        )));
    }

    let kt = thermal_energy(config.temperature);
    let sites = grid.sites();
    let started = Instant::now();
    let mut phi = initial;
    let mut shift = 0.0;
    let mut residual = f64::INFINITY;

    for iteration in 1..=config.max_iterations {
        let charges = node_charges(sites, &phi, kt, config.site_charges);
        let mut trial = poisson.solve(&grid.charge_density(&charges))?;
        if poisson.boundary() == BoundaryCondition::Periodic {
            // Whether a neutral shift exists depends only on the saturated site limits, so
            // after the first iteration a failure here means the iterate is running away.
            shift = match neutralising_shift(sites, &trial, kt, config.site_charges, shift) {
                Ok(s) => s,
                Err(e) if iteration > 1 => {
                    warn!(iteration, error = %e, "Lost charge neutrality on a diverging iterate.");
                    return Err(EngineError::ConvergenceFailure {
                        stage: STAGE,
                        iterations: iteration,
                        residual,
                        last_iterate: phi,
                    });
                }
                Err(e) => return Err(e),
            };
            trial.iter_mut().for_each(|p| *p += shift);
        }

        if trial.iter().any(|p| !p.is_finite()) {
            warn!(iteration, "Potential iterate is no longer finite.");
            return Err(EngineError::ConvergenceFailure {
                stage: STAGE,
                iterations: iteration,
                residual: f64::INFINITY,
                last_iterate: phi,
            });
        }
        residual = trial
            .iter()
            .zip(&phi)
            .map(|(t, p)| (t - p).abs())
            .fold(0.0, f64::max);
        if residual < config.convergence {
            return Ok(Convergence {
                phi: trial,
                iterations: iteration,
                residual,
            });
        }

        for (p, t) in phi.iter_mut().zip(&trial) {
            *p += config.alpha * (t - *p);
        }

        if iteration % REPORT_INTERVAL == 0 {
            trace!(iteration, residual, "Fixed-point iteration.");
            reporter.report(Progress::Iteration {
                count: iteration,
                residual,
            });
        }
        if let Some(budget) = config.time_budget {
            let elapsed = started.elapsed();
            if elapsed > budget {
                return Err(EngineError::Cancelled {
                    iterations: iteration,
                    elapsed,
                });
            }
        }
    }

    Err(EngineError::ConvergenceFailure {
        stage: STAGE,
        iterations: config.max_iterations,
        residual,
        last_iterate: phi,
    })
}

/// One self-consistent calculation on a fixed grid.
///
/// The calculation owns the grid (and through it borrows the sites) together with the
/// solver settings and the potential. The potential only changes inside [`Calculation::solve`];
/// every derived query requires a converged state.
#[derive(Debug)]
pub struct Calculation<'a> {
    grid: Grid<'a>,
    config: SolverConfig,
    poisson: PoissonSolver,
    phi: Vec<f64>,
    state: SolveState,
}

impl<'a> Calculation<'a> {
    pub fn new(grid: Grid<'a>, config: SolverConfig) -> Result<Self, EngineError> {
        let poisson = PoissonSolver::new(&grid, config.relative_permittivity, config.boundary)?;
        let phi = vec![0.0; grid.len()];
        Ok(Self {
            grid,
            config,
            poisson,
            phi,
            state: SolveState::Uninitialized,
        })
    }

    /// Starts the iteration from `phi` instead of zero.
    pub fn with_initial_potential(mut self, phi: Vec<f64>) -> Result<Self, EngineError> {
        if phi.len() != self.grid.len() {
            return Err(EngineError::InputFormat(format!(
                "initial potential has {} entries, the grid has {} nodes",
                phi.len(),
                self.grid.len()
            )));
        }
        self.phi = phi;
        Ok(self)
    }

    pub fn grid(&self) -> &Grid<'a> {
        &self.grid
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> &SolveState {
        &self.state
    }

    /// Current potential. Only meaningful as a result once the state is converged.
    pub fn potential(&self) -> &[f64] {
        &self.phi
    }

    pub fn thermal_energy(&self) -> f64 {
        thermal_energy(self.config.temperature)
    }

    #[instrument(skip_all, name = "potential_solve", fields(temperature = self.config.temperature))]
    pub fn solve(&mut self, reporter: &ProgressReporter) -> Result<(), EngineError> {
        self.state = SolveState::Iterating;
        debug!(
            nodes = self.grid.len(),
            boundary = ?self.config.boundary,
            alpha = self.config.alpha,
            "Starting fixed-point iteration."
        );

        let outcome = reporter.phase("Potential solve", || {
            solve_to_convergence(
                &self.grid,
                &self.poisson,
                &self.config,
                self.phi.clone(),
                reporter,
            )
        });

        match outcome {
            Ok(converged) => {
                info!(
                    iterations = converged.iterations,
                    residual = converged.residual,
                    "Potential converged."
                );
                self.phi = converged.phi;
                self.state = SolveState::Converged {
                    iterations: converged.iterations,
                    residual: converged.residual,
                };
                Ok(())
            }
            Err(e) => {
                self.state = SolveState::Failed;
                Err(e)
            }
        }
    }

    fn converged(&self) -> Result<(usize, f64), EngineError> {
        match self.state {
            SolveState::Converged {
                iterations,
                residual,
            } => Ok((iterations, residual)),
            _ => Err(EngineError::NotConverged),
        }
    }

    pub fn solution(&self) -> Result<Solution, EngineError> {
        let (iterations, residual) = self.converged()?;
        let kt = self.thermal_energy();
        let sites = self.grid.sites();
        let charges = node_charges(sites, &self.phi, kt, self.config.site_charges);

        let defects = sites
            .species()
            .iter()
            .map(|species| DefectProfile {
                label: species.label.clone(),
                valence: species.valence,
                mole_fractions: sites
                    .iter()
                    .zip(&self.phi)
                    .map(|(site, &p)| site.mole_fraction_of(&species.label, p, kt).unwrap_or(0.0))
                    .collect(),
            })
            .collect();

        Ok(Solution {
            x: self.grid.x().to_vec(),
            labels: sites.iter().map(|s| s.label.clone()).collect(),
            phi: self.phi.clone(),
            charge_density: self.grid.charge_density(&charges),
            defects,
            iterations,
            residual,
        })
    }

    /// Converged profiles split by site label.
    pub fn form_subgrids(&self) -> Result<Vec<SubGrid>, EngineError> {
        self.converged()?;
        Ok(subgrid::form_subgrids(
            &self.grid,
            &self.phi,
            self.thermal_energy(),
        ))
    }

    /// Grain-boundary to bulk resistivity ratio of the mobile defect.
    pub fn resistivity_ratio(
        &self,
        analysis: &AnalysisConfig,
    ) -> Result<ResistivityRatio, EngineError> {
        Ok(self.integrate_resistivity(analysis)??)
    }

    /// Like [`Calculation::resistivity_ratio`], keeping a failed integral apart.
    ///
    /// The outer error covers the calculation state and the mobile defect. The inner one
    /// is the integral itself, which can fail on a perfectly good potential.
    pub fn integrate_resistivity(
        &self,
        analysis: &AnalysisConfig,
    ) -> Result<Result<ResistivityRatio, ResistivityError>, EngineError> {
        self.converged()?;
        let mobile = subgrid::form_defect_subgrid(
            &self.grid,
            &self.phi,
            self.thermal_energy(),
            &analysis.mobile_defect,
        )
        .ok_or_else(|| EngineError::UnknownDefect(analysis.mobile_defect.clone()))?;
        let profile = mobile
            .mobile_profile(&analysis.mobile_defect)
            .ok_or_else(|| EngineError::UnknownDefect(analysis.mobile_defect.clone()))?;

        let ratio =
            resistivity::resistivity_ratio(&profile, analysis.window, analysis.concentration_floor);
        if let Ok(ratio) = &ratio {
            debug!(
                ratio = ratio.ratio,
                nodes = ratio.nodes,
                "Integrated the resistivity ratio."
            );
        }
        Ok(ratio)
    }

    /// Mott-Schottky space-charge potential reproducing `ratio` at this temperature.
    pub fn mott_schottky_potential(&self, ratio: f64, valence: f64) -> Result<f64, InversionError> {
        mott_schottky::space_charge_potential(ratio, valence, self.config.temperature)
    }
}
