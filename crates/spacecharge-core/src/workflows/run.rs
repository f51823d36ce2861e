use crate::core::continuum;
use crate::core::grid::Grid;
use crate::core::io::site_data::SiteData;
use crate::core::models::collection::SiteCollection;
use crate::core::physics::mott_schottky::InversionError;
use crate::core::physics::resistivity::{ResistivityError, ResistivityRatio};
use crate::engine::config::{GridConfig, ModelConfig, RunConfig, SiteModel, SystemModel};
use crate::engine::correction::{CorrectionOutcome, correct_mole_fractions};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::solver::Calculation;
use crate::engine::state::{Solution, SubGrid};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub temperature: f64,
    pub solution: Solution,
    pub subgrids: Vec<SubGrid>,
    /// A failed integral leaves the converged potential valid, so it is kept per run.
    pub resistivity: Result<ResistivityRatio, ResistivityError>,
    /// `None` without a resistivity ratio. A ratio without a Mott-Schottky root does not
    /// invalidate the run either.
    pub mott_schottky_potential: Option<Result<f64, InversionError>>,
    pub correction: Option<CorrectionOutcome>,
}

impl RunResult {
    /// Numerical space-charge potential, the maximum of the converged potential.
    pub fn space_charge_potential(&self) -> f64 {
        self.solution.space_charge_potential()
    }
}

#[instrument(skip_all, name = "space_charge_workflow", fields(temperature = config.solver.temperature))]
pub fn run(
    data: &SiteData,
    config: &RunConfig,
    reporter: &ProgressReporter,
) -> Result<RunResult, EngineError> {
    // === Phase 0: Site preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let prepared = prepare_data(data, &config.grid, &config.model)?;
    let mut sites = build_sites(&prepared, &config.model)?;
    assign_roles(&mut sites, &config.model)?;
    reporter.report(Progress::PhaseFinish);

    let limits = Some(prepared.laplacian_limits());
    let area = config.grid.cross_section_area;

    // === Phase 1: Mole-fraction correction (Gouy-Chapman only) ===
    let correction = match (config.model.system, &config.correction) {
        (SystemModel::GouyChapman, Some(correction)) => Some(correct_mole_fractions(
            &mut sites,
            limits,
            area,
            &config.solver,
            correction,
            reporter,
        )?),
        _ => None,
    };

    // === Phase 2: Self-consistent potential ===
    let grid = Grid::new(&sites, limits, area)?;
    let mut calculation = Calculation::new(grid, config.solver.clone())?;
    if let Some(outcome) = &correction {
        calculation = calculation.with_initial_potential(outcome.phi.clone())?;
    }
    calculation.solve(reporter)?;

    // === Phase 3: Derived observables ===
    reporter.report(Progress::PhaseStart { name: "Analysis" });
    let solution = calculation.solution()?;
    let subgrids = calculation.form_subgrids()?;
    let resistivity = calculation.integrate_resistivity(&config.analysis)?;
    let valence = config
        .model
        .species(&config.analysis.mobile_defect)
        .map(|s| s.valence)
        .ok_or_else(|| EngineError::UnknownDefect(config.analysis.mobile_defect.clone()))?;
    let mott_schottky_potential = match &resistivity {
        Ok(ratio) => Some(calculation.mott_schottky_potential(ratio.ratio, valence)),
        Err(e) => {
            warn!(error = %e, "No resistivity ratio for the converged potential.");
            None
        }
    };
    reporter.report(Progress::PhaseFinish);

    info!(
        phi0 = solution.space_charge_potential(),
        r_gb = resistivity.as_ref().map_or(f64::NAN, |r| r.ratio),
        iterations = solution.iterations,
        "Run complete."
    );
    Ok(RunResult {
        temperature: config.solver.temperature,
        solution,
        subgrids,
        resistivity,
        mott_schottky_potential,
        correction,
    })
}

/// Clips the data to the configured grid range, then applies the model transforms.
fn prepare_data(
    data: &SiteData,
    grid: &GridConfig,
    model: &ModelConfig,
) -> Result<SiteData, EngineError> {
    let limits = (grid.x_min, grid.x_max);
    let mut prepared = if data.grid_limits() == limits {
        data.clone()
    } else {
        debug!(
            data_range = ?data.grid_limits(),
            grid_range = ?limits,
            "Re-clipping the site data to the configured grid range."
        );
        SiteData::new(data.records().to_vec(), grid.x_min, grid.x_max)?
    };
    if model.core_models {
        prepared.apply_core_model();
    }
    if let SiteModel::Continuum { points, mesh } = model.site_model {
        prepared = continuum::resample(&prepared, points, mesh)?;
    }
    Ok(prepared)
}

fn build_sites(data: &SiteData, model: &ModelConfig) -> Result<SiteCollection, EngineError> {
    let species: Vec<_> = model.species.iter().cloned().map(Arc::new).collect();
    let sites = data.build_sites(&species)?;
    debug!(
        sites = sites.len(),
        species = species.len(),
        "Built the site collection."
    );
    Ok(sites)
}

/// Selects Mott-Schottky or Gouy-Chapman behaviour through the defect roles.
fn assign_roles(sites: &mut SiteCollection, model: &ModelConfig) -> Result<(), EngineError> {
    for compensating in &model.compensating {
        let mut subset = sites.subset_mut(&compensating.site_label);
        let changed = match model.system {
            SystemModel::MottSchottky => subset.clamp_defect(&compensating.defect),
            SystemModel::GouyChapman => subset.release_defect(&compensating.defect),
        };
        if changed == 0 {
            return Err(EngineError::InputFormat(format!(
                "no site labelled '{}' hosts '{}'",
                compensating.site_label, compensating.defect
            )));
        }
        debug!(
            label = %compensating.site_label,
            defect = %compensating.defect,
            sites = changed,
            system = ?model.system,
            "Assigned the compensating defect role."
        );
    }
    Ok(())
}
