use super::run::{RunResult, run};
use crate::core::io::site_data::SiteData;
use crate::engine::config::RunConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use itertools::iproduct;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One independent run of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub index: usize,
    pub temperature: f64,
    /// Bulk mole fractions replacing the configured ones.
    pub mole_fractions: Vec<(String, f64)>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub point: SweepPoint,
    pub result: Result<RunResult, EngineError>,
}

/// Every (composition, temperature) pair, compositions outermost.
///
/// An empty composition list sweeps the temperatures at the configured composition.
pub fn sweep_points(temperatures: &[f64], compositions: &[Vec<(String, f64)>]) -> Vec<SweepPoint> {
    let default_composition = [Vec::new()];
    let compositions = if compositions.is_empty() {
        &default_composition[..]
    } else {
        compositions
    };
    iproduct!(compositions, temperatures)
        .enumerate()
        .map(|(index, (composition, &temperature))| SweepPoint {
            index,
            temperature,
            mole_fractions: composition.clone(),
        })
        .collect()
}

fn run_point(data: &SiteData, base: &RunConfig, point: &SweepPoint) -> Result<RunResult, EngineError> {
    let config = RunConfig {
        solver: base.solver.with_temperature(point.temperature)?,
        model: base.model.with_mole_fractions(&point.mole_fractions)?,
        ..base.clone()
    };
    run(data, &config, &ProgressReporter::new())
}

/// Runs every point independently. Outcomes are returned in the order of `points`; a
/// failed run is reported in its outcome and does not affect the others.
#[instrument(skip_all, name = "sweep_workflow", fields(runs = points.len()))]
pub fn sweep(
    data: &SiteData,
    base: &RunConfig,
    points: &[SweepPoint],
    reporter: &ProgressReporter,
) -> Vec<RunOutcome> {
    reporter.report(Progress::PhaseStart { name: "Sweep" });
    reporter.report(Progress::TaskStart {
        total_steps: points.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = points.iter();
    #[cfg(feature = "parallel")]
    let iterator = points.par_iter();

    let outcomes: Vec<RunOutcome> = iterator
        .map(|point| {
            let result = run_point(data, base, point);
            if let Err(e) = &result {
                warn!(index = point.index, temperature = point.temperature, error = %e, "Sweep run failed.");
            }
            reporter.report(Progress::TaskIncrement);
            RunOutcome {
                point: point.clone(),
                result,
            }
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        succeeded = outcomes.len() - failed,
        failed, "Sweep complete."
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::physics::poisson::BoundaryCondition;
    use crate::engine::config::SystemModel;
    use crate::testing::{self, FixtureOptions};
    use crate::workflows::run::tests::run_config;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn points_enumerate_compositions_then_temperatures() {
        let compositions = vec![
            vec![("Vo".to_string(), 0.001)],
            vec![("Vo".to_string(), 0.002)],
        ];
        let points = sweep_points(&[800.0, 900.0, 1000.0], &compositions);
        assert_eq!(points.len(), 6);
        assert_eq!(points[4].index, 4);
        assert_eq!(points[4].temperature, 900.0);
        assert_eq!(points[4].mole_fractions, compositions[1]);

        let plain = sweep_points(&[800.0, 900.0], &[]);
        assert_eq!(plain.len(), 2);
        assert!(plain.iter().all(|p| p.mole_fractions.is_empty()));
    }

    #[test]
    fn space_charge_potential_decreases_with_temperature() {
        let data = testing::site_data(FixtureOptions::default());
        let base = run_config(SystemModel::MottSchottky, BoundaryCondition::Dirichlet);
        let points = sweep_points(&testing::REFERENCE_TEMPERATURES, &[]);
        let outcomes = sweep(&data, &base, &points, &ProgressReporter::new());

        let results: Vec<&RunResult> = outcomes
            .iter()
            .map(|o| o.result.as_ref().unwrap())
            .collect();
        for pair in results.windows(2) {
            assert!(pair[1].temperature > pair[0].temperature);
            assert!(
                pair[1].space_charge_potential() < pair[0].space_charge_potential(),
                "numerical potential rises between {} K and {} K",
                pair[0].temperature,
                pair[1].temperature
            );
            let cold = pair[0].mott_schottky_potential.clone().unwrap().unwrap();
            let hot = pair[1].mott_schottky_potential.clone().unwrap().unwrap();
            assert!(hot < cold, "Mott-Schottky potential rises: {cold} -> {hot}");
        }
    }

    #[test]
    fn failed_runs_do_not_affect_the_others() {
        let data = testing::site_data(FixtureOptions::default());
        let base = run_config(SystemModel::MottSchottky, BoundaryCondition::Periodic);
        let compositions = vec![
            vec![(testing::VACANCY.to_string(), 0.002)],
            vec![(testing::VACANCY.to_string(), 1.5)],
        ];
        let points = sweep_points(&[1000.0], &compositions);

        let increments = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| {
            if event == Progress::TaskIncrement {
                increments.fetch_add(1, Ordering::Relaxed);
            }
        }));
        let outcomes = sweep(&data, &base, &points, &reporter);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].point.index, 0);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(EngineError::Config { .. })
        ));
        drop(reporter);
        assert_eq!(increments.into_inner(), 2);
    }
}
