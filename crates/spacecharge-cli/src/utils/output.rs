use crate::error::{CliError, Result};
use serde::Serialize;
use spacecharge::engine::state::Solution;
use spacecharge::workflows::sweep::{RunOutcome, SweepPoint};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SUMMARY_FILE: &str = "summary.csv";

/// One line of the sweep summary. Observables are empty for failed runs.
///
/// A converged run without a resistivity ratio keeps its potential and reports why in `error`.
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    index: usize,
    temperature: f64,
    composition: String,
    status: &'static str,
    iterations: Option<usize>,
    phi0: Option<f64>,
    signed_peak: Option<f64>,
    r_gb: Option<f64>,
    phi0_mott_schottky: Option<f64>,
    error: Option<&'a str>,
}

fn composition_label(point: &SweepPoint) -> String {
    point
        .mole_fractions
        .iter()
        .map(|(label, value)| format!("{label}={value}"))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn profile_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("profile_{index:03}.csv"))
}

fn csv_error(path: &Path, e: csv::Error) -> CliError {
    CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    }
}

/// Writes the node-resolved profiles of one converged run.
///
/// Columns are `x`, `site`, `phi`, `rho`, then one mole-fraction column per defect species.
pub fn write_profile(path: &Path, solution: &Solution) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

    let mut header = vec!["x".to_string(), "site".to_string(), "phi".to_string(), "rho".to_string()];
    header.extend(solution.defects.iter().map(|d| format!("x_{}", d.label)));
    writer
        .write_record(&header)
        .map_err(|e| csv_error(path, e))?;

    for (i, x) in solution.x.iter().enumerate() {
        let mut record = vec![
            x.to_string(),
            solution.labels[i].clone(),
            solution.phi[i].to_string(),
            solution.charge_density[i].to_string(),
        ];
        record.extend(solution.defects.iter().map(|d| d.mole_fractions[i].to_string()));
        writer
            .write_record(&record)
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    debug!(path = %path.display(), nodes = solution.x.len(), "Profile written.");
    Ok(())
}

/// Writes one summary row per sweep point, in sweep order.
pub fn write_summary(path: &Path, outcomes: &[RunOutcome]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

    for outcome in outcomes {
        let error_text = match &outcome.result {
            Ok(result) => result.resistivity.as_ref().err().map(ToString::to_string),
            Err(e) => Some(e.to_string()),
        };
        let row = match &outcome.result {
            Ok(result) => SummaryRow {
                index: outcome.point.index,
                temperature: outcome.point.temperature,
                composition: composition_label(&outcome.point),
                status: "converged",
                iterations: Some(result.solution.iterations),
                phi0: Some(result.space_charge_potential()),
                signed_peak: Some(result.solution.signed_peak()),
                r_gb: result.resistivity.as_ref().ok().map(|r| r.ratio),
                phi0_mott_schottky: result
                    .mott_schottky_potential
                    .as_ref()
                    .and_then(|phi| phi.as_ref().ok())
                    .copied(),
                error: error_text.as_deref(),
            },
            Err(_) => SummaryRow {
                index: outcome.point.index,
                temperature: outcome.point.temperature,
                composition: composition_label(&outcome.point),
                status: "failed",
                iterations: None,
                phi0: None,
                signed_peak: None,
                r_gb: None,
                phi0_mott_schottky: None,
                error: error_text.as_deref(),
            },
        };
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacecharge::core::physics::resistivity::ResistivityError;
    use spacecharge::engine::error::EngineError;
    use spacecharge::workflows::run::RunResult;
    use spacecharge::engine::state::DefectProfile;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn solution() -> Solution {
        Solution {
            x: vec![-1e-10, 0.0, 1e-10],
            labels: vec!["site_2".into(), "site_1".into(), "site_2".into()],
            phi: vec![0.01, 0.25, 0.01],
            charge_density: vec![-1.0, 2.0, -1.0],
            defects: vec![
                DefectProfile {
                    label: "Vo".into(),
                    valence: 2.0,
                    mole_fractions: vec![0.0, 0.5, 0.0],
                },
                DefectProfile {
                    label: "Gd".into(),
                    valence: -1.0,
                    mole_fractions: vec![0.004, 0.0, 0.004],
                },
            ],
            iterations: 1200,
            residual: 5e-8,
        }
    }

    #[test]
    fn profile_has_one_column_per_defect() {
        let dir = tempdir().unwrap();
        let path = profile_path(dir.path(), 7);
        assert!(path.ends_with("profile_007.csv"));
        write_profile(&path, &solution()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "x,site,phi,rho,x_Vo,x_Gd");
        assert_eq!(lines[2], "0,site_1,0.25,2,0.5,0");
    }

    #[test]
    fn summary_reports_failed_runs_with_their_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let outcomes = vec![RunOutcome {
            point: SweepPoint {
                index: 0,
                temperature: 900.0,
                mole_fractions: vec![("Vo".into(), 0.001), ("Gd".into(), 0.002)],
            },
            result: Err(EngineError::Cancelled {
                iterations: 10,
                elapsed: Duration::from_secs(1),
            }),
        }];
        write_summary(&path, &outcomes).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("index"));
        assert_eq!(headers.get(9), Some("error"));

        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[2], "Vo=0.001;Gd=0.002");
        assert_eq!(&record[3], "failed");
        assert_eq!(&record[5], "");
        assert!(!record[9].is_empty());
    }

    #[test]
    fn summary_keeps_converged_runs_without_a_resistivity_ratio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE);
        let outcomes = vec![RunOutcome {
            point: SweepPoint {
                index: 3,
                temperature: 1000.0,
                mole_fractions: vec![],
            },
            result: Ok(RunResult {
                temperature: 1000.0,
                solution: solution(),
                subgrids: vec![],
                resistivity: Err(ResistivityError::EmptyWindow),
                mott_schottky_potential: None,
                correction: None,
            }),
        }];
        write_summary(&path, &outcomes).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[3], "converged");
        assert_eq!(&record[4], "1200");
        assert_eq!(&record[5], "0.25");
        assert_eq!(&record[7], "");
        assert_eq!(&record[8], "");
        assert!(record[9].contains("fewer than two nodes"));
    }
}
