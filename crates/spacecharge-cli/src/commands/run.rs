use crate::cli::RunArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::output::{self, SUMMARY_FILE};
use crate::utils::progress::CliProgressHandler;
use spacecharge::core::io::delimited::DelimitedSiteFile;
use spacecharge::core::io::traits::SiteDataFile;
use spacecharge::engine::progress::ProgressReporter;
use spacecharge::workflows::sweep;
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Building configuration from file and CLI arguments...");
    let config = build_config(&args)?;

    info!(path = %config.input_path.display(), "Loading site data.");
    let data = DelimitedSiteFile::load(
        &config.input_path,
        config.base.grid.x_min,
        config.base.grid.x_max,
    )
    .map_err(|e| CliError::FileParsing {
        path: config.input_path.clone(),
        source: e.into(),
    })?;
    std::fs::create_dir_all(&config.output_dir)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Solving {} run(s) over {} site(s)...",
        config.points.len(),
        data.in_range().len()
    );
    let outcomes = sweep::sweep(&data, &config.base, &config.points, &reporter);

    let mut converged = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => {
                converged += 1;
                let path = output::profile_path(&config.output_dir, outcome.point.index);
                output::write_profile(&path, &result.solution)?;
                let r_gb = match &result.resistivity {
                    Ok(ratio) => format!("{:.4e}", ratio.ratio),
                    Err(e) => {
                        warn!(index = outcome.point.index, error = %e, "No resistivity ratio.");
                        "n/a".to_string()
                    }
                };
                let phi_ms = match &result.mott_schottky_potential {
                    Some(Ok(phi)) => format!("{phi:.4} V"),
                    Some(Err(e)) => {
                        warn!(index = outcome.point.index, error = %e, "No Mott-Schottky estimate.");
                        "n/a".to_string()
                    }
                    None => "n/a".to_string(),
                };
                println!(
                    "  [{}] T = {} K: Phi0 = {:.4} V, r_GB = {}, Phi0(MS) = {}",
                    outcome.point.index,
                    outcome.point.temperature,
                    result.space_charge_potential(),
                    r_gb,
                    phi_ms
                );
            }
            Err(e) => {
                println!(
                    "  [{}] T = {} K: failed: {e}",
                    outcome.point.index, outcome.point.temperature
                );
            }
        }
    }

    let summary_path = config.output_dir.join(SUMMARY_FILE);
    output::write_summary(&summary_path, &outcomes)?;
    info!(path = %summary_path.display(), "Summary written.");

    if converged == 0 && !outcomes.is_empty() {
        return Err(CliError::Other(anyhow::anyhow!(
            "All {} run(s) failed; see {}",
            outcomes.len(),
            summary_path.display()
        )));
    }
    println!(
        "{converged} of {} run(s) converged. Results written to {}",
        outcomes.len(),
        config.output_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
        [grid]
        x-min = -8.05e-9
        x-max = 7.95e-9
        cross-section-area = 1.0e-19

        [solver]
        temperature = 1000.0
        relative-permittivity = 55.0
        alpha = 0.01
        convergence = 1e-7
        max-iterations = 200000

        [model]
        compensating = [{ site-label = "site_2", defect = "Gd" }]

        [[species]]
        label = "Vo"
        valence = 2.0
        mole-fraction = 0.002
        mobility = 1.0

        [[species]]
        label = "Gd"
        valence = -1.0
        mole-fraction = 0.004

        [analysis]
        mobile-defect = "Vo"
        window = { type = "potential-cutoff", value = 0.02 }
    "#;

    /// Alternating vacancy and dopant planes one angstrom apart with an attractive core.
    fn write_sites(path: &Path) {
        let mut content = String::from("# label, valence, x, defect, energy\n");
        for k in -82i32..82 {
            let x = k as f64 * 1e-10;
            if k.rem_euclid(2) == 0 {
                let energy = if k == 0 { -0.8 } else { 0.0 };
                writeln!(content, "site_1, 0.0, {x:e}, Vo, {energy}").unwrap();
            } else {
                writeln!(content, "site_2, 0.0, {x:e}, Gd, 0.0").unwrap();
            }
        }
        fs::write(path, content).unwrap();
    }

    fn run_args(dir: &Path, extra: &[&str]) -> RunArgs {
        let input = dir.join("sites.csv");
        let config = dir.join("config.toml");
        let output = dir.join("out");
        write_sites(&input);
        fs::write(&config, CONFIG).unwrap();
        let mut argv = vec![
            "spacecharge".to_string(),
            "run".to_string(),
            "-i".to_string(),
            input.to_str().unwrap().to_string(),
            "-o".to_string(),
            output.to_str().unwrap().to_string(),
            "-c".to_string(),
            config.to_str().unwrap().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn converged_run_writes_profile_and_summary() {
        let dir = tempdir().unwrap();
        run(run_args(dir.path(), &[])).unwrap();

        let out = dir.path().join("out");
        let profile = fs::read_to_string(out.join("profile_000.csv")).unwrap();
        assert!(profile.starts_with("x,site,phi,rho,x_Vo,x_Gd"));
        assert_eq!(profile.lines().count(), 161);

        let summary = fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        assert!(summary.lines().nth(1).unwrap().contains("converged"));
    }

    #[test]
    fn all_runs_failing_is_an_error() {
        let dir = tempdir().unwrap();
        let result = run(run_args(dir.path(), &["-S", "solver.max-iterations=3"]));
        assert!(matches!(result, Err(CliError::Other(_))));

        let summary = fs::read_to_string(dir.path().join("out").join(SUMMARY_FILE)).unwrap();
        assert!(summary.lines().nth(1).unwrap().contains("failed"));
    }

    #[test]
    fn missing_input_is_a_parsing_error() {
        let dir = tempdir().unwrap();
        let mut args = run_args(dir.path(), &[]);
        args.input = dir.path().join("missing.csv");
        assert!(matches!(run(args), Err(CliError::FileParsing { .. })));
    }
}
