use crate::cli::InvertArgs;
use crate::error::Result;
use spacecharge::core::physics::mott_schottky;
use spacecharge::engine::error::EngineError;
use tracing::info;

/// Space-charge potential (V) reproducing a measured resistivity ratio.
pub fn space_charge_potential(args: InvertArgs) -> Result<f64> {
    let phi0 = mott_schottky::space_charge_potential(args.ratio, args.valence, args.temperature)
        .map_err(EngineError::from)?;
    info!(
        ratio = args.ratio,
        valence = args.valence,
        temperature = args.temperature,
        phi0,
        "Mott-Schottky potential found."
    );
    Ok(phi0)
}

pub fn run(args: InvertArgs) -> Result<()> {
    let phi0 = space_charge_potential(args)?;
    println!(
        "Mott-Schottky space-charge potential at {} K for r_GB = {}: {phi0:.6} V",
        args.temperature, args.ratio
    );
    Ok(())
}
