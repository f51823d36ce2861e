/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV: f64 = 8.617_333_262e-5;

/// Elementary charge in C.
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Vacuum permittivity in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_812_8e-12;

/// Thermal energy `k_B T` in eV.
#[inline]
pub fn thermal_energy(temperature: f64) -> f64 {
    BOLTZMANN_EV * temperature
}
