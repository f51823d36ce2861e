use super::error::ModelError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An ionic point-defect species.
///
/// Species are immutable once constructed and shared by reference (`Arc`) between every
/// [`crate::core::models::site::Site`] that hosts them. The nominal mole fraction is the
/// composition requested by the caller; each site keeps its own mutable bulk reference,
/// which starts at this value and may be rescaled by the mole-fraction correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectSpecies {
    /// Identifier used to match segregation energies in the input data (e.g. "Vo").
    pub label: String,
    /// Charge number in units of the elementary charge.
    pub valence: f64,
    /// Nominal bulk mole fraction on the sites hosting this species.
    pub mole_fraction: f64,
    /// Mobility, in arbitrary but consistent units. Only ratios enter the observables.
    pub mobility: f64,
}

impl DefectSpecies {
    pub fn new(label: impl Into<String>, valence: f64, mole_fraction: f64, mobility: f64) -> Self {
        Self {
            label: label.into(),
            valence,
            mole_fraction,
            mobility,
        }
    }

    /// Checks that the nominal mole fraction lies in `[0, 1)`.
    pub fn validate(&self) -> Result<(), ModelError> {
        validate_mole_fraction(&self.label, self.mole_fraction)
    }
}

pub(crate) fn validate_mole_fraction(label: &str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::InvalidMoleFraction {
            defect: label.to_string(),
            value,
            reason: "must be finite and non-negative",
        });
    }
    if value >= 1.0 {
        return Err(ModelError::InvalidMoleFraction {
            defect: label.to_string(),
            value,
            reason: "must be below one",
        });
    }
    Ok(())
}

/// Boundary-condition role of a defect entry on a site.
///
/// The role is set while configuring a calculation and consulted inside the shared solver
/// loop. A Mott-Schottky calculation clamps the compensating defect to its bulk value; a
/// Gouy-Chapman calculation leaves every defect free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectRole {
    /// Occupation follows the site-exclusion Boltzmann distribution.
    #[default]
    Free,
    /// Occupation is held at the site's bulk reference mole fraction.
    ClampedToBulk,
}

/// A defect species as hosted by one particular site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDefect {
    pub species: Arc<DefectSpecies>,
    /// Segregation energy at this site in eV. Negative values attract the defect.
    pub segregation_energy: f64,
    /// Bulk reference mole fraction used by the Boltzmann relation on this site.
    pub mole_fraction: f64,
    pub role: DefectRole,
}

impl SiteDefect {
    pub fn new(species: Arc<DefectSpecies>, segregation_energy: f64) -> Self {
        let mole_fraction = species.mole_fraction;
        Self {
            species,
            segregation_energy,
            mole_fraction,
            role: DefectRole::Free,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.species.label
    }

    #[inline]
    pub fn valence(&self) -> f64 {
        self.species.valence
    }

    #[inline]
    pub fn is_clamped(&self) -> bool {
        self.role == DefectRole::ClampedToBulk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_defect_starts_free_at_the_nominal_mole_fraction() {
        let species = Arc::new(DefectSpecies::new("Vo", 2.0, 0.05, 1.0));
        let entry = SiteDefect::new(species.clone(), -0.3);
        assert_eq!(entry.role, DefectRole::Free);
        assert_eq!(entry.mole_fraction, 0.05);
        assert_eq!(entry.label(), "Vo");
        assert_eq!(entry.valence(), 2.0);
        assert!(Arc::ptr_eq(&entry.species, &species));
    }

    #[test]
    fn validate_rejects_out_of_range_mole_fractions() {
        assert!(DefectSpecies::new("Vo", 2.0, 0.2, 1.0).validate().is_ok());
        assert!(matches!(
            DefectSpecies::new("Vo", 2.0, -0.1, 1.0).validate(),
            Err(ModelError::InvalidMoleFraction { .. })
        ));
        assert!(matches!(
            DefectSpecies::new("Vo", 2.0, 1.0, 1.0).validate(),
            Err(ModelError::InvalidMoleFraction { .. })
        ));
        assert!(DefectSpecies::new("Vo", 2.0, f64::NAN, 1.0).validate().is_err());
    }
}
