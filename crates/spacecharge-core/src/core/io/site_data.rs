use crate::core::grid::LaplacianLimits;
use crate::core::models::collection::SiteCollection;
use crate::core::models::defect::{DefectSpecies, SiteDefect};
use crate::core::models::error::ModelError;
use crate::core::models::site::Site;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("Positions must be strictly increasing: row {index} at x = {current} follows x = {previous}")]
    NonIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Invalid grid range [{x_min}, {x_max}]")]
    InvalidRange { x_min: f64, x_max: f64 },

    #[error("Need at least {required} rows inside [{x_min}, {x_max}], found {found}")]
    TooFewRows {
        x_min: f64,
        x_max: f64,
        required: usize,
        found: usize,
    },

    #[error("Defect species '{0}' does not appear in the site data")]
    MissingDefect(String),

    #[error("Invalid continuum mesh: {0}")]
    InvalidMesh(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// One row of site data: a lattice plane with its segregation energies.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub label: String,
    /// Charge of the host site in units of e.
    pub valence: f64,
    pub x: f64,
    /// Segregation energy (eV) for each defect label that can occupy this site.
    pub energies: Vec<(String, f64)>,
    /// Number of physical sites represented by this row.
    pub weight: f64,
}

impl SiteRecord {
    pub fn new(label: impl Into<String>, valence: f64, x: f64, energies: Vec<(String, f64)>) -> Self {
        Self {
            label: label.into(),
            valence,
            x,
            energies,
            weight: 1.0,
        }
    }

    pub fn energy(&self, defect: &str) -> Option<f64> {
        self.energies
            .iter()
            .find(|(label, _)| label == defect)
            .map(|&(_, e)| e)
    }
}

/// Site data clipped to a grid range.
///
/// All rows are kept so that the neighbours just outside the range can close the end cells
/// (the Laplacian limits) and anchor interpolation in continuum models.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteData {
    records: Vec<SiteRecord>,
    in_range: std::ops::Range<usize>,
    grid_limits: (f64, f64),
    laplacian_limits: LaplacianLimits,
}

impl SiteData {
    pub const MIN_ROWS: usize = 2;

    /// Clips `records` to `[x_min, x_max]` and derives the Laplacian limits from the nearest
    /// rows outside the range. If the data stops at the range, the limit is extrapolated by
    /// mirroring the edge spacing.
    pub fn new(records: Vec<SiteRecord>, x_min: f64, x_max: f64) -> Result<Self, InputError> {
        if !(x_min.is_finite() && x_max.is_finite()) || x_min >= x_max {
            return Err(InputError::InvalidRange { x_min, x_max });
        }
        for (index, pair) in records.windows(2).enumerate() {
            if pair[1].x <= pair[0].x {
                return Err(InputError::NonIncreasing {
                    index: index + 1,
                    previous: pair[0].x,
                    current: pair[1].x,
                });
            }
        }

        let start = records.partition_point(|r| r.x < x_min);
        let end = records.partition_point(|r| r.x <= x_max);
        let found = end.saturating_sub(start);
        if found < Self::MIN_ROWS {
            return Err(InputError::TooFewRows {
                x_min,
                x_max,
                required: Self::MIN_ROWS,
                found,
            });
        }

        let left = if start > 0 {
            records[start - 1].x
        } else {
            warn!(x_min, "No site data below the grid range; extrapolating the left Laplacian limit.");
            2.0 * records[start].x - records[start + 1].x
        };
        let right = if end < records.len() {
            records[end].x
        } else {
            warn!(x_max, "No site data above the grid range; extrapolating the right Laplacian limit.");
            2.0 * records[end - 1].x - records[end - 2].x
        };

        debug!(
            rows = records.len(),
            in_range = found,
            left,
            right,
            "Clipped site data to the grid range."
        );

        Ok(Self {
            records,
            in_range: start..end,
            grid_limits: (x_min, x_max),
            laplacian_limits: LaplacianLimits { left, right },
        })
    }

    /// Builds site data whose rows all lie inside the range and whose limits are known.
    pub(crate) fn from_parts(
        records: Vec<SiteRecord>,
        grid_limits: (f64, f64),
        laplacian_limits: LaplacianLimits,
    ) -> Self {
        let in_range = 0..records.len();
        Self {
            records,
            in_range,
            grid_limits,
            laplacian_limits,
        }
    }

    /// Every row, including those outside the grid range.
    pub fn records(&self) -> &[SiteRecord] {
        &self.records
    }

    pub fn in_range(&self) -> &[SiteRecord] {
        &self.records[self.in_range.clone()]
    }

    /// Rows between the Laplacian limits, inclusive.
    pub fn within_limits(&self) -> impl Iterator<Item = &SiteRecord> {
        let LaplacianLimits { left, right } = self.laplacian_limits;
        self.records.iter().filter(move |r| r.x >= left && r.x <= right)
    }

    pub fn grid_limits(&self) -> (f64, f64) {
        self.grid_limits
    }

    pub fn laplacian_limits(&self) -> LaplacianLimits {
        self.laplacian_limits
    }

    /// Confines segregation to the grain-boundary core.
    ///
    /// For every defect label, energies weaker than half of the strongest (most negative)
    /// in-range energy are set to zero. Labels without a negative energy are left untouched.
    pub fn apply_core_model(&mut self) {
        let mut strongest: HashMap<String, f64> = HashMap::new();
        for (label, energy) in self.in_range().iter().flat_map(|r| r.energies.iter()) {
            let entry = strongest.entry(label.clone()).or_insert(0.0);
            *entry = entry.min(*energy);
        }

        for record in &mut self.records {
            for (label, energy) in &mut record.energies {
                if let Some(&min) = strongest.get(label.as_str()) {
                    if min < 0.0 && *energy > 0.5 * min {
                        *energy = 0.0;
                    }
                }
            }
        }
        debug!(species = strongest.len(), "Applied core segregation model.");
    }

    /// Builds the site collection for the in-range rows.
    ///
    /// Defect labels in the data that have no matching species are ignored. Every species
    /// must appear on at least one in-range row.
    pub fn build_sites(&self, species: &[Arc<DefectSpecies>]) -> Result<SiteCollection, InputError> {
        for s in species {
            s.validate()?;
            if !self.in_range().iter().any(|r| r.energy(&s.label).is_some()) {
                return Err(InputError::MissingDefect(s.label.clone()));
            }
        }

        let sites = self
            .in_range()
            .iter()
            .map(|record| {
                let defects = record
                    .energies
                    .iter()
                    .filter_map(|(label, energy)| {
                        species
                            .iter()
                            .find(|s| &s.label == label)
                            .map(|s| SiteDefect::new(s.clone(), *energy))
                    })
                    .collect();
                Site::new(record.label.clone(), record.x, defects)
                    .with_charge(record.valence)
                    .with_weight(record.weight)
            })
            .collect();

        Ok(SiteCollection::new(sites)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, x: f64, energy: f64) -> SiteRecord {
        SiteRecord::new(label, -2.0, x, vec![("Vo".to_string(), energy)])
    }

    fn rows() -> Vec<SiteRecord> {
        vec![
            record("O", -3.0, 0.0),
            record("O", -2.0, -0.1),
            record("O", -1.0, -0.4),
            record("O", 0.0, -1.0),
            record("O", 1.0, -0.6),
            record("O", 2.0, -0.2),
            record("O", 3.0, 0.0),
        ]
    }

    #[test]
    fn clips_rows_and_takes_limits_from_neighbours() {
        let data = SiteData::new(rows(), -1.5, 2.0).unwrap();
        let xs: Vec<f64> = data.in_range().iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![-1.0, 0.0, 1.0, 2.0]);
        assert_eq!(
            data.laplacian_limits(),
            LaplacianLimits {
                left: -2.0,
                right: 3.0
            }
        );
        assert_eq!(data.within_limits().count(), 6);
        assert_eq!(data.records().len(), 7);
    }

    #[test]
    fn extrapolates_limits_when_data_ends_at_the_range() {
        let data = SiteData::new(rows(), -3.0, 3.0).unwrap();
        assert_eq!(
            data.laplacian_limits(),
            LaplacianLimits {
                left: -4.0,
                right: 4.0
            }
        );
    }

    #[test]
    fn rejects_unordered_rows_and_empty_ranges() {
        let mut unordered = rows();
        unordered.swap(2, 3);
        assert!(matches!(
            SiteData::new(unordered, -3.0, 3.0),
            Err(InputError::NonIncreasing { index: 3, .. })
        ));
        assert!(matches!(
            SiteData::new(rows(), 10.0, 20.0),
            Err(InputError::TooFewRows { found: 0, .. })
        ));
        assert!(matches!(
            SiteData::new(rows(), 1.0, -1.0),
            Err(InputError::InvalidRange { .. })
        ));
    }

    #[test]
    fn core_model_keeps_only_strong_segregation() {
        let mut data = SiteData::new(rows(), -2.5, 2.5).unwrap();
        data.apply_core_model();
        let energies: Vec<f64> = data.records().iter().map(|r| r.energy("Vo").unwrap()).collect();
        assert_eq!(energies, vec![0.0, 0.0, 0.0, -1.0, -0.6, 0.0, 0.0]);
    }

    #[test]
    fn build_sites_attaches_known_species_only() {
        let mut rows = rows();
        rows[3].energies.push(("Li".to_string(), -0.3));
        let data = SiteData::new(rows, -1.5, 1.5).unwrap();
        let vo = Arc::new(DefectSpecies::new("Vo", 2.0, 0.01, 1.0));

        let sites = data.build_sites(&[vo.clone()]).unwrap();
        assert_eq!(sites.len(), 3);
        assert!(sites.iter().all(|s| s.defects.len() == 1));
        assert_eq!(sites.sites()[1].defect("Vo").unwrap().segregation_energy, -1.0);
        assert_eq!(sites.sites()[1].charge, Some(-2.0));

        let gd = Arc::new(DefectSpecies::new("Gd", -1.0, 0.1, 1.0));
        assert!(matches!(
            data.build_sites(&[vo, gd]),
            Err(InputError::MissingDefect(label)) if label == "Gd"
        ));
    }
}
