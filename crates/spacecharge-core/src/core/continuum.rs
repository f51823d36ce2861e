use super::grid::LaplacianLimits;
use super::io::site_data::{InputError, SiteData, SiteRecord};
use super::utils::interpolation::interpolate_linear;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Node distribution of a continuum mesh across the grid range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContinuumMesh {
    /// Evenly spaced nodes.
    Uniform,
    /// Nodes concentrated towards the centre of the range. With `u` uniform on `[-1, 1]`,
    /// positions follow `centre + half_width * sign(u) |u|^exponent`; an exponent of one is
    /// the uniform mesh.
    Graded { exponent: f64 },
}

impl ContinuumMesh {
    fn positions(self, x_min: f64, x_max: f64, count: usize) -> Vec<f64> {
        let centre = 0.5 * (x_min + x_max);
        let half_width = 0.5 * (x_max - x_min);
        let last = (count - 1) as f64;
        (0..count)
            .map(|j| {
                let u = -1.0 + 2.0 * j as f64 / last;
                match self {
                    Self::Uniform => centre + half_width * u,
                    Self::Graded { exponent } => {
                        centre + half_width * u.signum() * u.abs().powf(exponent)
                    }
                }
            })
            .collect()
    }
}

/// Checks the node count and grading of a continuum mesh before any resampling.
pub fn validate_mesh(points_per_label: usize, mesh: ContinuumMesh) -> Result<(), InputError> {
    if points_per_label < 2 {
        return Err(InputError::InvalidMesh(format!(
            "need at least two points per label, got {points_per_label}"
        )));
    }
    if let ContinuumMesh::Graded { exponent } = mesh {
        if !(exponent.is_finite() && exponent >= 1.0) {
            return Err(InputError::InvalidMesh(format!(
                "graded exponent must be at least one, got {exponent}"
            )));
        }
    }
    Ok(())
}

/// Resamples site data onto a continuum mesh.
///
/// Each site label gets `points_per_label` nodes; labels are interleaved across a combined
/// mesh in order of first appearance. Per-defect segregation energies are interpolated
/// linearly along the rows of the same label between the Laplacian limits and held constant
/// beyond them. Every resampled row carries the weight `original / resampled` of its label,
/// so the total number of sites inside the range is unchanged.
pub fn resample(
    data: &SiteData,
    points_per_label: usize,
    mesh: ContinuumMesh,
) -> Result<SiteData, InputError> {
    validate_mesh(points_per_label, mesh)?;

    let mut labels: Vec<&str> = Vec::new();
    for record in data.in_range() {
        if !labels.contains(&record.label.as_str()) {
            labels.push(&record.label);
        }
    }

    let (x_min, x_max) = data.grid_limits();
    let total = points_per_label * labels.len();
    let positions = mesh.positions(x_min, x_max, total);

    let profiles: Vec<LabelProfile> = labels
        .iter()
        .map(|&label| LabelProfile::new(data, label, points_per_label))
        .collect();

    let records = positions
        .iter()
        .enumerate()
        .map(|(j, &x)| profiles[j % profiles.len()].record_at(x))
        .collect();

    let limits = LaplacianLimits {
        left: positions[0] - (positions[1] - positions[0]),
        right: positions[total - 1] + (positions[total - 1] - positions[total - 2]),
    };
    debug!(
        labels = labels.len(),
        nodes = total,
        "Resampled site data onto a continuum mesh."
    );
    Ok(SiteData::from_parts(records, (x_min, x_max), limits))
}

struct LabelProfile {
    label: String,
    valence: f64,
    weight: f64,
    xs: Vec<f64>,
    energies: Vec<(String, Vec<f64>)>,
}

impl LabelProfile {
    fn new(data: &SiteData, label: &str, points: usize) -> Self {
        let rows: Vec<&SiteRecord> = data.within_limits().filter(|r| r.label == label).collect();
        let in_range: f64 = data
            .in_range()
            .iter()
            .filter(|r| r.label == label)
            .map(|r| r.weight)
            .sum();

        let mut defects: Vec<String> = Vec::new();
        for (defect, _) in rows.iter().flat_map(|r| r.energies.iter()) {
            if !defects.contains(defect) {
                defects.push(defect.clone());
            }
        }
        let energies = defects
            .into_iter()
            .map(|defect| {
                let values = rows.iter().map(|r| r.energy(&defect).unwrap_or(0.0)).collect();
                (defect, values)
            })
            .collect();

        Self {
            label: label.to_string(),
            valence: rows.first().map_or(0.0, |r| r.valence),
            weight: in_range / points as f64,
            xs: rows.iter().map(|r| r.x).collect(),
            energies,
        }
    }

    fn record_at(&self, x: f64) -> SiteRecord {
        let energies = self
            .energies
            .iter()
            .map(|(defect, values)| {
                let energy = interpolate_linear(&self.xs, values, x).unwrap_or(0.0);
                (defect.clone(), energy)
            })
            .collect();
        let mut record = SiteRecord::new(self.label.clone(), self.valence, x, energies);
        record.weight = self.weight;
        record
    }
}
