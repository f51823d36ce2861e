use super::state::{SubGrid, SubGridDefect};
use crate::core::grid::Grid;

/// Splits the grid into one [`SubGrid`] per site label, in order of first appearance.
pub fn form_subgrids(grid: &Grid<'_>, phi: &[f64], kt: f64) -> Vec<SubGrid> {
    grid.sites()
        .labels()
        .into_iter()
        .map(|label| {
            let indices = grid.sites().indices_of(label);
            collect(grid, phi, kt, label, indices)
        })
        .collect()
}

/// The nodes hosting `defect`, whatever their site label. `None` if no node hosts it.
pub fn form_defect_subgrid(grid: &Grid<'_>, phi: &[f64], kt: f64, defect: &str) -> Option<SubGrid> {
    let indices: Vec<usize> = grid
        .sites()
        .iter()
        .enumerate()
        .filter(|(_, site)| site.hosts(defect))
        .map(|(i, _)| i)
        .collect();
    (!indices.is_empty()).then(|| collect(grid, phi, kt, defect, indices))
}

fn collect(grid: &Grid<'_>, phi: &[f64], kt: f64, label: &str, indices: Vec<usize>) -> SubGrid {
    let sites = grid.sites().sites();

    let mut defects: Vec<SubGridDefect> = Vec::new();
    for &i in &indices {
        for entry in &sites[i].defects {
            if defects.iter().all(|d| d.label != entry.label()) {
                defects.push(SubGridDefect {
                    label: entry.label().to_string(),
                    valence: entry.valence(),
                    mobility: entry.species.mobility,
                    mole_fractions: Vec::with_capacity(indices.len()),
                    bulk_mole_fractions: Vec::with_capacity(indices.len()),
                });
            }
        }
    }

    for &i in &indices {
        let site = &sites[i];
        let local = site.mole_fractions(phi[i], kt);
        for defect in &mut defects {
            let position = site.defects.iter().position(|d| d.label() == defect.label);
            match position {
                Some(k) => {
                    defect.mole_fractions.push(local[k]);
                    defect.bulk_mole_fractions.push(site.defects[k].mole_fraction);
                }
                None => {
                    defect.mole_fractions.push(0.0);
                    defect.bulk_mole_fractions.push(0.0);
                }
            }
        }
    }

    SubGrid {
        label: label.to_string(),
        x: indices.iter().map(|&i| grid.x()[i]).collect(),
        phi: indices.iter().map(|&i| phi[i]).collect(),
        indices,
        defects,
    }
}
