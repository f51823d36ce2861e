use super::models::collection::SiteCollection;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("A grid needs at least {required} nodes, found {found}")]
    TooFewNodes { required: usize, found: usize },

    #[error(
        "Laplacian limits ({left}, {right}) must lie strictly outside the site positions [{first}, {last}]"
    )]
    InvalidLimits {
        left: f64,
        right: f64,
        first: f64,
        last: f64,
    },

    #[error("Cross-section area must be positive and finite, got {0}")]
    InvalidArea(f64),
}

/// Coordinates just beyond the first and last node, used to close the end cells.
///
/// They usually come from the neighbouring input rows outside the requested grid range, so
/// the end cells have the same size they would have in the unclipped data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplacianLimits {
    pub left: f64,
    pub right: f64,
}

/// Three-point finite-volume stencil of the second derivative at one node.
///
/// With `w` the cell width and `h_l`, `h_r` the distances to the left and right neighbours,
/// `left = 1 / (w h_l)` and `right = 1 / (w h_r)`. For interior nodes `w = (h_l + h_r) / 2`
/// and this is the classic non-uniform formula `2 / (h_l (h_l + h_r))`, exact for quadratics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub left: f64,
    pub centre: f64,
    pub right: f64,
}

impl Stencil {
    pub fn new(width: f64, h_left: f64, h_right: f64) -> Self {
        let left = 1.0 / (width * h_left);
        let right = 1.0 / (width * h_right);
        Self {
            left,
            centre: -(left + right),
            right,
        }
    }
}

/// Non-uniform 1-D discretisation derived from a [`SiteCollection`].
///
/// The grid borrows the collection it was built from, so it cannot outlive it, and the
/// borrow freezes the site positions: stencils computed at construction stay valid for the
/// lifetime of the grid.
#[derive(Debug, Clone)]
pub struct Grid<'a> {
    sites: &'a SiteCollection,
    x: Vec<f64>,
    cell_widths: Vec<f64>,
    stencils: Vec<Stencil>,
    limits: LaplacianLimits,
    cross_section_area: f64,
}

impl<'a> Grid<'a> {
    pub const MIN_NODES: usize = 3;

    /// Builds the grid. Without explicit limits the end cells mirror the edge spacing.
    pub fn new(
        sites: &'a SiteCollection,
        limits: Option<LaplacianLimits>,
        cross_section_area: f64,
    ) -> Result<Self, GridError> {
        let x = sites.positions();
        let n = x.len();
        if n < Self::MIN_NODES {
            return Err(GridError::TooFewNodes {
                required: Self::MIN_NODES,
                found: n,
            });
        }
        if !(cross_section_area.is_finite() && cross_section_area > 0.0) {
            return Err(GridError::InvalidArea(cross_section_area));
        }

        let first = x[0];
        let last = x[n - 1];
        let limits = limits.unwrap_or(LaplacianLimits {
            left: first - (x[1] - x[0]),
            right: last + (x[n - 1] - x[n - 2]),
        });
        if !(limits.left.is_finite() && limits.right.is_finite())
            || limits.left >= first
            || limits.right <= last
        {
            return Err(GridError::InvalidLimits {
                left: limits.left,
                right: limits.right,
                first,
                last,
            });
        }

        let spacing = |i: usize| -> (f64, f64) {
            let h_left = if i == 0 { x[0] - limits.left } else { x[i] - x[i - 1] };
            let h_right = if i == n - 1 {
                limits.right - x[n - 1]
            } else {
                x[i + 1] - x[i]
            };
            (h_left, h_right)
        };

        let (cell_widths, stencils): (Vec<f64>, Vec<Stencil>) = (0..n)
            .map(|i| {
                let (h_left, h_right) = spacing(i);
                let width = 0.5 * (h_left + h_right);
                (width, Stencil::new(width, h_left, h_right))
            })
            .unzip();

        Ok(Self {
            sites,
            x,
            cell_widths,
            stencils,
            limits,
            cross_section_area,
        })
    }

    #[inline]
    pub fn sites(&self) -> &'a SiteCollection {
        self.sites
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Width of the cell around each node: half the distance to each neighbour, summed.
    #[inline]
    pub fn cell_widths(&self) -> &[f64] {
        &self.cell_widths
    }

    #[inline]
    pub fn stencils(&self) -> &[Stencil] {
        &self.stencils
    }

    #[inline]
    pub fn limits(&self) -> LaplacianLimits {
        self.limits
    }

    #[inline]
    pub fn cross_section_area(&self) -> f64 {
        self.cross_section_area
    }

    /// Distance across the periodic seam, shared by the first and last node.
    pub fn wrap_spacing(&self) -> f64 {
        let n = self.x.len();
        0.5 * ((self.x[0] - self.limits.left) + (self.limits.right - self.x[n - 1]))
    }

    /// Length of the periodic cell, i.e. the sum of all cell widths.
    pub fn period(&self) -> f64 {
        self.cell_widths.iter().sum()
    }

    /// Volumetric charge density (C/m^3) of each node from per-node charges in units of e.
    pub fn charge_density(&self, node_charges: &[f64]) -> Vec<f64> {
        node_charges
            .iter()
            .zip(&self.cell_widths)
            .map(|(q, w)| super::constants::ELEMENTARY_CHARGE * q / (self.cross_section_area * w))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::defect::{DefectSpecies, SiteDefect};
    use crate::core::models::site::Site;
    use std::sync::Arc;

    const TOLERANCE: f64 = 1e-9;

    fn collection(positions: &[f64]) -> SiteCollection {
        let species = Arc::new(DefectSpecies::new("A", 1.0, 0.01, 1.0));
        SiteCollection::new(
            positions
                .iter()
                .map(|&x| Site::new("s", x, vec![SiteDefect::new(species.clone(), 0.0)]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn stencils_are_exact_for_quadratics_on_non_uniform_spacing() {
        let sites = collection(&[0.0, 0.7, 1.5, 3.0, 3.2, 5.0]);
        let grid = Grid::new(&sites, None, 1.0).unwrap();
        let f: Vec<f64> = grid.x().iter().map(|x| 3.0 * x * x - x + 2.0).collect();
        for i in 1..grid.len() - 1 {
            let s = grid.stencils()[i];
            let d2 = s.left * f[i - 1] + s.centre * f[i] + s.right * f[i + 1];
            assert!((d2 - 6.0).abs() < TOLERANCE, "node {i}: {d2}");
        }
    }

    #[test]
    fn end_cells_use_supplied_limits() {
        let sites = collection(&[1.0, 2.0, 4.0]);
        let limits = LaplacianLimits {
            left: 0.0,
            right: 7.0,
        };
        let grid = Grid::new(&sites, Some(limits), 2.0).unwrap();
        assert_eq!(grid.cell_widths(), &[1.0, 1.5, 2.5]);
        assert!((grid.wrap_spacing() - 2.0).abs() < TOLERANCE);
        assert!((grid.period() - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn missing_limits_mirror_the_edge_spacing() {
        let sites = collection(&[0.0, 1.0, 3.0]);
        let grid = Grid::new(&sites, None, 1.0).unwrap();
        assert_eq!(
            grid.limits(),
            LaplacianLimits {
                left: -1.0,
                right: 5.0
            }
        );
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let small = collection(&[0.0, 1.0]);
        assert!(matches!(
            Grid::new(&small, None, 1.0),
            Err(GridError::TooFewNodes { found: 2, .. })
        ));

        let sites = collection(&[0.0, 1.0, 2.0]);
        assert!(matches!(
            Grid::new(&sites, None, 0.0),
            Err(GridError::InvalidArea(_))
        ));
        let inside = LaplacianLimits {
            left: 0.5,
            right: 3.0,
        };
        assert!(matches!(
            Grid::new(&sites, Some(inside), 1.0),
            Err(GridError::InvalidLimits { .. })
        ));
    }

    #[test]
    fn charge_density_divides_by_cell_volume() {
        let sites = collection(&[0.0, 1.0, 3.0]);
        let grid = Grid::new(&sites, None, 2.0).unwrap();
        let rho = grid.charge_density(&[1.0, 1.0, 1.0]);
        let e = crate::core::constants::ELEMENTARY_CHARGE;
        assert!((rho[1] - e / (2.0 * 1.5)).abs() < 1e-30);
    }
}
