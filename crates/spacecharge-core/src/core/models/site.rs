use super::defect::{DefectRole, SiteDefect};

/// A single lattice plane of the grain-boundary model.
///
/// A site is located at position `x` (metres) and hosts one or more defect species, each
/// with its own segregation energy, bulk reference mole fraction and boundary-condition
/// role. An optional static `charge` (units of e) represents the host-lattice charge of the
/// site and only contributes when site charges are enabled for a calculation. The `weight`
/// scales the number of physical sites represented by this node; it is one for
/// site-explicit models and the resampling ratio for continuum models.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub label: String,
    pub x: f64,
    pub defects: Vec<SiteDefect>,
    pub charge: Option<f64>,
    pub weight: f64,
}

/// Normalisation of the free-defect Boltzmann weights on one site.
///
/// Log-weights are shifted by their maximum before exponentiation so that large segregation
/// energies or potentials never overflow.
struct Partition {
    shift: f64,
    sum: f64,
    capacity: f64,
}

impl Site {
    pub fn new(label: impl Into<String>, x: f64, defects: Vec<SiteDefect>) -> Self {
        Self {
            label: label.into(),
            x,
            defects,
            charge: None,
            weight: 1.0,
        }
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = Some(charge);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn defect(&self, label: &str) -> Option<&SiteDefect> {
        self.defects.iter().find(|d| d.label() == label)
    }

    pub fn defect_mut(&mut self, label: &str) -> Option<&mut SiteDefect> {
        self.defects.iter_mut().find(|d| d.label() == label)
    }

    pub fn hosts(&self, label: &str) -> bool {
        self.defect(label).is_some()
    }

    /// Sets the boundary-condition role of `label` on this site. Returns `false` if the
    /// site does not host that defect.
    pub fn set_role(&mut self, label: &str, role: DefectRole) -> bool {
        match self.defect_mut(label) {
            Some(defect) => {
                defect.role = role;
                true
            }
            None => false,
        }
    }

    /// Total bulk mole fraction of clamped defects, i.e. the share of the site that is
    /// unavailable to the free species.
    fn clamped_fraction(&self) -> f64 {
        self.defects
            .iter()
            .filter(|d| d.is_clamped())
            .map(|d| d.mole_fraction)
            .sum()
    }

    #[inline]
    fn log_weight(defect: &SiteDefect, phi: f64, kt: f64) -> f64 {
        defect.mole_fraction.ln() - (defect.segregation_energy + defect.valence() * phi) / kt
    }

    fn partition(&self, phi: f64, kt: f64) -> Partition {
        let capacity = 1.0 - self.clamped_fraction();
        let free_total: f64 = self
            .defects
            .iter()
            .filter(|d| !d.is_clamped())
            .map(|d| d.mole_fraction)
            .sum();
        let log_vacant = (capacity - free_total).max(0.0).ln();

        let shift = self
            .defects
            .iter()
            .filter(|d| !d.is_clamped())
            .map(|d| Self::log_weight(d, phi, kt))
            .fold(log_vacant, f64::max);

        if !shift.is_finite() {
            return Partition {
                shift: 0.0,
                sum: 0.0,
                capacity,
            };
        }

        let sum = (log_vacant - shift).exp()
            + self
                .defects
                .iter()
                .filter(|d| !d.is_clamped())
                .map(|d| (Self::log_weight(d, phi, kt) - shift).exp())
                .sum::<f64>();

        Partition {
            shift,
            sum,
            capacity,
        }
    }

    #[inline]
    fn occupancy(defect: &SiteDefect, partition: &Partition, phi: f64, kt: f64) -> f64 {
        match defect.role {
            DefectRole::ClampedToBulk => defect.mole_fraction,
            DefectRole::Free if partition.sum > 0.0 => {
                partition.capacity * (Self::log_weight(defect, phi, kt) - partition.shift).exp()
                    / partition.sum
            }
            DefectRole::Free => 0.0,
        }
    }

    /// Local mole fraction of every hosted defect at potential `phi` (V), in the order of
    /// [`Site::defects`].
    ///
    /// Free defects follow the site-exclusion Boltzmann distribution
    /// `p_j = (1 - X_c) x_j w_j / ((1 - X_c - X_f) + sum_k x_k w_k)` with
    /// `w_j = exp(-(E_j + z_j phi) / kT)`, where `X_c` is the clamped share of the site and
    /// `X_f` the total bulk share of the free defects. Clamped defects keep their bulk value.
    pub fn mole_fractions(&self, phi: f64, kt: f64) -> Vec<f64> {
        let partition = self.partition(phi, kt);
        self.defects
            .iter()
            .map(|d| Self::occupancy(d, &partition, phi, kt))
            .collect()
    }

    /// Local mole fraction of a single defect, or `None` if the site does not host it.
    pub fn mole_fraction_of(&self, label: &str, phi: f64, kt: f64) -> Option<f64> {
        let defect = self.defect(label)?;
        let partition = self.partition(phi, kt);
        Some(Self::occupancy(defect, &partition, phi, kt))
    }

    /// Net charge of the node in units of e, scaled by the site weight.
    pub fn charge(&self, phi: f64, kt: f64, include_site_charge: bool) -> f64 {
        self.charge_and_derivative(phi, kt, include_site_charge).0
    }

    /// Net charge of the node and its derivative with respect to `phi`.
    ///
    /// The derivative is `-(1/kT) (sum z^2 p - (sum z p)^2 / (1 - X_c))` over the free defects,
    /// which is never positive: raising the potential never increases the local charge.
    pub fn charge_and_derivative(
        &self,
        phi: f64,
        kt: f64,
        include_site_charge: bool,
    ) -> (f64, f64) {
        let partition = self.partition(phi, kt);
        let mut charge = 0.0;
        let mut free_zp = 0.0;
        let mut free_z2p = 0.0;
        for defect in &self.defects {
            let p = Self::occupancy(defect, &partition, phi, kt);
            let z = defect.valence();
            charge += z * p;
            if !defect.is_clamped() {
                free_zp += z * p;
                free_z2p += z * z * p;
            }
        }
        if include_site_charge {
            charge += self.charge.unwrap_or(0.0);
        }

        let derivative = if partition.capacity > 0.0 {
            -(free_z2p - free_zp * free_zp / partition.capacity) / kt
        } else {
            0.0
        };

        (self.weight * charge, self.weight * derivative)
    }
}
