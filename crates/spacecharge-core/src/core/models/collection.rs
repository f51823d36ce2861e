use super::defect::{DefectRole, DefectSpecies, validate_mole_fraction};
use super::error::ModelError;
use super::site::Site;
use std::sync::Arc;

/// An ordered, validated sequence of sites.
///
/// Insertion order is the physical left-to-right order: positions are strictly increasing
/// and finite, every site has a positive weight, and the bulk mole fractions on each site
/// leave a non-zero vacant share. The collection can only be mutated through operations that
/// preserve these invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteCollection {
    sites: Vec<Site>,
}

impl SiteCollection {
    pub fn new(sites: Vec<Site>) -> Result<Self, ModelError> {
        if sites.is_empty() {
            return Err(ModelError::Empty);
        }
        for (index, site) in sites.iter().enumerate() {
            validate_site(index, site)?;
        }
        for (index, pair) in sites.windows(2).enumerate() {
            if pair[1].x <= pair[0].x {
                return Err(ModelError::NonIncreasingPosition {
                    index: index + 1,
                    previous: pair[0].x,
                    current: pair[1].x,
                });
            }
        }
        Ok(Self { sites })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    #[inline]
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    pub fn positions(&self) -> Vec<f64> {
        self.sites.iter().map(|s| s.x).collect()
    }

    /// Distinct site labels in order of first appearance.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for site in &self.sites {
            if !labels.contains(&site.label.as_str()) {
                labels.push(&site.label);
            }
        }
        labels
    }

    /// Distinct defect species hosted anywhere in the collection, in order of first appearance.
    pub fn species(&self) -> Vec<Arc<DefectSpecies>> {
        let mut species: Vec<Arc<DefectSpecies>> = Vec::new();
        for defect in self.sites.iter().flat_map(|s| s.defects.iter()) {
            if !species.iter().any(|s| s.label == defect.label()) {
                species.push(defect.species.clone());
            }
        }
        species
    }

    /// Indices of all sites carrying `label`.
    pub fn indices_of(&self, label: &str) -> Vec<usize> {
        self.sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.label == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// A mutable view of all sites labelled `label`. Changes made through the view are
    /// changes to this collection.
    pub fn subset_mut(&mut self, label: &str) -> SiteSubsetMut<'_> {
        let indices = self.indices_of(label);
        SiteSubsetMut {
            sites: &mut self.sites,
            indices,
        }
    }

    /// Weighted mean of the bulk reference mole fraction of `defect` over the free entries
    /// hosting it, or `None` if no free entry exists.
    pub fn bulk_mole_fraction(&self, defect: &str) -> Option<f64> {
        let (total, weight) = self
            .sites
            .iter()
            .filter_map(|s| s.defect(defect).map(|d| (s.weight, d)))
            .filter(|(_, d)| !d.is_clamped())
            .fold((0.0, 0.0), |(t, w), (sw, d)| (t + sw * d.mole_fraction, w + sw));
        (weight > 0.0).then(|| total / weight)
    }

    /// Sets the bulk reference mole fraction of `defect` on every free entry hosting it.
    ///
    /// The update is rejected as a whole if any affected site would be overfilled.
    pub fn set_bulk_mole_fraction(&mut self, defect: &str, value: f64) -> Result<usize, ModelError> {
        validate_mole_fraction(defect, value)?;
        for (index, site) in self.sites.iter().enumerate() {
            let Some(entry) = site.defect(defect) else {
                continue;
            };
            if entry.is_clamped() {
                continue;
            }
            let total: f64 = site
                .defects
                .iter()
                .map(|d| if d.label() == defect { value } else { d.mole_fraction })
                .sum();
            if total >= 1.0 {
                return Err(ModelError::OverfilledSite {
                    index,
                    label: site.label.clone(),
                    total,
                });
            }
        }

        let mut updated = 0;
        for site in &mut self.sites {
            if let Some(entry) = site.defect_mut(defect) {
                if !entry.is_clamped() {
                    entry.mole_fraction = value;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

/// Mutable view over the sites sharing one label.
pub struct SiteSubsetMut<'a> {
    sites: &'a mut [Site],
    indices: Vec<usize>,
}

impl SiteSubsetMut<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices of the viewed sites in the parent collection.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.indices.iter().map(|&i| &self.sites[i])
    }

    /// Sets the role of `defect` on every viewed site hosting it and returns how many entries
    /// were changed.
    pub fn set_role(&mut self, defect: &str, role: DefectRole) -> usize {
        let mut changed = 0;
        for &i in &self.indices {
            if self.sites[i].set_role(defect, role) {
                changed += 1;
            }
        }
        changed
    }

    /// Holds `defect` at its bulk value on the viewed sites (Mott-Schottky behaviour).
    pub fn clamp_defect(&mut self, defect: &str) -> usize {
        self.set_role(defect, DefectRole::ClampedToBulk)
    }

    /// Lets `defect` respond to the potential on the viewed sites (Gouy-Chapman behaviour).
    pub fn release_defect(&mut self, defect: &str) -> usize {
        self.set_role(defect, DefectRole::Free)
    }
}

fn validate_site(index: usize, site: &Site) -> Result<(), ModelError> {
    if !site.x.is_finite() {
        return Err(ModelError::NonFinitePosition { index });
    }
    if !(site.weight.is_finite() && site.weight > 0.0) {
        return Err(ModelError::InvalidWeight {
            index,
            weight: site.weight,
        });
    }
    let mut total = 0.0;
    for defect in &site.defects {
        validate_mole_fraction(defect.label(), defect.mole_fraction)?;
        if !defect.segregation_energy.is_finite() {
            return Err(ModelError::NonFiniteEnergy {
                defect: defect.label().to_string(),
            });
        }
        total += defect.mole_fraction;
    }
    if total >= 1.0 {
        return Err(ModelError::OverfilledSite {
            index,
            label: site.label.clone(),
            total,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::defect::SiteDefect;

    fn species() -> (Arc<DefectSpecies>, Arc<DefectSpecies>) {
        (
            Arc::new(DefectSpecies::new("Vo", 2.0, 0.05, 1.0)),
            Arc::new(DefectSpecies::new("Gd", -1.0, 0.1, 1e-3)),
        )
    }

    fn alternating_sites(n: usize) -> Vec<Site> {
        let (vo, gd) = species();
        (0..n)
            .map(|i| {
                let x = i as f64 * 1e-10;
                if i % 2 == 0 {
                    Site::new("site_1", x, vec![SiteDefect::new(vo.clone(), 0.0)])
                } else {
                    Site::new("site_2", x, vec![SiteDefect::new(gd.clone(), 0.0)])
                }
            })
            .collect()
    }

    #[test]
    fn new_accepts_strictly_increasing_positions() {
        let collection = SiteCollection::new(alternating_sites(5)).unwrap();
        assert_eq!(collection.len(), 5);
        assert_eq!(collection.labels(), vec!["site_1", "site_2"]);
        let labels: Vec<_> = collection.species().iter().map(|s| s.label.clone()).collect();
        assert_eq!(labels, vec!["Vo".to_string(), "Gd".to_string()]);
    }

    #[test]
    fn new_rejects_duplicate_or_decreasing_positions() {
        let mut sites = alternating_sites(4);
        sites[2].x = sites[1].x;
        assert!(matches!(
            SiteCollection::new(sites),
            Err(ModelError::NonIncreasingPosition { index: 2, .. })
        ));
        assert_eq!(SiteCollection::new(Vec::new()), Err(ModelError::Empty));
    }

    #[test]
    fn new_rejects_overfilled_sites() {
        let a = Arc::new(DefectSpecies::new("A", 1.0, 0.6, 1.0));
        let b = Arc::new(DefectSpecies::new("B", -1.0, 0.5, 1.0));
        let site = Site::new("s", 0.0, vec![SiteDefect::new(a, 0.0), SiteDefect::new(b, 0.0)]);
        assert!(matches!(
            SiteCollection::new(vec![site]),
            Err(ModelError::OverfilledSite { index: 0, .. })
        ));
    }

    #[test]
    fn subset_mutations_are_visible_in_the_parent_collection() {
        let mut collection = SiteCollection::new(alternating_sites(6)).unwrap();
        {
            let mut subset = collection.subset_mut("site_2");
            assert_eq!(subset.indices(), &[1, 3, 5]);
            assert_eq!(subset.clamp_defect("Gd"), 3);
            assert_eq!(subset.clamp_defect("Vo"), 0);
            assert!(subset.iter().all(|s| s.defect("Gd").unwrap().is_clamped()));
        }
        assert!(collection.sites()[3].defect("Gd").unwrap().is_clamped());
        assert!(!collection.sites()[0].defect("Vo").unwrap().is_clamped());

        collection.subset_mut("site_2").release_defect("Gd");
        assert!(!collection.sites()[3].defect("Gd").unwrap().is_clamped());
    }

    #[test]
    fn set_bulk_mole_fraction_only_touches_free_entries() {
        let mut collection = SiteCollection::new(alternating_sites(6)).unwrap();
        collection.subset_mut("site_2").clamp_defect("Gd");
        assert_eq!(collection.set_bulk_mole_fraction("Gd", 0.2).unwrap(), 0);
        assert_eq!(collection.bulk_mole_fraction("Gd"), None);

        assert_eq!(collection.set_bulk_mole_fraction("Vo", 0.07).unwrap(), 3);
        assert!((collection.bulk_mole_fraction("Vo").unwrap() - 0.07).abs() < 1e-15);
        assert!(matches!(
            collection.set_bulk_mole_fraction("Vo", 1.2),
            Err(ModelError::InvalidMoleFraction { .. })
        ));
    }
}
