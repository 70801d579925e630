use crate::core::utils::geometry::Real;

/// Attributes of one particle species (group).
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    pub charge: Real,
    pub mass: Real,
    member_count: usize,
}

impl Species {
    /// Number of particles of this species in the owning set, as recorded by
    /// the last regroup.
    pub fn member_count(&self) -> usize {
        self.member_count
    }
}

/// Ordered table of species; the position of a species in the table is its
/// group index.
///
/// This is the lookup collaborator consumed by the regroup operation: it maps
/// a group index to per-species charge and mass, and receives the member
/// count of each group back once grouping has been established.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesSet {
    species: Vec<Species>,
}

impl SpeciesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a species and returns its group index.
    ///
    /// This method is idempotent; adding a name that already exists returns
    /// the existing group index without modifying its attributes.
    pub fn add_species(&mut self, name: &str, charge: Real, mass: Real) -> usize {
        if let Some(idx) = self.find_by_name(name) {
            return idx;
        }
        self.species.push(Species {
            name: name.to_string(),
            charge,
            mass,
            member_count: 0,
        });
        self.species.len() - 1
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn get(&self, group: usize) -> Option<&Species> {
        self.species.get(group)
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    /// Charge of the species with the given group index.
    ///
    /// # Panics
    ///
    /// Panics if `group` is out of range; callers validate group ids first.
    pub fn charge_of(&self, group: usize) -> Real {
        self.species[group].charge
    }

    /// Mass of the species with the given group index.
    ///
    /// # Panics
    ///
    /// Panics if `group` is out of range; callers validate group ids first.
    pub fn mass_of(&self, group: usize) -> Real {
        self.species[group].mass
    }

    pub fn member_count(&self, group: usize) -> usize {
        self.species[group].member_count
    }

    pub(crate) fn set_member_count(&mut self, group: usize, count: usize) {
        self.species[group].member_count = count;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_species_assigns_sequential_group_indices() {
        let mut set = SpeciesSet::new();
        assert_eq!(set.add_species("u", -1.0, 1.0), 0);
        assert_eq!(set.add_species("d", -1.0, 1.0), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn add_species_is_idempotent_by_name() {
        let mut set = SpeciesSet::new();
        set.add_species("ion", 4.0, 21894.7);
        assert_eq!(set.add_species("ion", 99.0, 1.0), 0);
        assert_eq!(set.len(), 1);
        assert_eq!(set.charge_of(0), 4.0);
    }

    #[test]
    fn attribute_lookups_follow_group_index() {
        let mut set = SpeciesSet::new();
        set.add_species("u", -1.0, 1.0);
        set.add_species("ion", 4.0, 21894.7);

        assert_eq!(set.charge_of(1), 4.0);
        assert_eq!(set.mass_of(0), 1.0);
        assert_eq!(set.find_by_name("ion"), Some(1));
        assert_eq!(set.find_by_name("missing"), None);
    }

    #[test]
    fn member_counts_round_trip() {
        let mut set = SpeciesSet::new();
        set.add_species("u", -1.0, 1.0);
        set.set_member_count(0, 8);
        assert_eq!(set.member_count(0), 8);
        assert_eq!(set.get(0).unwrap().member_count(), 8);
    }
}
