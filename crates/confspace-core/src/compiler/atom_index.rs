use crate::core::models::ids::AtomId;
use std::collections::HashMap;

/// Bidirectional atom↔index lookup over one ordered atom list.
///
/// Used wherever atoms must be referenced by dense number instead of by ID:
/// conformation-local atom lists and the global static set.
#[derive(Debug, Clone, Default)]
pub struct AtomIndex {
    ids: Vec<AtomId>,
    lookup: HashMap<AtomId, usize>,
}

impl AtomIndex {
    /// Builds an index over the given atoms, in order.
    pub fn new(ids: impl IntoIterator<Item = AtomId>) -> Self {
        let ids: Vec<AtomId> = ids.into_iter().collect();
        let lookup = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self { ids, lookup }
    }

    /// The dense index of an atom, if it is in this list.
    pub fn index_of(&self, id: AtomId) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    /// The atom at a dense index.
    pub fn id_at(&self, index: usize) -> Option<AtomId> {
        self.ids.get(index).copied()
    }

    /// The atoms, in index order.
    pub fn ids(&self) -> &[AtomId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::molecule::Molecule;
    use nalgebra::Point3;

    #[test]
    fn lookup_is_consistent_in_both_directions() {
        let mut mol = Molecule::new("m");
        let ids: Vec<_> = (0..4)
            .map(|i| mol.add_atom(Atom::new(&format!("C{}", i), "C", Point3::origin())))
            .collect();

        let index = AtomIndex::new(ids.clone());

        assert_eq!(index.len(), 4);
        for (i, &id) in ids.iter().enumerate() {
            assert_eq!(index.index_of(id), Some(i));
            assert_eq!(index.id_at(i), Some(id));
        }
        assert_eq!(index.id_at(4), None);
    }

    #[test]
    fn missing_atom_has_no_index() {
        let mut mol = Molecule::new("m");
        let a = mol.add_atom(Atom::new("A", "C", Point3::origin()));
        let b = mol.add_atom(Atom::new("B", "C", Point3::origin()));

        let index = AtomIndex::new([a]);
        assert_eq!(index.index_of(b), None);
    }
}
