use super::atom::Atom;
use super::ids::AtomId;
use slotmap::{SecondaryMap, SlotMap};
use std::collections::VecDeque;

/// Represents a molecule as an undirected atom/bond graph.
///
/// This struct is the central molecular data structure the compiler reads.
/// Atom identity is carried by slot-map keys, which survive cloning: a clone
/// of a molecule addresses the same atoms by the same [`AtomId`]s, which the
/// compiler relies on when it places candidate conformations onto clones of
/// an immutable per-compile snapshot.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    /// The display name of the molecule, used to disambiguate atoms
    /// originating from different molecules in the compiled artifact.
    pub name: String,
    /// Whether forcefields that generate partial charges need an explicit
    /// net-charge hint for this molecule. Set by the (out-of-scope)
    /// chemistry classification step that prepared the design space.
    pub needs_net_charge: bool,
    /// Primary storage for atoms using a slot map for stable ID management.
    atoms: SlotMap<AtomId, Atom>,
    /// List of all bonds in the molecule.
    bonds: Vec<(AtomId, AtomId)>,
    /// Cached adjacency list for bond connectivity, indexed by atom ID.
    bond_adjacency: SecondaryMap<AtomId, Vec<AtomId>>,
    /// Insertion order of live atoms, for deterministic iteration.
    atom_order: Vec<AtomId>,
}

impl Molecule {
    /// Creates a new, empty molecule with the given display name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Retrieves an immutable reference to an atom by its ID.
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Retrieves a mutable reference to an atom by its ID.
    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Returns the number of atoms currently in the molecule.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Returns an iterator over all atoms in insertion order.
    ///
    /// Slot maps do not guarantee a stable iteration order across removals,
    /// so the molecule tracks insertion order itself; every compile of the
    /// same molecule therefore visits atoms identically.
    pub fn atoms_ordered(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atom_order
            .iter()
            .filter_map(|&id| self.atoms.get(id).map(|a| (id, a)))
    }

    /// Returns a slice of all bonds in the molecule.
    pub fn bonds(&self) -> &[(AtomId, AtomId)] {
        &self.bonds
    }

    /// Adds an atom to the molecule.
    pub fn add_atom(&mut self, atom: Atom) -> AtomId {
        let id = self.atoms.insert(atom);
        self.bond_adjacency.insert(id, Vec::new());
        self.atom_order.push(id);
        id
    }

    /// Adds a bond between two atoms.
    ///
    /// This method is idempotent; adding an existing bond succeeds without
    /// creating duplicates.
    ///
    /// # Return
    ///
    /// Returns `Some(())` if successful, otherwise `None` (e.g., if either
    /// atom does not exist).
    pub fn add_bond(&mut self, atom1_id: AtomId, atom2_id: AtomId) -> Option<()> {
        if !self.atoms.contains_key(atom1_id) || !self.atoms.contains_key(atom2_id) {
            return None;
        }

        if let Some(neighbors) = self.bond_adjacency.get(atom1_id) {
            if neighbors.contains(&atom2_id) {
                return Some(());
            }
        }

        self.bonds.push((atom1_id, atom2_id));
        self.bond_adjacency[atom1_id].push(atom2_id);
        self.bond_adjacency[atom2_id].push(atom1_id);
        Some(())
    }

    /// Removes an atom from the molecule along with all its bonds.
    ///
    /// # Return
    ///
    /// Returns `Some(Atom)` if the atom existed and was removed, otherwise `None`.
    pub fn remove_atom(&mut self, atom_id: AtomId) -> Option<Atom> {
        let atom = self.atoms.remove(atom_id)?;

        let original_bonds = std::mem::take(&mut self.bonds);
        self.bonds = original_bonds
            .into_iter()
            .filter(|&(a, b)| a != atom_id && b != atom_id)
            .collect();

        let neighbors = self.bond_adjacency.remove(atom_id).unwrap_or_default();
        for neighbor_id in neighbors {
            if let Some(adjacency) = self.bond_adjacency.get_mut(neighbor_id) {
                adjacency.retain(|&id| id != atom_id);
            }
        }

        self.atom_order.retain(|&id| id != atom_id);

        Some(atom)
    }

    /// Retrieves the bonded neighbors of an atom.
    pub fn bonded_neighbors(&self, atom_id: AtomId) -> Option<&[AtomId]> {
        self.bond_adjacency.get(atom_id).map(|v| v.as_slice())
    }

    /// Computes the bonded graph distance between two atoms.
    ///
    /// The distance is the number of bonds on the shortest path through the
    /// bond graph. Atoms in different connected components (or missing
    /// atoms) have no distance.
    ///
    /// # Return
    ///
    /// Returns `Some(0)` for identical atoms, `Some(n)` for connected atoms
    /// n bonds apart, otherwise `None`.
    pub fn bonded_distance(&self, from: AtomId, to: AtomId) -> Option<u32> {
        if !self.atoms.contains_key(from) || !self.atoms.contains_key(to) {
            return None;
        }
        if from == to {
            return Some(0);
        }

        let mut distances: SecondaryMap<AtomId, u32> = SecondaryMap::new();
        distances.insert(from, 0);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            let dist = distances[current];
            for &neighbor in self.bond_adjacency.get(current)? {
                if neighbor == to {
                    return Some(dist + 1);
                }
                if !distances.contains_key(neighbor) {
                    distances.insert(neighbor, dist + 1);
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    /// Formats the globally-unique display name for one of this molecule's
    /// atoms: molecule name, optional chain/residue, and atom name.
    pub fn display_name(&self, atom_id: AtomId) -> Option<String> {
        let atom = self.atoms.get(atom_id)?;
        Some(match atom.residue {
            Some(tag) => format!(
                "{}/{}{}/{}",
                self.name, tag.chain_id, tag.residue_number, atom.name
            ),
            None => format!("{}/{}", self.name, atom.name),
        })
    }
}
