use std::collections::HashMap;

/// Net-charge hints for charge-generating forcefields.
///
/// Hints are consulted only for molecules flagged
/// [`needs_net_charge`](crate::core::models::molecule::Molecule::needs_net_charge);
/// a per-(position, fragment) override takes precedence over the molecule's
/// own value, since a mutation can change a small molecule's formal charge.
#[derive(Debug, Clone, Default)]
pub struct NetCharges {
    by_mol: HashMap<usize, i32>,
    by_frag: HashMap<(usize, usize), i32>,
}

impl NetCharges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the net charge of a molecule, by design-space molecule index.
    pub fn set_mol(&mut self, mol_index: usize, charge: i32) {
        self.by_mol.insert(mol_index, charge);
    }

    /// Sets the net-charge override for one fragment of one position.
    pub fn set_frag(&mut self, pos_index: usize, frag_index: usize, charge: i32) {
        self.by_frag.insert((pos_index, frag_index), charge);
    }

    /// The hint for a wild-type molecule.
    pub fn for_mol(&self, mol_index: usize) -> Option<i32> {
        self.by_mol.get(&mol_index).copied()
    }

    /// The hint for a molecule carrying one fragment at one position.
    ///
    /// Falls back to the molecule's own value when no override exists.
    pub fn for_frag(&self, mol_index: usize, pos_index: usize, frag_index: usize) -> Option<i32> {
        self.by_frag
            .get(&(pos_index, frag_index))
            .copied()
            .or_else(|| self.for_mol(mol_index))
    }
}
