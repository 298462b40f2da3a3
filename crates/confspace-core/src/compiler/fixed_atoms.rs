use super::atom_index::AtomIndex;
use crate::core::compiled::PairAtom;
use crate::core::design::position::DesignPosition;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A dynamic-ownership conflict: two positions both perturb one fixed atom.
///
/// Carried back as a value so the orchestrator's abort path is a plain
/// early return; this is a user-facing design-space error, not a defect.
#[derive(Debug, Clone, Error)]
#[error("atom claimed by both {first} and {second}")]
pub struct ClaimConflict {
    pub mol_index: usize,
    pub atom: AtomId,
    /// The first claimant, as "position:fragment".
    pub first: String,
    /// The conflicting claimant, as "position:fragment".
    pub second: String,
}

/// The statics-assignment step ran twice.
#[derive(Debug, Error)]
#[error("static atom indices were already assigned")]
pub struct StaticsAlreadyAssigned;

/// One atom of the global static set.
#[derive(Debug, Clone)]
pub struct StaticAtom {
    pub mol_index: usize,
    pub id: AtomId,
    /// Globally-unique display name (molecule, chain/residue, atom).
    pub name: String,
}

#[derive(Debug, Clone)]
struct Claim {
    pos_index: usize,
    /// "position:fragment" of the claimant, kept for conflict reports.
    label: String,
}

/// The ledger partitioning every non-design atom into exactly one of
/// {dynamic-to-one-position, static}.
///
/// Atoms are keyed by `(molecule index, atom ID)`; atom IDs alone are only
/// unique within one molecule's slot map. Positions report dynamic claims
/// as the compiler discovers parameter perturbations; [`update_static`]
/// (Self::update_static) then terminally assigns every unclaimed fixed atom
/// a dense static index and display name.
#[derive(Debug)]
pub struct FixedAtoms {
    /// Per-molecule fixed atoms not yet assigned static, in molecule atom
    /// order. Drained by `update_static`.
    remaining: Vec<Vec<AtomId>>,
    dynamic_owner: HashMap<(usize, AtomId), Claim>,
    /// Per-position claimed atoms, in claim order. This order becomes the
    /// head of every conformation's local atom list.
    dynamic_by_pos: Vec<Vec<AtomId>>,
    statics: Vec<StaticAtom>,
    static_lookup: HashMap<(usize, AtomId), u32>,
    statics_assigned: bool,
}

impl FixedAtoms {
    /// Builds the ledger over molecule snapshots: every atom not in any
    /// position's current-atom set starts out fixed and unclassified.
    pub fn new(mols: &[Molecule], positions: &[DesignPosition]) -> Self {
        let mut design_atoms: Vec<HashSet<AtomId>> = vec![HashSet::new(); mols.len()];
        for pos in positions {
            design_atoms[pos.mol_index].extend(pos.current_atoms.iter().copied());
        }

        let remaining = mols
            .iter()
            .zip(&design_atoms)
            .map(|(mol, design)| {
                mol.atoms_ordered()
                    .map(|(id, _)| id)
                    .filter(|id| !design.contains(id))
                    .collect()
            })
            .collect();

        Self {
            remaining,
            dynamic_owner: HashMap::new(),
            dynamic_by_pos: vec![Vec::new(); positions.len()],
            statics: Vec::new(),
            static_lookup: HashMap::new(),
            statics_assigned: false,
        }
    }

    /// The fixed atoms of a molecule that have not been assigned static yet.
    ///
    /// Dynamically claimed atoms stay in this list until
    /// [`update_static`](Self::update_static) so that a later position's
    /// claim on the same atom still surfaces as a conflict; afterward the
    /// list is empty.
    pub fn fixed(&self, mol_index: usize) -> &[AtomId] {
        &self.remaining[mol_index]
    }

    /// Claims atoms as dynamic for one position.
    ///
    /// Idempotent per atom for the same position (across fragments and
    /// conformations); a claim by a *different* position is a conflict.
    pub fn add_dynamic(
        &mut self,
        mol_index: usize,
        pos_index: usize,
        claimant: &str,
        atoms: &[AtomId],
    ) -> Result<(), ClaimConflict> {
        for &atom in atoms {
            match self.dynamic_owner.get(&(mol_index, atom)) {
                Some(owner) if owner.pos_index != pos_index => {
                    return Err(ClaimConflict {
                        mol_index,
                        atom,
                        first: owner.label.clone(),
                        second: claimant.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    self.dynamic_owner.insert(
                        (mol_index, atom),
                        Claim {
                            pos_index,
                            label: claimant.to_string(),
                        },
                    );
                    self.dynamic_by_pos[pos_index].push(atom);
                }
            }
        }
        Ok(())
    }

    /// The atoms claimed dynamic by a position, in claim order.
    pub fn dynamic_atoms(&self, pos_index: usize) -> &[AtomId] {
        &self.dynamic_by_pos[pos_index]
    }

    /// Terminally assigns every still-unclaimed fixed atom the next static
    /// index and its display name; the remaining fixed lists drain to
    /// empty. Must run exactly once, after all positions have reported
    /// their dynamic claims.
    pub fn update_static(&mut self, mols: &[Molecule]) -> Result<(), StaticsAlreadyAssigned> {
        if self.statics_assigned {
            return Err(StaticsAlreadyAssigned);
        }
        self.statics_assigned = true;

        for (mol_index, remaining) in self.remaining.iter_mut().enumerate() {
            for id in remaining.drain(..) {
                if self.dynamic_owner.contains_key(&(mol_index, id)) {
                    continue;
                }
                let index = self.statics.len() as u32;
                self.static_lookup.insert((mol_index, id), index);
                self.statics.push(StaticAtom {
                    mol_index,
                    id,
                    name: mols[mol_index]
                        .display_name(id)
                        .unwrap_or_else(|| format!("{}/?", mols[mol_index].name)),
                });
            }
        }
        Ok(())
    }

    /// The dense static index of an atom, if it is static.
    pub fn static_index(&self, mol_index: usize, atom: AtomId) -> Option<u32> {
        self.static_lookup.get(&(mol_index, atom)).copied()
    }

    /// The static atoms, in index order.
    pub fn statics(&self) -> &[StaticAtom] {
        &self.statics
    }

    /// Resolves an atom against a conformation's local atom list first and
    /// the static set second, producing the shared signed encoding.
    pub fn get_or_static(
        &self,
        mol_index: usize,
        atom: AtomId,
        local: &AtomIndex,
    ) -> Option<PairAtom> {
        if let Some(i) = local.index_of(atom) {
            return Some(PairAtom::Local(i as u32));
        }
        self.static_index(mol_index, atom).map(PairAtom::Static)
    }
}
