use crate::core::forcefield::MolParams;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use std::collections::HashMap;
use thiserror::Error;

/// A cache lookup that should have been populated by an earlier pipeline
/// stage. Reaching this is a pipeline-ordering defect, not a user-facing
/// condition.
#[derive(Debug, Error)]
#[error("missing parameterization for {context}")]
pub struct ParamsMiss {
    pub context: String,
}

/// One fragment-instance parameterization: the parameters together with the
/// placed molecule they were computed on.
///
/// The molecule is kept because pair compilation needs its bond graph for
/// bonded-distance queries, and the placed atom IDs are the bridge between
/// fragment atom order and molecule identity.
#[derive(Debug)]
pub struct FragParams {
    pub params: Box<dyn MolParams>,
    /// The base-snapshot clone this fragment was placed on.
    pub mol: Molecule,
    /// IDs of the placed fragment atoms, in fragment atom order.
    pub placed: Vec<AtomId>,
}

/// The two-level parameterization cache of one compile.
///
/// Wild-type parameterizations are keyed by `(forcefield, molecule)`;
/// fragment-instance parameterizations by `(forcefield, position,
/// fragment)`. Both levels are filled completely by the parameterize stage
/// before anything reads them; a miss is a programming error.
#[derive(Debug, Default)]
pub struct MolsParams {
    wild_type: HashMap<(usize, usize), Box<dyn MolParams>>,
    frags: HashMap<(usize, usize, usize), FragParams>,
}

impl MolsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_wild_type(&mut self, ff: usize, mol: usize, params: Box<dyn MolParams>) {
        self.wild_type.insert((ff, mol), params);
    }

    pub fn wild_type(&self, ff: usize, mol: usize) -> Result<&dyn MolParams, ParamsMiss> {
        self.wild_type
            .get(&(ff, mol))
            .map(|p| p.as_ref())
            .ok_or_else(|| ParamsMiss {
                context: format!("forcefield {} molecule {}", ff, mol),
            })
    }

    /// The wild-type parameterizations of one forcefield, by molecule index.
    pub fn wild_type_by_mol(&self, ff: usize) -> HashMap<usize, &dyn MolParams> {
        self.wild_type
            .iter()
            .filter(|((f, _), _)| *f == ff)
            .map(|((_, mol), params)| (*mol, params.as_ref()))
            .collect()
    }

    pub fn put_frag(&mut self, ff: usize, pos: usize, frag: usize, params: FragParams) {
        self.frags.insert((ff, pos, frag), params);
    }

    pub fn frag(&self, ff: usize, pos: usize, frag: usize) -> Result<&FragParams, ParamsMiss> {
        self.frags.get(&(ff, pos, frag)).ok_or_else(|| ParamsMiss {
            context: format!("forcefield {} position {} fragment {}", ff, pos, frag),
        })
    }
}
