//! # Compiled Artifacts
//!
//! The durable output of a compile: a flattened, index-addressed description
//! of a conformation space that a downstream energy evaluator can consume
//! with no knowledge of chemistry, topology, or forcefields. Everything in
//! this module is pure data; the pipeline that produces it lives in
//! [`crate::compiler`].

pub mod document;

use serde::{Deserialize, Serialize};

/// Identifies which side of the static/local split an atom index addresses.
///
/// Within one conformation's atom-pair lists, an atom is either *local* (a
/// member of that conformation's own atom list) or *static* (a member of the
/// global static set). Both kinds share one signed integer field: local
/// indices are stored as-is, static index `s` is stored as `-(s) - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAtom {
    /// An index into the current conformation's local atom list.
    Local(u32),
    /// An index into the global static atom list.
    Static(u32),
}

impl PairAtom {
    /// Encodes this reference into the shared signed field.
    pub fn encode(self) -> i32 {
        match self {
            PairAtom::Local(i) => i as i32,
            PairAtom::Static(s) => -(s as i32) - 1,
        }
    }

    /// Decodes a signed field back into a reference.
    pub fn decode(encoded: i32) -> Self {
        if encoded >= 0 {
            PairAtom::Local(encoded as u32)
        } else {
            PairAtom::Static((-(encoded + 1)) as u32)
        }
    }
}

/// One compiled pairwise interaction term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomPair {
    /// Index of the first atom in the conformation's local atom list.
    pub i1: u32,
    /// The second atom: a local index, or a static index encoded per
    /// [`PairAtom::encode`].
    pub i2: i32,
    /// Index of the pair's parameter tuple in the owning forcefield's
    /// parameter table.
    pub params: u32,
}

/// Metadata describing one forcefield the space was compiled under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcefieldInfo {
    /// The forcefield's name (e.g., "amber96").
    pub name: String,
    /// The implementation a downstream evaluator should pair with this
    /// forcefield's parameter tuples.
    pub implementation: String,
    /// The settings the forcefield was configured with, verbatim.
    pub settings: toml::Table,
}

/// One atom of the compiled artifact: display name plus coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAtom {
    pub name: String,
    pub coords: [f64; 3],
}

/// A compiled continuous-motion descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledMotion {
    /// A dihedral rotation: four defining atoms (encoded per
    /// [`PairAtom::encode`], since the axis may start on a static atom),
    /// the local indices of the rotated atoms, and the inclusive degree
    /// bounds around the conformation's as-built angle.
    Dihedral {
        bounds: [f64; 2],
        abcd: [i32; 4],
        rotated: Vec<u32>,
    },
}

/// One compiled conformation of one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledConf {
    /// The fragment this conformation instantiates.
    pub frag: String,
    /// The conformation's name within the fragment.
    pub name: String,
    /// The local atom list: the position's dynamic fixed atoms first, then
    /// the fragment's own atoms.
    pub atoms: Vec<CompiledAtom>,
    /// Continuous motions attached to this conformation.
    pub motions: Vec<CompiledMotion>,
    /// Internal energy under each forcefield, in forcefield order.
    pub internal_energies: Vec<f64>,
}

/// One compiled design position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPos {
    pub name: String,
    /// Conformations in flat conformation-index order.
    pub confs: Vec<CompiledConf>,
}

/// One forcefield's atom-pair lists plus its shared parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAtomPairs {
    /// The deduplicated parameter tuples all pair lists index into.
    pub params: Vec<Vec<f64>>,
    /// `singles[pos][conf]`: pairs within one conformation's local atoms.
    pub singles: Vec<Vec<Vec<AtomPair>>>,
    /// `statics[pos][conf]`: pairs between local atoms and the static set.
    pub statics: Vec<Vec<Vec<AtomPair>>>,
    /// `pairs[linear(pos1,pos2)][conf1][conf2]`: pairs between two
    /// positions' conformations, with `pos2 < pos1` and
    /// `linear(pos1,pos2) = pos1*(pos1-1)/2 + pos2`.
    pub pairs: Vec<Vec<Vec<Vec<AtomPair>>>>,
}

/// The compiled conformation space: the durable hand-off artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledConfSpace {
    pub name: String,
    /// The forcefields, in the order every per-forcefield list below uses.
    pub forcefields: Vec<ForcefieldInfo>,
    /// The static atoms, in static-index order.
    pub static_atoms: Vec<CompiledAtom>,
    /// Baseline energy of the static set under each forcefield.
    pub static_energy: Vec<f64>,
    /// The design positions, in position-index order.
    pub positions: Vec<CompiledPos>,
    /// Per-forcefield atom pairs, in forcefield order.
    pub atom_pairs: Vec<CompiledAtomPairs>,
}
