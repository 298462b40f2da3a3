//! # Forcefield Contract
//!
//! The abstract parameterizer interface the compiler consumes. Concrete
//! forcefields (including any that shell out to third-party quantum or
//! molecular-mechanics tools) live outside this crate and are handed to the
//! compiler as trait objects; multiple forcefields may be active at once and
//! are always iterated in the caller-supplied order.

use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use std::any::Any;
use thiserror::Error;

/// A failure inside a forcefield collaborator.
///
/// The compiler wraps these with molecule / position:fragment context before
/// they reach the compile report.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ForcefieldError {
    pub message: String,
}

impl ForcefieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An opaque parameterization of one molecule under one forcefield.
///
/// The compiler never inspects the contents; it only hands a
/// parameterization back to the forcefield that produced it, together with
/// atom IDs valid in the molecule that was parameterized. Forcefields
/// downcast via [`MolParams::as_any`].
pub trait MolParams: Any + Send + Sync + std::fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

/// A molecule group handed to [`Forcefield::calc_energy`]: the molecule, the
/// atoms to include, and the parameterization those atom IDs are valid in.
pub struct EnergyGroup<'a> {
    pub mol: &'a Molecule,
    pub atoms: &'a [AtomId],
    pub params: &'a dyn MolParams,
}

/// The forcefield parameterizer contract.
///
/// Implementations must be deterministic: parameterizing equal molecules
/// must yield parameterizations that answer every query below identically,
/// or compiled artifacts stop being reproducible.
pub trait Forcefield: Send + Sync {
    /// The forcefield's name (e.g., "amber96"), carried into the artifact.
    fn name(&self) -> &str;

    /// A tag identifying the implementation a downstream energy evaluator
    /// should pair with this forcefield's parameter tuples.
    fn implementation(&self) -> &str;

    /// A snapshot of the settings this forcefield was configured with,
    /// carried verbatim into the artifact's metadata.
    fn settings(&self) -> toml::Table {
        toml::Table::new()
    }

    /// Parameterizes a molecule.
    ///
    /// `net_charge` carries the author-provided hint for molecules flagged
    /// as needing one; it is `None` otherwise.
    fn parameterize(
        &self,
        mol: &Molecule,
        net_charge: Option<i32>,
    ) -> Result<Box<dyn MolParams>, ForcefieldError>;

    /// The internal (single-atom) energy contribution of one atom, if this
    /// forcefield has one for it.
    fn internal_energy(&self, params: &dyn MolParams, atom: AtomId) -> Option<f64>;

    /// The parameter tuple for one atom pair, or `None` to skip the pair.
    ///
    /// `bonded_distance` is the bond-graph distance between the atoms, or
    /// `None` if they are disconnected or belong to different molecules;
    /// the forcefield decides from it whether the pair is excluded.
    fn pair_params(
        &self,
        params_a: &dyn MolParams,
        atom_a: AtomId,
        params_b: &dyn MolParams,
        atom_b: AtomId,
        bonded_distance: Option<u32>,
    ) -> Option<Vec<f64>>;

    /// The total energy of the given atom groups.
    fn calc_energy(&self, groups: &[EnergyGroup<'_>]) -> f64;

    /// Of `fixed_atoms`, those whose parameters differ between the
    /// conformation parameterization and the wild-type parameterization.
    ///
    /// Atom IDs are valid in both parameterizations: the conformation
    /// molecule is an identity-preserving clone of the wild-type molecule
    /// with only the design position's atoms swapped.
    fn changed_atoms(
        &self,
        fixed_atoms: &[AtomId],
        conf_params: &dyn MolParams,
        wild_type_params: &dyn MolParams,
    ) -> Vec<AtomId>;
}
