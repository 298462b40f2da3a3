use crate::core::utils::elements;
use nalgebra::Point3;

/// Identifies the chain and residue an atom originates from.
///
/// Molecules loaded from polymer formats carry this tag so that static atoms
/// from different residues (or different molecules with clashing atom names)
/// can be given globally-unique display names in the compiled artifact.
/// Small molecules typically leave it unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResidueTag {
    /// The single-character chain identifier (e.g., 'A').
    pub chain_id: char,
    /// The sequential residue number within the chain.
    pub residue_number: isize,
}

/// Represents an atom in a molecule.
///
/// This struct carries only what conformation space compilation reads:
/// identity (name, element, optional residue tag) and 3-D coordinates.
/// Forcefield-specific per-atom values never live here; they are owned by
/// the opaque parameterizations a forcefield produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "N", "O").
    pub name: String,
    /// The element symbol (e.g., "C", "N", "H").
    pub element: String,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// The chain/residue the atom belongs to, if any.
    pub residue: Option<ResidueTag>,
}

impl Atom {
    /// Creates a new `Atom` with no residue tag.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `element` - The element symbol.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: &str, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            element: element.to_string(),
            position,
            residue: None,
        }
    }

    /// Returns the same atom tagged with a chain/residue origin.
    pub fn with_residue(mut self, chain_id: char, residue_number: isize) -> Self {
        self.residue = Some(ResidueTag {
            chain_id,
            residue_number,
        });
        self
    }

    /// Whether this atom is a hydrogen (or one of its isotopes).
    pub fn is_hydrogen(&self) -> bool {
        elements::is_hydrogen(&self.element)
    }

    /// Whether every coordinate of this atom is finite.
    pub fn has_finite_position(&self) -> bool {
        self.position.coords.iter().all(|c| c.is_finite())
    }
}
