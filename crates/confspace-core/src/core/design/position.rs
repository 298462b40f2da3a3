use super::fragment::{Conformation, Fragment};
use crate::core::models::atom::Atom;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry;
use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("anchor atom {atom:?} of position '{position}' not found in the molecule")]
    AnchorAtomMissing { position: String, atom: AtomId },

    #[error(
        "fragment '{fragment}' defines {found} anchor groups but position '{position}' has {expected}"
    )]
    AnchorGroupMismatch {
        position: String,
        fragment: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "conformation '{conf}' of fragment '{fragment}' has {found} coordinates for {expected} atoms"
    )]
    ConformationSizeMismatch {
        fragment: String,
        conf: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "insufficient anchor atoms for stable alignment of fragment '{fragment}': requires at least 3, but found {found}"
    )]
    InsufficientAnchors { fragment: String, found: usize },
}

/// An ordered tuple of molecule atoms used to align fragments onto the
/// molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorGroup {
    /// The anchor atoms, in the order the fragments' anchor templates use.
    pub atoms: Vec<AtomId>,
}

/// A named site on a molecule whose occupying atoms may be swapped for
/// alternative fragments and conformations.
#[derive(Debug, Clone)]
pub struct DesignPosition {
    /// The name of the position (e.g., "A23").
    pub name: String,
    /// Index of the owning molecule within the design space.
    pub mol_index: usize,
    /// The replaceable atom set currently occupying the position.
    pub current_atoms: Vec<AtomId>,
    /// The ordered anchor groups used to align fragments.
    pub anchor_groups: Vec<AnchorGroup>,
    /// The fragments (mutations) allowed at this position.
    pub fragments: Vec<Fragment>,
}

impl DesignPosition {
    /// Places one conformation of a fragment onto a molecule.
    ///
    /// The position's current atoms are removed, the conformation's
    /// coordinates are rigidly aligned onto the molecule via the anchor
    /// groups, the fragment's atoms are added, and the fragment's internal
    /// and anchor bonds are rebuilt. The molecule is expected to be a clone
    /// of the design-space snapshot this position was defined against;
    /// fixed atoms keep their IDs through the swap.
    ///
    /// # Return
    ///
    /// The IDs of the placed atoms, in fragment atom order.
    ///
    /// # Errors
    ///
    /// Returns a [`PlacementError`] if the anchors are inconsistent with the
    /// fragment or too few for a stable alignment.
    pub fn place_conformation(
        &self,
        mol: &mut Molecule,
        fragment: &Fragment,
        conf: &Conformation,
    ) -> Result<Vec<AtomId>, PlacementError> {
        if conf.coords.len() != fragment.atoms.len() {
            return Err(PlacementError::ConformationSizeMismatch {
                fragment: fragment.name.clone(),
                conf: conf.name.clone(),
                expected: fragment.atoms.len(),
                found: conf.coords.len(),
            });
        }
        if fragment.anchor_coords.len() != self.anchor_groups.len() {
            return Err(PlacementError::AnchorGroupMismatch {
                position: self.name.clone(),
                fragment: fragment.name.clone(),
                expected: self.anchor_groups.len(),
                found: fragment.anchor_coords.len(),
            });
        }

        let (rotation, translation) = self.alignment_transform(mol, fragment)?;

        for &atom_id in &self.current_atoms {
            mol.remove_atom(atom_id);
        }

        let placed: Vec<AtomId> = fragment
            .atoms
            .iter()
            .zip(&conf.coords)
            .map(|(template, coord)| {
                let position = rotation * coord + translation;
                mol.add_atom(Atom::new(&template.name, &template.element, position))
            })
            .collect();

        for &(i, j) in &fragment.bonds {
            mol.add_bond(placed[i], placed[j]);
        }
        for &((group, index), frag_atom) in &fragment.anchor_bonds {
            let anchor_id = self.anchor_groups[group].atoms[index];
            mol.add_bond(anchor_id, placed[frag_atom]);
        }

        Ok(placed)
    }

    /// Computes the rigid transform aligning a fragment's anchor template
    /// coordinates onto this position's anchor atoms in the molecule.
    fn alignment_transform(
        &self,
        mol: &Molecule,
        fragment: &Fragment,
    ) -> Result<(nalgebra::Rotation3<f64>, nalgebra::Vector3<f64>), PlacementError> {
        let mut mol_points: Vec<Point3<f64>> = Vec::new();
        let mut frag_points: Vec<Point3<f64>> = Vec::new();

        for (group, template_coords) in self.anchor_groups.iter().zip(&fragment.anchor_coords) {
            for (&atom_id, &template) in group.atoms.iter().zip(template_coords) {
                let atom = mol
                    .atom(atom_id)
                    .ok_or(PlacementError::AnchorAtomMissing {
                        position: self.name.clone(),
                        atom: atom_id,
                    })?;
                mol_points.push(atom.position);
                frag_points.push(template);
            }
        }

        if mol_points.len() < 3 {
            return Err(PlacementError::InsufficientAnchors {
                fragment: fragment.name.clone(),
                found: mol_points.len(),
            });
        }

        geometry::superpose(&frag_points, &mol_points).ok_or(
            PlacementError::InsufficientAnchors {
                fragment: fragment.name.clone(),
                found: mol_points.len(),
            },
        )
    }

    /// Resolves a motion atom reference against placed fragment atoms.
    ///
    /// Anchor references resolve to molecule atoms; fragment references
    /// resolve through the `placed` list returned by
    /// [`place_conformation`](Self::place_conformation).
    pub fn resolve_motion_atom(
        &self,
        placed: &[AtomId],
        atom: super::fragment::MotionAtom,
    ) -> AtomId {
        match atom {
            super::fragment::MotionAtom::Anchor { group, index } => {
                self.anchor_groups[group].atoms[index]
            }
            super::fragment::MotionAtom::Fragment(i) => placed[i],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::design::fragment::FragmentAtom;

    fn create_backbone_molecule() -> (Molecule, Vec<AtomId>, AtomId) {
        let mut mol = Molecule::new("m");
        let n = mol.add_atom(Atom::new("N", "N", Point3::new(0.0, 1.4, 0.0)));
        let ca = mol.add_atom(Atom::new("CA", "C", Point3::new(0.0, 0.0, 0.0)));
        let c = mol.add_atom(Atom::new("C", "C", Point3::new(1.4, 0.0, 0.0)));
        let cb = mol.add_atom(Atom::new("CB", "C", Point3::new(0.0, -0.7, 1.2)));
        mol.add_bond(n, ca).unwrap();
        mol.add_bond(ca, c).unwrap();
        mol.add_bond(ca, cb).unwrap();
        (mol, vec![n, ca, c], cb)
    }

    fn create_position(anchors: Vec<AtomId>, current: Vec<AtomId>) -> DesignPosition {
        DesignPosition {
            name: "A1".to_string(),
            mol_index: 0,
            current_atoms: current,
            anchor_groups: vec![AnchorGroup { atoms: anchors }],
            fragments: vec![],
        }
    }

    fn create_two_atom_fragment() -> Fragment {
        // Anchor template matches the molecule's N/CA/C geometry translated
        // by (10, 10, 10), so placement must undo that translation.
        let shift = nalgebra::Vector3::new(10.0, 10.0, 10.0);
        Fragment {
            name: "FRG".to_string(),
            atoms: vec![
                FragmentAtom {
                    name: "CB".to_string(),
                    element: "C".to_string(),
                    position: Point3::new(0.0, -0.7, 1.2) + shift,
                },
                FragmentAtom {
                    name: "OG".to_string(),
                    element: "O".to_string(),
                    position: Point3::new(0.0, -1.5, 2.3) + shift,
                },
            ],
            bonds: vec![(0, 1)],
            anchor_coords: vec![vec![
                Point3::new(0.0, 1.4, 0.0) + shift,
                Point3::new(0.0, 0.0, 0.0) + shift,
                Point3::new(1.4, 0.0, 0.0) + shift,
            ]],
            anchor_bonds: vec![((0, 1), 0)],
            confs: vec![],
            motions: vec![],
        }
    }

    fn conf_from_template(fragment: &Fragment, name: &str) -> Conformation {
        Conformation {
            name: name.to_string(),
            coords: fragment.atoms.iter().map(|a| a.position).collect(),
        }
    }

    #[test]
    fn place_conformation_swaps_atoms_and_rebuilds_bonds() {
        let (mut mol, anchors, cb) = create_backbone_molecule();
        let ca = anchors[1];
        let position = create_position(anchors, vec![cb]);
        let fragment = create_two_atom_fragment();
        let conf = conf_from_template(&fragment, "c0");

        let placed = position
            .place_conformation(&mut mol, &fragment, &conf)
            .unwrap();

        assert_eq!(placed.len(), 2);
        assert!(mol.atom(cb).is_none(), "Old CB should be gone");
        assert_eq!(mol.atom_count(), 5);

        // Transform undone: the placed CB lands where the old one was.
        let new_cb = mol.atom(placed[0]).unwrap();
        assert!((new_cb.position - Point3::new(0.0, -0.7, 1.2)).norm() < 1e-9);

        // CA-CB anchor bond and CB-OG internal bond both restored.
        assert!(mol.bonded_neighbors(ca).unwrap().contains(&placed[0]));
        assert!(mol.bonded_neighbors(placed[0]).unwrap().contains(&placed[1]));
    }

    #[test]
    fn place_conformation_fails_on_size_mismatch() {
        let (mut mol, anchors, cb) = create_backbone_molecule();
        let position = create_position(anchors, vec![cb]);
        let fragment = create_two_atom_fragment();
        let conf = Conformation {
            name: "bad".to_string(),
            coords: vec![Point3::origin()],
        };

        let result = position.place_conformation(&mut mol, &fragment, &conf);
        assert!(matches!(
            result,
            Err(PlacementError::ConformationSizeMismatch { .. })
        ));
    }

    #[test]
    fn place_conformation_fails_with_too_few_anchors() {
        let (mut mol, anchors, cb) = create_backbone_molecule();
        let position = create_position(anchors[..2].to_vec(), vec![cb]);
        let mut fragment = create_two_atom_fragment();
        fragment.anchor_coords[0].truncate(2);
        let conf = conf_from_template(&fragment, "c0");

        let result = position.place_conformation(&mut mol, &fragment, &conf);
        assert!(matches!(
            result,
            Err(PlacementError::InsufficientAnchors { found: 2, .. })
        ));
    }

    #[test]
    fn place_conformation_fails_on_anchor_group_count_mismatch() {
        let (mut mol, anchors, cb) = create_backbone_molecule();
        let position = create_position(anchors, vec![cb]);
        let mut fragment = create_two_atom_fragment();
        fragment.anchor_coords.push(vec![]);
        let conf = conf_from_template(&fragment, "c0");

        let result = position.place_conformation(&mut mol, &fragment, &conf);
        assert!(matches!(
            result,
            Err(PlacementError::AnchorGroupMismatch { .. })
        ));
    }
}
