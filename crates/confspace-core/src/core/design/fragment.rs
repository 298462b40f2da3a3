use nalgebra::Point3;

/// Template data for a single atom in a fragment.
///
/// A fragment atom only becomes a real molecule atom when a conformation of
/// the fragment is placed at a design position; the coordinates here are in
/// the fragment's local frame and are replaced by each conformation's own
/// coordinate set on placement.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentAtom {
    /// The name of the atom (e.g., "CB", "OG").
    pub name: String,
    /// The element symbol (e.g., "C", "O").
    pub element: String,
    /// The atom's coordinates in the fragment's local frame.
    pub position: Point3<f64>,
}

/// One fixed 3-D coordinate assignment for a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformation {
    /// The name of the conformation (e.g., a rotamer label like "t60").
    pub name: String,
    /// One coordinate per fragment atom, in fragment atom order.
    pub coords: Vec<Point3<f64>>,
}

/// References one of the four atoms defining a dihedral angle.
///
/// The rotated side of a dihedral always lives inside the fragment, but the
/// defining axis frequently starts on an anchor atom of the molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAtom {
    /// An atom of an anchor group: (group index, index within the group).
    Anchor { group: usize, index: usize },
    /// A fragment atom, by its index in the fragment's atom list.
    Fragment(usize),
}

/// A continuous motion attached to a fragment.
///
/// Dihedral rotation is the only kind today; the tagged representation keeps
/// call sites exhaustively matched so new kinds extend rather than rewrite.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionTemplate {
    /// A rotation of `rotated` fragment atoms about the b-c axis of the
    /// dihedral defined by atoms a, b, c, d, bounded symmetrically around
    /// each conformation's as-built angle.
    Dihedral {
        a: MotionAtom,
        b: MotionAtom,
        c: MotionAtom,
        d: MotionAtom,
        /// Fragment atom indices that move with the rotation.
        rotated: Vec<usize>,
        /// Half-width of the allowed interval, in degrees.
        radius_degrees: f64,
    },
}

/// A named, self-contained atom/bond template that can occupy a design
/// position (e.g., an amino-acid side chain type).
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// The name of the fragment (e.g., "LEU").
    pub name: String,
    /// The atoms that make up this fragment.
    pub atoms: Vec<FragmentAtom>,
    /// Bonds internal to the fragment, as pairs of atom indices.
    pub bonds: Vec<(usize, usize)>,
    /// Anchor template coordinates, one list per anchor group of the owning
    /// position, each in the same order as that group's molecule atoms.
    /// Placement superposes these onto the molecule's anchor positions.
    pub anchor_coords: Vec<Vec<Point3<f64>>>,
    /// Bonds wiring the fragment to the molecule: ((group, index within
    /// group), fragment atom index).
    pub anchor_bonds: Vec<((usize, usize), usize)>,
    /// The discrete conformations of this fragment.
    pub confs: Vec<Conformation>,
    /// The continuous motions attached to this fragment.
    pub motions: Vec<MotionTemplate>,
}
