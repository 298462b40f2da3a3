use super::position::DesignPosition;
use crate::core::models::lock::MolLock;
use crate::core::models::molecule::Molecule;
use std::sync::Arc;

/// A design space: molecules, the design positions on them, and the
/// fragments/conformations allowed at each position.
///
/// The compiler treats a design space as authored and already valid; it does
/// not decide chemistry. Molecules are held behind [`MolLock`]s because
/// other threads (e.g., live views) may observe them while a compile runs.
#[derive(Debug, Clone)]
pub struct DesignSpace {
    /// The name of the design space, carried into the compiled artifact.
    pub name: String,
    /// The molecules, in a fixed author-chosen order.
    pub mols: Vec<Arc<MolLock>>,
    /// The design positions, in a fixed author-chosen order. Position
    /// ordering in compiled artifacts is by owning molecule first, then by
    /// this list's order.
    pub positions: Vec<DesignPosition>,
}

impl DesignSpace {
    /// Creates a design space over owned molecules.
    pub fn new(name: &str, mols: Vec<Molecule>, positions: Vec<DesignPosition>) -> Self {
        Self {
            name: name.to_string(),
            mols: mols.into_iter().map(|m| Arc::new(MolLock::new(m))).collect(),
            positions,
        }
    }
}
