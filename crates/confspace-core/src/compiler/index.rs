use crate::core::design::position::{DesignPosition, PlacementError};
use crate::core::design::space::DesignSpace;
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;

/// One fragment of one indexed position.
#[derive(Debug, Clone)]
pub struct FragInfo {
    /// Dense fragment index within the position.
    pub index: usize,
    pub name: String,
    /// Flat conformation index of this fragment's first conformation.
    pub conf_offset: usize,
    pub num_confs: usize,
}

/// One conformation of one indexed position, in the flat per-position
/// conformation space spanning all fragments.
#[derive(Debug, Clone)]
pub struct ConfInfo {
    /// Dense flat index within the position.
    pub index: usize,
    /// The owning fragment's index within the position.
    pub frag_index: usize,
    /// The conformation's index within its fragment.
    pub conf_in_frag: usize,
    pub name: String,
}

/// One indexed design position.
#[derive(Debug, Clone)]
pub struct PosInfo {
    /// Dense position index, stable for the lifetime of one compile.
    pub index: usize,
    /// The position's index in the design space's own list.
    pub source_index: usize,
    /// The position data, snapshotted at indexing time.
    pub pos: DesignPosition,
    pub frags: Vec<FragInfo>,
    pub confs: Vec<ConfInfo>,
}

impl PosInfo {
    pub fn num_confs(&self) -> usize {
        self.confs.len()
    }

    /// A "position:fragment" label for reports.
    pub fn frag_label(&self, frag_index: usize) -> String {
        format!("{}:{}", self.pos.name, self.frags[frag_index].name)
    }

    /// Visits every conformation of this position as a freshly placed clone
    /// of the base molecule snapshot.
    ///
    /// Cloning preserves atom IDs, so fixed atoms keep their identity in
    /// every visited molecule; only the placed fragment atoms (handed to
    /// the callback in fragment atom order) are new. The base snapshot is
    /// never modified, so there is nothing to restore after iteration,
    /// even when the callback fails.
    pub fn each_conf<E>(
        &self,
        base: &Molecule,
        mut f: impl FnMut(&ConfInfo, &Molecule, &[AtomId]) -> Result<(), E>,
    ) -> Result<(), E>
    where
        E: From<PlacementError>,
    {
        for conf_info in &self.confs {
            let fragment = &self.pos.fragments[conf_info.frag_index];
            let conf = &fragment.confs[conf_info.conf_in_frag];
            let mut mol = base.clone();
            let placed = self.pos.place_conformation(&mut mol, fragment, conf)?;
            f(conf_info, &mol, &placed)?;
        }
        Ok(())
    }

    /// Visits one arbitrary conformation per fragment, as placed clones.
    ///
    /// Used where only topology matters (per-fragment parameterization):
    /// every conformation of a fragment shares the same atoms and bonds,
    /// so the first conformation stands in for all of them.
    pub fn each_frag<E>(
        &self,
        base: &Molecule,
        mut f: impl FnMut(&FragInfo, &Molecule, &[AtomId]) -> Result<(), E>,
    ) -> Result<(), E>
    where
        E: From<PlacementError>,
    {
        for frag_info in &self.frags {
            let fragment = &self.pos.fragments[frag_info.index];
            let conf = &fragment.confs[0];
            let mut mol = base.clone();
            let placed = self.pos.place_conformation(&mut mol, fragment, conf)?;
            f(frag_info, &mol, &placed)?;
        }
        Ok(())
    }
}

/// The canonical index space of one compile: a stable total order over
/// design positions, their fragments, and their conformations.
///
/// Positions are ordered by owning molecule first, then by the design
/// space's own position order, so two compiles of the same input produce
/// identical indices. All indices are dense and start at zero.
#[derive(Debug)]
pub struct ConfSpaceIndex {
    pub positions: Vec<PosInfo>,
}

impl ConfSpaceIndex {
    pub fn new(space: &DesignSpace) -> Self {
        let mut order: Vec<usize> = (0..space.positions.len()).collect();
        order.sort_by_key(|&i| space.positions[i].mol_index);

        let positions = order
            .into_iter()
            .enumerate()
            .map(|(index, source_index)| {
                let pos = space.positions[source_index].clone();

                let mut frags = Vec::with_capacity(pos.fragments.len());
                let mut confs = Vec::new();
                for (frag_index, fragment) in pos.fragments.iter().enumerate() {
                    frags.push(FragInfo {
                        index: frag_index,
                        name: fragment.name.clone(),
                        conf_offset: confs.len(),
                        num_confs: fragment.confs.len(),
                    });
                    for (conf_in_frag, conf) in fragment.confs.iter().enumerate() {
                        confs.push(ConfInfo {
                            index: confs.len(),
                            frag_index,
                            conf_in_frag,
                            name: conf.name.clone(),
                        });
                    }
                }

                PosInfo {
                    index,
                    source_index,
                    pos,
                    frags,
                    confs,
                }
            })
            .collect();

        Self { positions }
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    /// Per-position conformation counts, in position-index order.
    pub fn conf_counts(&self) -> Vec<usize> {
        self.positions.iter().map(|p| p.num_confs()).collect()
    }

    /// Total conformations across all positions.
    pub fn total_confs(&self) -> usize {
        self.positions.iter().map(|p| p.num_confs()).sum()
    }
}
