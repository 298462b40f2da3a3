//! The compile orchestrator: runs the pipeline on a background worker and
//! publishes a single report the caller can poll or join on.

use super::atom_index::AtomIndex;
use super::error::{CompileError, Report};
use super::fixed_atoms::FixedAtoms;
use super::index::{ConfSpaceIndex, PosInfo};
use super::mols_params::{FragParams, MolsParams};
use super::net_charges::NetCharges;
use super::pairs::AtomPairs;
use super::progress::CompileJob;
use crate::core::compiled::{
    CompiledAtom, CompiledConf, CompiledConfSpace, CompiledMotion, CompiledPos, ForcefieldInfo,
};
use crate::core::design::fragment::{Fragment, MotionTemplate};
use crate::core::design::space::DesignSpace;
use crate::core::forcefield::{EnergyGroup, Forcefield};
use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::utils::{elements, geometry};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, instrument};

/// Knobs controlling what the compiler writes into the artifact.
#[derive(Debug, Clone, Default)]
pub struct CompileSettings {
    /// Keep dihedral motions whose rotated atoms are all hydrogens on an
    /// oxygen axis (hydroxyl rotations). Off by default: they multiply the
    /// motion count for little energetic payoff.
    pub include_hydroxyl_h_rotations: bool,
    /// Keep all other purely-hydrogen dihedral rotations (e.g. methyl
    /// spins).
    pub include_other_h_rotations: bool,
}

/// Compiles a design space and its forcefields into a
/// [`CompiledConfSpace`].
///
/// The compiler is configured, then consumed by [`compile`](Self::compile),
/// which returns immediately with a [`CompileJob`] handle while a dedicated
/// worker thread runs the pipeline to completion.
pub struct ConfSpaceCompiler {
    space: DesignSpace,
    forcefields: Vec<Arc<dyn Forcefield>>,
    net_charges: NetCharges,
    settings: CompileSettings,
}

impl ConfSpaceCompiler {
    pub fn new(space: DesignSpace) -> Self {
        Self {
            space,
            forcefields: Vec::new(),
            net_charges: NetCharges::new(),
            settings: CompileSettings::default(),
        }
    }

    /// Adds a forcefield. Forcefields are iterated in insertion order
    /// everywhere, and that order is the artifact's forcefield order.
    pub fn add_forcefield(mut self, forcefield: Arc<dyn Forcefield>) -> Self {
        self.forcefields.push(forcefield);
        self
    }

    pub fn with_settings(mut self, settings: CompileSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn net_charges_mut(&mut self) -> &mut NetCharges {
        &mut self.net_charges
    }

    /// Starts the compile on a background worker and returns its handle.
    ///
    /// The worker always publishes exactly one report, even if a
    /// collaborator panics; there is no cancellation, only abandonment of
    /// the handle.
    pub fn compile(self) -> Arc<CompileJob> {
        let job = Arc::new(CompileJob::new());
        let worker_job = job.clone();

        let spawned = std::thread::Builder::new()
            .name("confspace-compile".to_string())
            .spawn(move || {
                let outcome =
                    std::panic::catch_unwind(AssertUnwindSafe(|| self.run(&worker_job)));
                let report = match outcome {
                    Ok(Ok(compiled)) => Report::succeeded(compiled, vec![]),
                    Ok(Err(error)) => Report::failed(error, vec![]),
                    Err(payload) => Report::failed(
                        CompileError::Internal(format!(
                            "compile worker panicked: {}",
                            panic_message(payload.as_ref())
                        )),
                        vec![],
                    ),
                };
                worker_job.publish(report);
            });

        if let Err(err) = spawned {
            job.publish(Report::failed(
                CompileError::Internal(format!("failed to spawn compile worker: {}", err)),
                vec![],
            ));
        }
        job
    }

    #[instrument(skip_all, name = "compile_confspace", fields(space = %self.space.name))]
    fn run(&self, job: &CompileJob) -> Result<CompiledConfSpace, CompileError> {
        // Stage 1: snapshot the molecules under their locks and build the
        // canonical index. Everything downstream works on the snapshots;
        // the design-space molecules themselves are never touched again.
        let snapshots: Vec<Molecule> = self
            .space
            .mols
            .iter()
            .map(|lock| lock.snapshot().0)
            .collect();
        let index = ConfSpaceIndex::new(&self.space);
        self.size_progress_tasks(job, &index, snapshots.len());
        info!(
            molecules = snapshots.len(),
            positions = index.num_positions(),
            conformations = index.total_confs(),
            forcefields = self.forcefields.len(),
            "Snapshotted design space and built conformation space index."
        );

        // Stage 2: parameterize wild types and fragment instances.
        info!("Parameterizing molecules under every forcefield.");
        let mut params = MolsParams::new();
        self.parameterize(job, &snapshots, &index, &mut params)?;

        // Stage 3: partition the fixed atoms.
        info!("Partitioning fixed atoms into static and position-dynamic sets.");
        let positions_in_order: Vec<_> = index.positions.iter().map(|p| p.pos.clone()).collect();
        let mut fixed = FixedAtoms::new(&snapshots, &positions_in_order);
        self.partition_fixed_atoms(job, &snapshots, &index, &params, &mut fixed)?;

        // Stage 4: terminally assign static indices, then compile the
        // static set and its baseline energies.
        fixed.update_static(&snapshots)?;
        let static_atoms = compile_static_atoms(&snapshots, &fixed)?;
        let static_energy = self.static_energies(job, &snapshots, &params, &fixed)?;
        info!(static_atoms = static_atoms.len(), "Compiled static atom set.");

        // Stage 5: compile every conformation's atoms, motions, and
        // internal energies.
        info!("Compiling conformations.");
        let positions = self.compile_conformations(&snapshots, &index, &params, &fixed)?;

        // Stage 6: compile the pairwise interaction terms.
        info!("Compiling atom pairs.");
        let atom_pairs = self.compile_atom_pairs(job, &snapshots, &index, &params, &fixed)?;

        // Stage 7: assemble.
        info!("Compile finished; assembling artifact.");
        Ok(CompiledConfSpace {
            name: self.space.name.clone(),
            forcefields: self
                .forcefields
                .iter()
                .map(|ff| ForcefieldInfo {
                    name: ff.name().to_string(),
                    implementation: ff.implementation().to_string(),
                    settings: ff.settings(),
                })
                .collect(),
            static_atoms,
            static_energy,
            positions,
            atom_pairs: atom_pairs.into_iter().map(AtomPairs::into_compiled).collect(),
        })
    }

    /// Sizes the four progress tasks from the index so callers can render
    /// proportionally accurate progress from the start.
    fn size_progress_tasks(&self, job: &CompileJob, index: &ConfSpaceIndex, num_mols: usize) {
        let num_ffs = self.forcefields.len() as u64;
        let total_frags: u64 = index.positions.iter().map(|p| p.frags.len() as u64).sum();

        // Atom-pair progress advances once per conformation (self + static
        // pairs) and once per cross-position conformation combination.
        let conf_counts = index.conf_counts();
        let mut pair_steps = index.total_confs() as u64;
        for pos1 in 0..conf_counts.len() {
            for pos2 in 0..pos1 {
                pair_steps += (conf_counts[pos1] * conf_counts[pos2]) as u64;
            }
        }

        job.progress
            .parameterize
            .set_total(num_ffs * (num_mols as u64 + total_frags));
        job.progress.partition_fixed_atoms.set_total(num_ffs * total_frags);
        job.progress.static_energy.set_total(num_ffs);
        job.progress.atom_pairs.set_total(num_ffs * pair_steps);
    }

    fn parameterize(
        &self,
        job: &CompileJob,
        snapshots: &[Molecule],
        index: &ConfSpaceIndex,
        params: &mut MolsParams,
    ) -> Result<(), CompileError> {
        for (ff_i, ff) in self.forcefields.iter().enumerate() {
            for (mol_i, mol) in snapshots.iter().enumerate() {
                let net_charge = mol
                    .needs_net_charge
                    .then(|| self.net_charges.for_mol(mol_i))
                    .flatten();
                let wild_type = ff.parameterize(mol, net_charge).map_err(|err| {
                    CompileError::Parameterize {
                        forcefield: ff.name().to_string(),
                        context: format!("molecule '{}'", mol.name),
                        message: err.to_string(),
                    }
                })?;
                params.put_wild_type(ff_i, mol_i, wild_type);
                job.progress.parameterize.increment();
            }

            for pos in &index.positions {
                let mol_i = pos.pos.mol_index;
                let base = &snapshots[mol_i];
                pos.each_frag::<CompileError>(base, |frag, placed_mol, placed| {
                    let net_charge = base
                        .needs_net_charge
                        .then(|| self.net_charges.for_frag(mol_i, pos.index, frag.index))
                        .flatten();
                    let frag_params =
                        ff.parameterize(placed_mol, net_charge).map_err(|err| {
                            CompileError::Parameterize {
                                forcefield: ff.name().to_string(),
                                context: format!(
                                    "molecule '{}', position '{}' fragment '{}'",
                                    base.name, pos.pos.name, frag.name
                                ),
                                message: err.to_string(),
                            }
                        })?;
                    params.put_frag(
                        ff_i,
                        pos.index,
                        frag.index,
                        FragParams {
                            params: frag_params,
                            mol: placed_mol.clone(),
                            placed: placed.to_vec(),
                        },
                    );
                    job.progress.parameterize.increment();
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    /// Runs the dynamic-ness algorithm: an atom is static only if no
    /// forcefield, under no fragment of any position, perturbs its
    /// parameters relative to the wild type.
    fn partition_fixed_atoms(
        &self,
        job: &CompileJob,
        snapshots: &[Molecule],
        index: &ConfSpaceIndex,
        params: &MolsParams,
        fixed: &mut FixedAtoms,
    ) -> Result<(), CompileError> {
        for (ff_i, ff) in self.forcefields.iter().enumerate() {
            for pos in &index.positions {
                let mol_i = pos.pos.mol_index;
                let wild_type = params.wild_type(ff_i, mol_i)?;
                let fixed_atoms: Vec<AtomId> = fixed.fixed(mol_i).to_vec();

                for frag in &pos.frags {
                    let frag_params = params.frag(ff_i, pos.index, frag.index)?;
                    let changed =
                        ff.changed_atoms(&fixed_atoms, frag_params.params.as_ref(), wild_type);
                    fixed
                        .add_dynamic(mol_i, pos.index, &pos.frag_label(frag.index), &changed)
                        .map_err(|conflict| CompileError::ClaimedAtom {
                            atom: snapshots[mol_i]
                                .display_name(conflict.atom)
                                .unwrap_or_else(|| format!("{}/?", snapshots[mol_i].name)),
                            first: conflict.first,
                            second: conflict.second,
                        })?;
                    job.progress.partition_fixed_atoms.increment();
                }
            }
        }
        Ok(())
    }

    /// Computes each forcefield's baseline energy over the static set.
    fn static_energies(
        &self,
        job: &CompileJob,
        snapshots: &[Molecule],
        params: &MolsParams,
        fixed: &FixedAtoms,
    ) -> Result<Vec<f64>, CompileError> {
        let mut static_by_mol: Vec<Vec<AtomId>> = vec![Vec::new(); snapshots.len()];
        for s in fixed.statics() {
            static_by_mol[s.mol_index].push(s.id);
        }

        let mut energies = Vec::with_capacity(self.forcefields.len());
        for (ff_i, ff) in self.forcefields.iter().enumerate() {
            let mut groups = Vec::new();
            for (mol_i, atoms) in static_by_mol.iter().enumerate() {
                groups.push(EnergyGroup {
                    mol: &snapshots[mol_i],
                    atoms,
                    params: params.wild_type(ff_i, mol_i)?,
                });
            }
            energies.push(ff.calc_energy(&groups));
            job.progress.static_energy.increment();
        }
        Ok(energies)
    }

    fn compile_conformations(
        &self,
        snapshots: &[Molecule],
        index: &ConfSpaceIndex,
        params: &MolsParams,
        fixed: &FixedAtoms,
    ) -> Result<Vec<CompiledPos>, CompileError> {
        let mut compiled = Vec::with_capacity(index.num_positions());
        for pos in &index.positions {
            let mol_i = pos.pos.mol_index;
            let dynamic: Vec<AtomId> = fixed.dynamic_atoms(pos.index).to_vec();
            let mut confs = Vec::with_capacity(pos.num_confs());

            pos.each_conf::<CompileError>(&snapshots[mol_i], |conf, mol, placed| {
                let fragment = &pos.pos.fragments[conf.frag_index];

                // Local atom order: the position's dynamic fixed atoms in
                // their claim order, then the fragment's atoms.
                let local_ids: Vec<AtomId> =
                    dynamic.iter().copied().chain(placed.iter().copied()).collect();
                let local = AtomIndex::new(local_ids.iter().copied());

                let mut atoms = Vec::with_capacity(local_ids.len());
                for &id in &local_ids {
                    let atom = mol.atom(id).ok_or_else(|| {
                        CompileError::Internal("conformation atom vanished".to_string())
                    })?;
                    if !atom.has_finite_position() {
                        return Err(CompileError::NonFiniteCoordinate {
                            atom: mol
                                .display_name(id)
                                .unwrap_or_else(|| atom.name.clone()),
                        });
                    }
                    atoms.push(CompiledAtom {
                        name: atom.name.clone(),
                        coords: [atom.position.x, atom.position.y, atom.position.z],
                    });
                }

                let motions =
                    self.compile_motions(pos, fragment, mol, placed, &local, fixed, mol_i)?;

                let mut internal_energies = Vec::with_capacity(self.forcefields.len());
                for (ff_i, ff) in self.forcefields.iter().enumerate() {
                    let frag_params = params.frag(ff_i, pos.index, conf.frag_index)?;
                    let energy: f64 = local_ids
                        .iter()
                        .filter_map(|&id| ff.internal_energy(frag_params.params.as_ref(), id))
                        .sum();
                    internal_energies.push(energy);
                }

                confs.push(CompiledConf {
                    frag: fragment.name.clone(),
                    name: conf.name.clone(),
                    atoms,
                    motions,
                    internal_energies,
                });
                Ok(())
            })?;

            compiled.push(CompiledPos {
                name: pos.pos.name.clone(),
                confs,
            });
        }
        Ok(compiled)
    }

    /// Compiles the fragment's continuous motions for one placed
    /// conformation, filtering purely-hydrogen rotations per the settings.
    #[allow(clippy::too_many_arguments)]
    fn compile_motions(
        &self,
        pos: &PosInfo,
        fragment: &Fragment,
        mol: &Molecule,
        placed: &[AtomId],
        local: &AtomIndex,
        fixed: &FixedAtoms,
        mol_i: usize,
    ) -> Result<Vec<CompiledMotion>, CompileError> {
        let mut motions = Vec::new();
        for motion in &fragment.motions {
            let MotionTemplate::Dihedral {
                a,
                b,
                c,
                d,
                rotated,
                radius_degrees,
            } = motion;

            let axis_end = pos.pos.resolve_motion_atom(placed, *c);
            let all_hydrogen = rotated
                .iter()
                .all(|&i| elements::is_hydrogen(&fragment.atoms[i].element));
            if all_hydrogen {
                let hydroxyl = mol
                    .atom(axis_end)
                    .is_some_and(|atom| elements::is_oxygen(&atom.element));
                let include = if hydroxyl {
                    self.settings.include_hydroxyl_h_rotations
                } else {
                    self.settings.include_other_h_rotations
                };
                if !include {
                    continue;
                }
            }

            let ids = [*a, *b, *c, *d].map(|m| pos.pos.resolve_motion_atom(placed, m));
            let mut abcd = [0i32; 4];
            let mut points = Vec::with_capacity(4);
            for (slot, id) in abcd.iter_mut().zip(ids) {
                let encoded = fixed.get_or_static(mol_i, id, local).ok_or_else(|| {
                    CompileError::Internal(
                        "dihedral atom is neither conformation-local nor static".to_string(),
                    )
                })?;
                *slot = encoded.encode();
                let atom = mol.atom(id).ok_or_else(|| {
                    CompileError::Internal("dihedral atom vanished".to_string())
                })?;
                points.push(atom.position);
            }

            let initial =
                geometry::measure_dihedral(&points[0], &points[1], &points[2], &points[3]);
            let rotated_local = rotated
                .iter()
                .map(|&i| {
                    local.index_of(placed[i]).map(|i| i as u32).ok_or_else(|| {
                        CompileError::Internal("rotated atom is not conformation-local".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            motions.push(CompiledMotion::Dihedral {
                bounds: [initial - radius_degrees, initial + radius_degrees],
                abcd,
                rotated: rotated_local,
            });
        }
        Ok(motions)
    }

    fn compile_atom_pairs(
        &self,
        job: &CompileJob,
        snapshots: &[Molecule],
        index: &ConfSpaceIndex,
        params: &MolsParams,
        fixed: &FixedAtoms,
    ) -> Result<Vec<AtomPairs>, CompileError> {
        let conf_counts = index.conf_counts();
        let mut compiled = Vec::with_capacity(self.forcefields.len());

        for (ff_i, ff) in self.forcefields.iter().enumerate() {
            let mut pairs = AtomPairs::new(&conf_counts);

            for pos1 in &index.positions {
                let mol1 = pos1.pos.mol_index;
                let dyn1: Vec<AtomId> = fixed.dynamic_atoms(pos1.index).to_vec();

                for conf1 in &pos1.confs {
                    let fragment1 = &pos1.pos.fragments[conf1.frag_index];
                    let template1 = &fragment1.confs[conf1.conf_in_frag];
                    let mut mol = snapshots[mol1].clone();
                    let placed1 = pos1.pos.place_conformation(&mut mol, fragment1, template1)?;
                    let fp1 = params.frag(ff_i, pos1.index, conf1.frag_index)?;
                    let local1: Vec<AtomId> =
                        dyn1.iter().copied().chain(placed1.iter().copied()).collect();

                    // Self-pairs within the conformation's local atoms.
                    for i1 in 0..local1.len() {
                        for i2 in 0..i1 {
                            let dist = mol.bonded_distance(local1[i1], local1[i2]);
                            if let Some(tuple) = ff.pair_params(
                                fp1.params.as_ref(),
                                local1[i1],
                                fp1.params.as_ref(),
                                local1[i2],
                                dist,
                            ) {
                                pairs.add_single(
                                    pos1.index,
                                    conf1.index,
                                    i1 as u32,
                                    i2 as u32,
                                    tuple,
                                );
                            }
                        }
                    }

                    // Pairs against the static set. Static atoms always use
                    // their molecule's wild-type parameterization.
                    for (s_index, s) in fixed.statics().iter().enumerate() {
                        let wild_type = params.wild_type(ff_i, s.mol_index)?;
                        for (i1, &id1) in local1.iter().enumerate() {
                            let dist = if s.mol_index == mol1 {
                                mol.bonded_distance(id1, s.id)
                            } else {
                                None
                            };
                            if let Some(tuple) =
                                ff.pair_params(fp1.params.as_ref(), id1, wild_type, s.id, dist)
                            {
                                pairs.add_static(
                                    pos1.index,
                                    conf1.index,
                                    i1 as u32,
                                    s_index as u32,
                                    tuple,
                                );
                            }
                        }
                    }
                    job.progress.atom_pairs.increment();

                    // Pairs against every conformation of every
                    // lower-indexed position.
                    for pos2 in &index.positions[..pos1.index] {
                        let mol2 = pos2.pos.mol_index;
                        let dyn2: Vec<AtomId> = fixed.dynamic_atoms(pos2.index).to_vec();

                        for conf2 in &pos2.confs {
                            let fp2 = params.frag(ff_i, pos2.index, conf2.frag_index)?;
                            let local2: Vec<AtomId> = dyn2
                                .iter()
                                .copied()
                                .chain(fp2.placed.iter().copied())
                                .collect();

                            // Bonded distances between two same-molecule
                            // positions need both conformations placed on
                            // one molecule; cross-molecule distances are
                            // always absent.
                            let joint = if mol2 == mol1 {
                                let fragment2 = &pos2.pos.fragments[conf2.frag_index];
                                let template2 = &fragment2.confs[conf2.conf_in_frag];
                                let mut joint_mol = mol.clone();
                                let placed2 = pos2.pos.place_conformation(
                                    &mut joint_mol,
                                    fragment2,
                                    template2,
                                )?;
                                Some((joint_mol, placed2))
                            } else {
                                None
                            };

                            for (i1, &id1) in local1.iter().enumerate() {
                                for (i2, &id2) in local2.iter().enumerate() {
                                    let dist = joint.as_ref().and_then(|(jm, placed2)| {
                                        let id2_joint = if i2 < dyn2.len() {
                                            id2
                                        } else {
                                            placed2[i2 - dyn2.len()]
                                        };
                                        jm.bonded_distance(id1, id2_joint)
                                    });
                                    if let Some(tuple) = ff.pair_params(
                                        fp1.params.as_ref(),
                                        id1,
                                        fp2.params.as_ref(),
                                        id2,
                                        dist,
                                    ) {
                                        pairs.add_pair(
                                            pos1.index,
                                            conf1.index,
                                            pos2.index,
                                            conf2.index,
                                            i1 as u32,
                                            i2 as u32,
                                            tuple,
                                        )?;
                                    }
                                }
                            }
                            job.progress.atom_pairs.increment();
                        }
                    }
                }
            }
            compiled.push(pairs);
        }
        Ok(compiled)
    }
}

fn compile_static_atoms(
    snapshots: &[Molecule],
    fixed: &FixedAtoms,
) -> Result<Vec<CompiledAtom>, CompileError> {
    fixed
        .statics()
        .iter()
        .map(|s| {
            let atom = snapshots[s.mol_index].atom(s.id).ok_or_else(|| {
                CompileError::Internal("static atom vanished from snapshot".to_string())
            })?;
            if !atom.has_finite_position() {
                return Err(CompileError::NonFiniteCoordinate {
                    atom: s.name.clone(),
                });
            }
            Ok(CompiledAtom {
                name: s.name.clone(),
                coords: [atom.position.x, atom.position.y, atom.position.z],
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::progress::CompileState;
    use crate::core::compiled::PairAtom;
    use crate::core::design::fragment::{Conformation, FragmentAtom, MotionAtom};
    use crate::core::design::position::{AnchorGroup, DesignPosition};
    use crate::core::forcefield::{ForcefieldError, MolParams};
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;
    use std::collections::HashMap;
    use std::hash::{DefaultHasher, Hash, Hasher};

    /// Topology fingerprints per atom: element plus sorted neighbor
    /// elements. Conformation swaps perturb exactly the atoms whose bonded
    /// environment changes.
    #[derive(Debug)]
    struct StubMolParams {
        fingerprints: HashMap<crate::core::models::ids::AtomId, u64>,
    }

    impl MolParams for StubMolParams {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[derive(Debug)]
    struct StubForcefield {
        /// Parameterization fails for molecules whose name contains this.
        poison: Option<String>,
    }

    impl StubForcefield {
        fn new() -> Self {
            Self { poison: None }
        }

        fn fingerprints(mol: &Molecule) -> HashMap<crate::core::models::ids::AtomId, u64> {
            mol.atoms_ordered()
                .map(|(id, atom)| {
                    let mut neighbors: Vec<&str> = mol
                        .bonded_neighbors(id)
                        .unwrap_or(&[])
                        .iter()
                        .filter_map(|&n| mol.atom(n).map(|a| a.element.as_str()))
                        .collect();
                    neighbors.sort_unstable();
                    let mut hasher = DefaultHasher::new();
                    atom.element.hash(&mut hasher);
                    neighbors.hash(&mut hasher);
                    (id, hasher.finish())
                })
                .collect()
        }

        fn params_of(params: &dyn MolParams) -> &StubMolParams {
            params.as_any().downcast_ref::<StubMolParams>().unwrap()
        }
    }

    impl Forcefield for StubForcefield {
        fn name(&self) -> &str {
            "stub"
        }

        fn implementation(&self) -> &str {
            "stub-v1"
        }

        fn parameterize(
            &self,
            mol: &Molecule,
            _net_charge: Option<i32>,
        ) -> Result<Box<dyn MolParams>, ForcefieldError> {
            if let Some(poison) = &self.poison {
                if mol.name.contains(poison.as_str()) {
                    return Err(ForcefieldError::new("refusing poisoned molecule"));
                }
            }
            Ok(Box::new(StubMolParams {
                fingerprints: Self::fingerprints(mol),
            }))
        }

        fn internal_energy(
            &self,
            params: &dyn MolParams,
            atom: crate::core::models::ids::AtomId,
        ) -> Option<f64> {
            Self::params_of(params).fingerprints.contains_key(&atom).then_some(1.0)
        }

        fn pair_params(
            &self,
            params_a: &dyn MolParams,
            atom_a: crate::core::models::ids::AtomId,
            params_b: &dyn MolParams,
            atom_b: crate::core::models::ids::AtomId,
            bonded_distance: Option<u32>,
        ) -> Option<Vec<f64>> {
            // 1-2 pairs are excluded, everything else interacts.
            if matches!(bonded_distance, Some(d) if d <= 1) {
                return None;
            }
            let fa = Self::params_of(params_a).fingerprints.get(&atom_a)?;
            let fb = Self::params_of(params_b).fingerprints.get(&atom_b)?;
            Some(vec![(fa % 1024) as f64, (fb % 1024) as f64])
        }

        fn calc_energy(&self, groups: &[EnergyGroup<'_>]) -> f64 {
            groups
                .iter()
                .map(|g| {
                    g.atoms
                        .iter()
                        .filter_map(|&id| self.internal_energy(g.params, id))
                        .sum::<f64>()
                })
                .sum()
        }

        fn changed_atoms(
            &self,
            fixed_atoms: &[crate::core::models::ids::AtomId],
            conf_params: &dyn MolParams,
            wild_type_params: &dyn MolParams,
        ) -> Vec<crate::core::models::ids::AtomId> {
            let conf = Self::params_of(conf_params);
            let wild = Self::params_of(wild_type_params);
            fixed_atoms
                .iter()
                .copied()
                .filter(|id| conf.fingerprints.get(id) != wild.fingerprints.get(id))
                .collect()
        }
    }

    /// N-CA-C backbone with one CB side atom bonded to CA.
    fn create_backbone(name: &str) -> (Molecule, Vec<crate::core::models::ids::AtomId>, crate::core::models::ids::AtomId)
    {
        let mut mol = Molecule::new(name);
        let n = mol.add_atom(Atom::new("N", "N", Point3::new(0.0, 1.4, 0.0)));
        let ca = mol.add_atom(Atom::new("CA", "C", Point3::new(0.0, 0.0, 0.0)));
        let c = mol.add_atom(Atom::new("C", "C", Point3::new(1.4, 0.0, 0.0)));
        let cb = mol.add_atom(Atom::new("CB", "C", Point3::new(0.0, -0.7, 1.2)));
        mol.add_bond(n, ca).unwrap();
        mol.add_bond(ca, c).unwrap();
        mol.add_bond(ca, cb).unwrap();
        (mol, vec![n, ca, c], cb)
    }

    /// One-atom fragment wired to CA, geometrically identical to the
    /// backbone's own CB when `element` is "C".
    fn create_cb_fragment(name: &str, element: &str, num_confs: usize) -> Fragment {
        Fragment {
            name: name.to_string(),
            atoms: vec![FragmentAtom {
                name: "CB".to_string(),
                element: element.to_string(),
                position: Point3::new(0.0, -0.7, 1.2),
            }],
            bonds: vec![],
            anchor_coords: vec![vec![
                Point3::new(0.0, 1.4, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.4, 0.0, 0.0),
            ]],
            anchor_bonds: vec![((0, 1), 0)],
            confs: (0..num_confs)
                .map(|i| Conformation {
                    name: format!("c{}", i),
                    coords: vec![Point3::new(0.0, -0.7, 1.2 + 0.1 * i as f64)],
                })
                .collect(),
            motions: vec![],
        }
    }

    fn create_position(
        name: &str,
        mol_index: usize,
        anchors: Vec<crate::core::models::ids::AtomId>,
        current: Vec<crate::core::models::ids::AtomId>,
        fragments: Vec<Fragment>,
    ) -> DesignPosition {
        DesignPosition {
            name: name.to_string(),
            mol_index,
            current_atoms: current,
            anchor_groups: vec![AnchorGroup { atoms: anchors }],
            fragments,
        }
    }

    fn compile_space(space: DesignSpace) -> Report {
        ConfSpaceCompiler::new(space)
            .add_forcefield(Arc::new(StubForcefield::new()))
            .compile()
            .wait_for_finish()
    }

    #[test]
    fn empty_design_space_compiles_everything_static() {
        let (mol, _, _) = create_backbone("m");
        let space = DesignSpace::new("empty", vec![mol], vec![]);

        let report = compile_space(space);
        assert!(report.is_success());
        let compiled = report.compiled.unwrap();

        assert!(compiled.positions.is_empty());
        assert_eq!(compiled.static_atoms.len(), 4, "All atoms are static");
        // The stub's energy is 1.0 per atom.
        assert_eq!(compiled.static_energy, vec![4.0]);
        assert_eq!(compiled.forcefields.len(), 1);
        assert_eq!(compiled.forcefields[0].name, "stub");
    }

    #[test]
    fn unperturbing_conformation_has_no_dynamic_atoms() {
        let (mol, anchors, cb) = create_backbone("m");
        let position = create_position(
            "A1",
            0,
            anchors,
            vec![cb],
            vec![create_cb_fragment("FRG", "C", 1)],
        );
        let space = DesignSpace::new("s", vec![mol], vec![position]);

        let report = compile_space(space);
        assert!(report.is_success(), "error: {:?}", report.error);
        let compiled = report.compiled.unwrap();

        assert_eq!(compiled.static_atoms.len(), 3, "N, CA, C stay static");
        let conf = &compiled.positions[0].confs[0];
        // Local atoms are exactly the fragment's own atom.
        assert_eq!(conf.atoms.len(), 1);
        assert_eq!(conf.atoms[0].name, "CB");
        assert_eq!(conf.internal_energies, vec![1.0]);
    }

    #[test]
    fn perturbing_fragment_claims_the_anchor_atom_dynamic() {
        let (mol, anchors, cb) = create_backbone("m");
        // A sulfur CB changes CA's bonded-environment fingerprint.
        let position = create_position(
            "A1",
            0,
            anchors,
            vec![cb],
            vec![create_cb_fragment("SUL", "S", 1)],
        );
        let space = DesignSpace::new("s", vec![mol], vec![position]);

        let report = compile_space(space);
        assert!(report.is_success(), "error: {:?}", report.error);
        let compiled = report.compiled.unwrap();

        assert_eq!(compiled.static_atoms.len(), 2, "CA went dynamic");
        let conf = &compiled.positions[0].confs[0];
        assert_eq!(conf.atoms.len(), 2, "Dynamic CA precedes the fragment atom");
        assert_eq!(conf.atoms[0].name, "CA");
        assert_eq!(conf.atoms[1].name, "CB");
    }

    #[test]
    fn conflicting_claims_fail_the_compile() {
        let (mut mol, anchors, cb1) = create_backbone("m");
        let ca = anchors[1];
        let cb2 = mol.add_atom(Atom::new("CB2", "C", Point3::new(-0.9, -0.7, -0.8)));
        mol.add_bond(ca, cb2).unwrap();

        // Both positions hang a sulfur off CA, so both perturb it.
        let p1 = create_position(
            "A1",
            0,
            anchors.clone(),
            vec![cb1],
            vec![create_cb_fragment("SUL", "S", 1)],
        );
        let p2 = create_position(
            "A2",
            0,
            anchors,
            vec![cb2],
            vec![create_cb_fragment("SUL", "S", 1)],
        );
        let space = DesignSpace::new("s", vec![mol], vec![p1, p2]);

        let report = compile_space(space);
        assert!(!report.is_success());
        assert!(report.compiled.is_none());
        match report.error.unwrap() {
            CompileError::ClaimedAtom { atom, first, second } => {
                assert_eq!(atom, "m/CA");
                assert_eq!(first, "A1:SUL");
                assert_eq!(second, "A2:SUL");
            }
            other => panic!("expected ClaimedAtom, got {:?}", other),
        }
    }

    #[test]
    fn two_positions_share_one_canonical_pair_bucket() {
        let (mol0, anchors0, cb0) = create_backbone("m0");
        let (mol1, anchors1, cb1) = create_backbone("m1");
        let p0 = create_position(
            "P0",
            0,
            anchors0,
            vec![cb0],
            vec![create_cb_fragment("F", "C", 1)],
        );
        let p1 = create_position(
            "P1",
            1,
            anchors1,
            vec![cb1],
            vec![create_cb_fragment("F", "C", 1)],
        );
        let space = DesignSpace::new("s", vec![mol0, mol1], vec![p0, p1]);

        let report = compile_space(space);
        assert!(report.is_success(), "error: {:?}", report.error);
        let compiled = report.compiled.unwrap();
        let pairs = &compiled.atom_pairs[0];

        // Exactly one (pos1=1, pos2=0) bucket; same-position interactions
        // live in singles, which are empty for one-atom conformations.
        assert_eq!(pairs.pairs.len(), 1);
        assert_eq!(pairs.pairs[0].len(), 1);
        assert_eq!(pairs.pairs[0][0].len(), 1);
        assert_eq!(pairs.pairs[0][0][0].len(), 1, "CB-CB interacts across molecules");
        assert!(pairs.singles[0][0].is_empty());
        assert!(pairs.singles[1][0].is_empty());

        // Each CB sees its own molecule's N and C (distance 2, CA is
        // bonded and excluded) plus the other molecule's three statics.
        assert_eq!(pairs.statics[0][0].len(), 5);
        assert_eq!(pairs.statics[1][0].len(), 5);
        for pair in &pairs.statics[0][0] {
            assert!(matches!(PairAtom::decode(pair.i2), PairAtom::Static(_)));
        }
    }

    #[test]
    fn parameterization_failure_aborts_with_context() {
        let (mol, _, _) = create_backbone("poisoned");
        let space = DesignSpace::new("s", vec![mol], vec![]);

        let job = ConfSpaceCompiler::new(space)
            .add_forcefield(Arc::new(StubForcefield {
                poison: Some("poisoned".to_string()),
            }))
            .compile();
        let report = job.wait_for_finish();

        assert_eq!(job.state(), CompileState::Failed);
        match report.error.unwrap() {
            CompileError::Parameterize { forcefield, context, .. } => {
                assert_eq!(forcefield, "stub");
                assert!(context.contains("poisoned"));
            }
            other => panic!("expected Parameterize, got {:?}", other),
        }
    }

    #[test]
    fn non_finite_coordinate_is_reported() {
        let (mut mol, _, _) = create_backbone("m");
        mol.add_atom(Atom::new("X", "C", Point3::new(f64::NAN, 0.0, 0.0)));
        let space = DesignSpace::new("s", vec![mol], vec![]);

        let report = compile_space(space);
        match report.error.unwrap() {
            CompileError::NonFiniteCoordinate { atom } => assert_eq!(atom, "m/X"),
            other => panic!("expected NonFiniteCoordinate, got {:?}", other),
        }
    }

    #[test]
    fn progress_tasks_complete_on_success() {
        let (mol, anchors, cb) = create_backbone("m");
        let position = create_position(
            "A1",
            0,
            anchors,
            vec![cb],
            vec![create_cb_fragment("F", "C", 2)],
        );
        let space = DesignSpace::new("s", vec![mol], vec![position]);

        let job = ConfSpaceCompiler::new(space)
            .add_forcefield(Arc::new(StubForcefield::new()))
            .compile();
        let report = job.wait_for_finish();

        assert!(report.is_success());
        assert_eq!(job.state(), CompileState::Succeeded);
        for task in [
            &job.progress.parameterize,
            &job.progress.partition_fixed_atoms,
            &job.progress.static_energy,
            &job.progress.atom_pairs,
        ] {
            assert_eq!(task.done(), task.total(), "Task sized {} finished", task.total());
            assert_eq!(task.fraction(), 1.0);
        }
    }

    #[test]
    fn compiling_twice_yields_identical_artifacts() {
        let build = || {
            let (mol, anchors, cb) = create_backbone("m");
            let position = create_position(
                "A1",
                0,
                anchors,
                vec![cb],
                vec![
                    create_cb_fragment("F1", "C", 2),
                    create_cb_fragment("F2", "S", 1),
                ],
            );
            DesignSpace::new("s", vec![mol], vec![position])
        };

        let a = compile_space(build()).compiled.unwrap();
        let b = compile_space(build()).compiled.unwrap();
        assert_eq!(a, b);
    }

    mod motions {
        use super::*;

        /// CB-OG-HG hydroxyl arm with a dihedral spinning HG about CB-OG.
        fn create_hydroxyl_fragment(rotate_only_hydrogen: bool) -> Fragment {
            let mut fragment = Fragment {
                name: "SER".to_string(),
                atoms: vec![
                    FragmentAtom {
                        name: "CB".to_string(),
                        element: "C".to_string(),
                        position: Point3::new(0.0, -0.7, 1.2),
                    },
                    FragmentAtom {
                        name: "OG".to_string(),
                        element: "O".to_string(),
                        position: Point3::new(0.0, -1.5, 2.3),
                    },
                    FragmentAtom {
                        name: "HG".to_string(),
                        element: "H".to_string(),
                        position: Point3::new(0.9, -1.6, 2.7),
                    },
                ],
                bonds: vec![(0, 1), (1, 2)],
                anchor_coords: vec![vec![
                    Point3::new(0.0, 1.4, 0.0),
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.4, 0.0, 0.0),
                ]],
                anchor_bonds: vec![((0, 1), 0)],
                confs: vec![Conformation {
                    name: "c0".to_string(),
                    coords: vec![
                        Point3::new(0.0, -0.7, 1.2),
                        Point3::new(0.0, -1.5, 2.3),
                        Point3::new(0.9, -1.6, 2.7),
                    ],
                }],
                motions: vec![],
            };
            let rotated = if rotate_only_hydrogen { vec![2] } else { vec![1, 2] };
            fragment.motions.push(MotionTemplate::Dihedral {
                a: MotionAtom::Anchor { group: 0, index: 1 },
                b: MotionAtom::Fragment(0),
                c: MotionAtom::Fragment(1),
                d: MotionAtom::Fragment(2),
                rotated,
                radius_degrees: 30.0,
            });
            fragment
        }

        fn compile_with_settings(
            rotate_only_hydrogen: bool,
            settings: CompileSettings,
        ) -> CompiledConfSpace {
            let (mol, anchors, cb) = create_backbone("m");
            let position = create_position(
                "A1",
                0,
                anchors,
                vec![cb],
                vec![create_hydroxyl_fragment(rotate_only_hydrogen)],
            );
            let space = DesignSpace::new("s", vec![mol], vec![position]);
            let report = ConfSpaceCompiler::new(space)
                .add_forcefield(Arc::new(StubForcefield::new()))
                .with_settings(settings)
                .compile()
                .wait_for_finish();
            assert!(report.is_success(), "error: {:?}", report.error);
            report.compiled.unwrap()
        }

        #[test]
        fn hydroxyl_hydrogen_rotations_are_filtered_by_default() {
            let compiled = compile_with_settings(true, CompileSettings::default());
            assert!(compiled.positions[0].confs[0].motions.is_empty());
        }

        #[test]
        fn hydroxyl_hydrogen_rotations_compile_when_enabled() {
            let compiled = compile_with_settings(
                true,
                CompileSettings {
                    include_hydroxyl_h_rotations: true,
                    ..CompileSettings::default()
                },
            );
            let motions = &compiled.positions[0].confs[0].motions;
            assert_eq!(motions.len(), 1);
            let CompiledMotion::Dihedral { bounds, abcd, rotated } = &motions[0];
            assert!((bounds[1] - bounds[0] - 60.0).abs() < 1e-9);
            assert_eq!(rotated.len(), 1);
            // CA is static; the three fragment atoms are local.
            assert!(abcd[0] < 0, "CA resolves to a static index");
            assert!(abcd[1] >= 0 && abcd[2] >= 0 && abcd[3] >= 0);
        }

        #[test]
        fn heavy_atom_rotations_always_compile() {
            let compiled = compile_with_settings(false, CompileSettings::default());
            let motions = &compiled.positions[0].confs[0].motions;
            assert_eq!(motions.len(), 1);
            let CompiledMotion::Dihedral { bounds, .. } = &motions[0];
            let width = bounds[1] - bounds[0];
            assert!((width - 60.0).abs() < 1e-9);
        }
    }
}
