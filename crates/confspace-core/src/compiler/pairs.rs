use crate::core::compiled::{AtomPair, CompiledAtomPairs, PairAtom};
use std::collections::HashMap;
use thiserror::Error;

/// A position pair addressed out of canonical order.
///
/// Callers must canonicalize to `pos2 < pos1` themselves; the storage never
/// swaps silently. Reaching this error is a pipeline-ordering defect, not a
/// user-facing condition.
#[derive(Debug, Error)]
#[error("Position pair ({pos1}, {pos2}) is not in canonical order (requires pos2 < pos1)")]
pub struct PairOrderError {
    pub pos1: usize,
    pub pos2: usize,
}

/// Canonical linearization of an ordered position pair.
///
/// Over all `0 <= pos2 < pos1 < n`, the image is exactly
/// `{0, .., n*(n-1)/2 - 1}`.
pub fn linear_index(pos1: usize, pos2: usize) -> Result<usize, PairOrderError> {
    if pos2 >= pos1 {
        return Err(PairOrderError { pos1, pos2 });
    }
    Ok(pos1 * (pos1 - 1) / 2 + pos2)
}

/// An append-only table of parameter-value tuples with value deduplication.
///
/// `index` returns the existing index when an equal-valued tuple was seen
/// before, so identical interactions across conformations collapse to one
/// table entry. One cache exists per forcefield.
#[derive(Debug, Default)]
pub struct ParamsCache {
    tuples: Vec<Vec<f64>>,
    // Value lookup keys on the exact bit patterns; tuples that compare
    // equal as f64 but differ in bits (e.g. -0.0 vs 0.0) get separate
    // entries, which only costs a duplicate row.
    lookup: HashMap<Vec<u64>, usize>,
}

impl ParamsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of a tuple, appending it if it was never seen.
    pub fn index(&mut self, tuple: Vec<f64>) -> usize {
        let key: Vec<u64> = tuple.iter().map(|v| v.to_bits()).collect();
        match self.lookup.entry(key) {
            std::collections::hash_map::Entry::Occupied(entry) => *entry.get(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let index = self.tuples.len();
                self.tuples.push(tuple);
                entry.insert(index);
                index
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&[f64]> {
        self.tuples.get(index).map(|t| t.as_slice())
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

/// Sparse, index-addressed storage of one forcefield's compiled pairwise
/// interaction terms.
///
/// Three index spaces, each fully pre-sized at construction so no bucket is
/// created or resized mid-compile:
///
/// - `singles[pos][conf]`: pairs within one conformation's local atoms.
/// - `statics[pos][conf]`: pairs between local atoms and the static set.
/// - `pairs[linear(pos1,pos2)][conf1][conf2]` with `pos2 < pos1`.
#[derive(Debug)]
pub struct AtomPairs {
    cache: ParamsCache,
    singles: Vec<Vec<Vec<AtomPair>>>,
    statics: Vec<Vec<Vec<AtomPair>>>,
    pairs: Vec<Vec<Vec<Vec<AtomPair>>>>,
}

impl AtomPairs {
    /// Pre-sizes all buckets from the per-position conformation counts, in
    /// position-index order.
    pub fn new(conf_counts: &[usize]) -> Self {
        let per_conf =
            |pos: usize| -> Vec<Vec<AtomPair>> { vec![Vec::new(); conf_counts[pos]] };

        let singles = (0..conf_counts.len()).map(per_conf).collect();
        let statics = (0..conf_counts.len()).map(per_conf).collect();

        let mut pairs = Vec::with_capacity(conf_counts.len() * conf_counts.len().saturating_sub(1) / 2);
        for pos1 in 0..conf_counts.len() {
            for pos2 in 0..pos1 {
                pairs.push(vec![vec![Vec::new(); conf_counts[pos2]]; conf_counts[pos1]]);
            }
        }

        Self {
            cache: ParamsCache::new(),
            singles,
            statics,
            pairs,
        }
    }

    /// Appends a pair between two atoms local to one conformation.
    pub fn add_single(&mut self, pos: usize, conf: usize, i1: u32, i2: u32, tuple: Vec<f64>) {
        let params = self.cache.index(tuple) as u32;
        self.singles[pos][conf].push(AtomPair {
            i1,
            i2: PairAtom::Local(i2).encode(),
            params,
        });
    }

    /// Appends a pair between a conformation-local atom and a static atom.
    pub fn add_static(
        &mut self,
        pos: usize,
        conf: usize,
        i1: u32,
        static_index: u32,
        tuple: Vec<f64>,
    ) {
        let params = self.cache.index(tuple) as u32;
        self.statics[pos][conf].push(AtomPair {
            i1,
            i2: PairAtom::Static(static_index).encode(),
            params,
        });
    }

    /// Appends a pair between conformations of two different positions.
    ///
    /// `i1` is local to `(pos1, conf1)`, `i2` local to `(pos2, conf2)`.
    ///
    /// # Errors
    ///
    /// Returns [`PairOrderError`] if `pos2 >= pos1`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_pair(
        &mut self,
        pos1: usize,
        conf1: usize,
        pos2: usize,
        conf2: usize,
        i1: u32,
        i2: u32,
        tuple: Vec<f64>,
    ) -> Result<(), PairOrderError> {
        let linear = linear_index(pos1, pos2)?;
        let params = self.cache.index(tuple) as u32;
        self.pairs[linear][conf1][conf2].push(AtomPair {
            i1,
            i2: PairAtom::Local(i2).encode(),
            params,
        });
        Ok(())
    }

    pub fn singles(&self, pos: usize, conf: usize) -> &[AtomPair] {
        &self.singles[pos][conf]
    }

    pub fn statics(&self, pos: usize, conf: usize) -> &[AtomPair] {
        &self.statics[pos][conf]
    }

    pub fn pairs(
        &self,
        pos1: usize,
        conf1: usize,
        pos2: usize,
        conf2: usize,
    ) -> Result<&[AtomPair], PairOrderError> {
        Ok(&self.pairs[linear_index(pos1, pos2)?][conf1][conf2])
    }

    pub fn cache(&self) -> &ParamsCache {
        &self.cache
    }

    /// Flattens into the artifact representation.
    pub fn into_compiled(self) -> CompiledAtomPairs {
        CompiledAtomPairs {
            params: self.cache.tuples,
            singles: self.singles,
            statics: self.statics,
            pairs: self.pairs,
        }
    }
}
