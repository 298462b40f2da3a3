//! # Compiler Module
//!
//! This module implements the conformation space compiler: the stateful
//! engine that flattens a design space and its forcefields into a
//! [`crate::core::compiled::CompiledConfSpace`].
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules, each owning one
//! compile-scoped data structure or pipeline concern:
//!
//! - **Indexing** ([`index`], [`atom_index`]) - The canonical ordering of
//!   positions, fragments, and conformations, plus atom↔index lookups.
//! - **Fixed-Atom Partitioning** ([`fixed_atoms`]) - The ledger deciding,
//!   for every non-design atom, whether it is static or owned by exactly
//!   one design position.
//! - **Caches** ([`mols_params`], [`net_charges`], [`pairs`]) -
//!   Parameterization results, net-charge hints, and value-deduplicated
//!   pairwise parameter storage.
//! - **Orchestration** ([`compile`], [`progress`], [`error`]) - The
//!   seven-stage pipeline on its background worker, pollable progress, and
//!   the compile error taxonomy.
//!
//! All of these live for exactly one compile invocation; only the compiled
//! artifact survives.

pub mod atom_index;
pub mod compile;
pub mod error;
pub mod fixed_atoms;
pub mod index;
pub mod mols_params;
pub mod net_charges;
pub mod pairs;
pub mod progress;
