//! # Confspace Core Library
//!
//! A library for compiling molecular *design spaces* into flattened,
//! self-contained conformation space artifacts. A design space consists of
//! molecules, design positions on them, and the discrete and continuous
//! conformational alternatives allowed at each position; the compiled
//! artifact can be consumed by a downstream energy evaluator with no
//! knowledge of chemistry, topology, or forcefields.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict two-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models
//!   (`Molecule`, `DesignSpace`, fragments and their conformations), the
//!   abstract forcefield parameterizer contract, geometry utilities, and the
//!   [`core::compiled`] output data model with its document serialization.
//!
//! - **[`compiler`]: The Logic Core.** This stateful layer orchestrates one
//!   compile invocation: it indexes the design space, partitions fixed atoms
//!   into static and position-owned dynamic sets, caches parameterizations,
//!   deduplicates pairwise interaction parameters, and runs the whole
//!   pipeline on a background worker with pollable progress.

pub mod compiler;
pub mod core;
