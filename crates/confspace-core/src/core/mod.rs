//! # Core Module
//!
//! This module provides the fundamental building blocks for conformation
//! space compilation: molecular data models, design-space descriptions,
//! the abstract forcefield contract, and the compiled-artifact data model.
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules that handle different
//! aspects of the domain:
//!
//! - **Molecular Representation** ([`models`]) - Atoms, molecules, bond
//!   graphs, and the per-molecule mutation lock.
//! - **Design Spaces** ([`design`]) - Design positions, fragment templates,
//!   conformations, and continuous motions.
//! - **Forcefield Contract** ([`forcefield`]) - The abstract parameterizer
//!   interface the compiler consumes; concrete forcefields live outside
//!   this crate.
//! - **Compiled Artifacts** ([`compiled`]) - The durable output data model
//!   and its structured-document serialization.
//! - **Utilities** ([`utils`]) - Geometry (superposition, dihedral angles)
//!   and element classification tables.

pub mod compiled;
pub mod design;
pub mod forcefield;
pub mod models;
pub mod utils;
