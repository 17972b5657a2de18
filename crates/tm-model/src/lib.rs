//! # tm-model
//!
//! Data-flow diagram model for threat-modeling agent architectures.
//!
//! A model is a flat set of trust [`Boundary`] values, [`Element`]s (actors,
//! servers, lambdas, processes, datastores) placed in boundaries, and
//! directed [`Dataflow`]s between elements. Every entity carries typed
//! security [`Controls`] drawn from a fixed registry.
//!
//! ## Key invariants
//!
//! - **Write once**: models are populated through [`ModelBuilder`] and frozen
//!   into a [`ThreatModel`] with no mutating methods.
//! - **Atomic registration**: a rejected `add_*` call leaves the builder
//!   unchanged.
//! - **No dangling references**: boundary references and dataflow endpoints
//!   must already be registered.
//! - **Defaults, not errors**: unset control flags read as their registry
//!   default.

pub mod controls;
pub mod entity;
pub mod error;
pub mod graph;
pub mod ids;

pub use controls::{Controls, EntityKind, FlagKind, FlagSpec, FlagValue};
pub use entity::{
    Boundary, BoundarySpec, Dataflow, DataflowSpec, Element, ElementKind, ElementSpec,
};
pub use error::ModelError;
pub use graph::{ModelBuilder, ModelSnapshot, ThreatModel};
pub use ids::{BoundaryId, DataflowId, ElementId, TargetKind, TargetRef};
