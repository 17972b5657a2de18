//! # tm-engine
//!
//! Matching and reconciliation for data-flow threat models.
//!
//! The pipeline is: load a [`ModelDefinition`] into a frozen
//! [`ThreatModel`](tm_model::ThreatModel) and an [`OverrideStore`], run
//! [`match_threats`] against a [`ThreatCatalog`](tm_threats::ThreatCatalog)
//! to get candidate findings, then [`reconcile`] them with the overrides.
//! [`analyze`] runs all of it and returns an [`AnalysisReport`].
//!
//! ## Key invariants
//!
//! - **Deterministic**: finding ids are keyed by (threat, target), and
//!   findings come out in catalog order then registration order.
//! - **No partial runs**: any configuration or predicate error aborts the
//!   whole analysis.
//! - **Overrides are never dropped**: an override without a candidate
//!   becomes a standalone finding.
//! - **Later override wins**: a replacement is logged and reported as a
//!   diagnostic.

pub mod analysis;
pub mod definition;
pub mod error;
pub mod finding;
pub mod matcher;
pub mod overrides;

pub use analysis::{analyze, AnalysisReport, Summary};
pub use definition::ModelDefinition;
pub use error::{DefinitionError, EngineError};
pub use finding::{Finding, Origin, Response};
pub use matcher::{explain, match_threats, MatchStep, MatchTrace};
pub use overrides::{reconcile, Override, OverrideStore};
