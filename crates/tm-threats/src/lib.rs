//! # tm-threats
//!
//! Threat catalog for data-flow threat models.
//!
//! A [`Threat`] names the kind of target it is evaluated against (element,
//! dataflow or boundary) and a structured [`Condition`] over control flags.
//! [`ThreatCatalog`] holds the definitions indexed by id.
//!
//! ## Key invariants
//!
//! - **Unique ids**: a catalog never holds two threats with the same id.
//! - **Known flags**: every flag a condition names exists in the control
//!   registry; misspellings are rejected at load time.
//! - **Pure predicates**: evaluating a condition only reads the model.

pub mod catalog;
pub mod condition;
pub mod error;
pub mod threat;

pub use catalog::ThreatCatalog;
pub use condition::{CompareOp, Condition, ConditionStep, FlagTest, KindTest, Scope, Subject};
pub use error::{CatalogError, EvalError};
pub use threat::{Severity, Threat};
