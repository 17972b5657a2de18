// error.rs - Error types for matching, reconciliation and model loading.

use std::path::PathBuf;

use thiserror::Error;
use tm_model::{ModelError, TargetKind, TargetRef};
use tm_threats::EvalError;

/// Errors that abort an analysis run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A threat's predicate could not be evaluated against a target.
    #[error("threat '{threat}' failed on {target}: {source}")]
    Predicate {
        threat: String,
        target: TargetRef,
        source: EvalError,
    },

    /// An override names a threat that is not in the catalog.
    #[error("override for {target} references unknown threat '{threat}'")]
    UnknownOverrideThreat { threat: String, target: TargetRef },

    /// An override names a target that is not in the model.
    #[error("override for threat '{threat}' references unknown target {target}")]
    UnknownOverrideTarget { threat: String, target: TargetRef },

    /// An override targets a kind of entity its threat is never evaluated
    /// against.
    #[error("override for threat '{threat}' targets {target}, but the threat applies to {expected} targets")]
    OverrideKindMismatch {
        threat: String,
        expected: TargetKind,
        target: TargetRef,
    },

    /// A target reference resolves to nothing in the model.
    #[error("unknown target {0}")]
    UnknownTarget(TargetRef),

    /// Two final findings ended up with the same id.
    #[error("duplicate finding id '{0}'")]
    DuplicateFindingId(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised while loading a model definition document.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read model definition at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported model format for {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid YAML model definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON model definition: {0}")]
    Json(#[from] serde_json::Error),

    /// An override target id matches no boundary, element or dataflow.
    #[error("override '{threat}' targets unknown id '{target}'")]
    UnknownOverrideTarget { threat: String, target: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}
