// error.rs - Error types for the threat catalog and predicate evaluation.

use std::path::PathBuf;

use thiserror::Error;
use tm_model::TargetKind;

use crate::condition::{CompareOp, Scope};

/// Errors raised while building or loading a catalog.
///
/// All of these mean the threat definitions are malformed; a run never
/// starts with a partially valid catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two threats share an id.
    #[error("duplicate threat id '{0}'")]
    DuplicateThreatId(String),

    /// A predicate names a flag the control registry does not know.
    #[error("threat '{threat}' references unknown control flag '{flag}'")]
    UnknownFlag { threat: String, flag: String },

    /// A default score is outside 0.0..=10.0.
    #[error("threat '{threat}' has score {score} outside 0.0..=10.0")]
    InvalidScore { threat: String, score: f32 },

    /// An element-kind filter was given on a non-element threat.
    #[error("threat '{threat}' filters element kinds but targets {target}")]
    KindFilterOnNonElement { threat: String, target: TargetKind },

    /// Failed to read a catalog file.
    #[error("failed to read threat catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file extension is neither yaml/yml nor json.
    #[error("unsupported catalog format for {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid YAML threat catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON threat catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while evaluating a predicate against one target.
///
/// These indicate a malformed threat definition and abort the run.
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    /// The predicate reads a scope that does not exist for this target kind
    /// (e.g. `source` on an element).
    #[error("scope '{scope}' is not available for {target} targets")]
    ScopeUnavailable { scope: Scope, target: TargetKind },

    /// The flag name is not in the control registry.
    #[error("unknown control flag '{0}'")]
    UnknownFlag(String),

    /// The literal in the predicate has a different type than the flag.
    #[error("flag '{flag}' is a {actual} but is compared with a {literal}")]
    TypeMismatch {
        flag: String,
        actual: &'static str,
        literal: &'static str,
    },

    /// An ordering comparison was applied to a non-numeric flag.
    #[error("operator '{op}' needs a number, but flag '{flag}' is a {actual}")]
    NotOrderable {
        flag: String,
        op: CompareOp,
        actual: &'static str,
    },
}
