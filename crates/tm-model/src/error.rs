// error.rs - Error types for graph construction and control flags.
//
// Every variant is a configuration error: the model definition itself is
// inconsistent and the run cannot proceed.

use thiserror::Error;

use crate::controls::EntityKind;

/// Errors raised while registering entities or setting control flags.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// A caller-supplied id collides with an existing entity of the same kind.
    #[error("duplicate {kind} identifier '{id}'")]
    DuplicateIdentifier { kind: &'static str, id: String },

    /// An element names a boundary that is not registered in the model.
    #[error("element '{element}' references unknown boundary '{boundary}'")]
    UnknownBoundary { element: String, boundary: String },

    /// A boundary id was not found.
    #[error("unknown boundary '{0}'")]
    BoundaryNotFound(String),

    /// An element id was not found (dataflow endpoint or flag update).
    #[error("unknown element '{0}'")]
    UnknownElement(String),

    /// A dataflow id was not found.
    #[error("unknown dataflow '{0}'")]
    UnknownDataflow(String),

    /// A boundary id was used where only an element may appear.
    #[error("dataflow endpoint '{0}' is a boundary, not an element")]
    InvalidEndpoint(String),

    /// The flag name is not in the registry for this entity kind.
    #[error("unknown control flag '{flag}' for {kind}")]
    UnknownFlag { flag: String, kind: EntityKind },

    /// The flag exists but the value has the wrong type.
    #[error("control flag '{flag}' expects a {expected} value, got {found}")]
    FlagTypeMismatch {
        flag: String,
        expected: &'static str,
        found: &'static str,
    },

    /// An enum flag was given a variant outside its allowed set.
    #[error("control flag '{flag}' does not accept '{value}' (allowed: {allowed})")]
    InvalidEnumValue {
        flag: String,
        value: String,
        allowed: String,
    },
}
