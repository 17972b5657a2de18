// ids.rs - Typed identifiers for boundaries, elements and dataflows.
//
// Separate newtypes keep a boundary id from ever being passed where a
// dataflow endpoint is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a trust boundary.
    BoundaryId
);
entity_id!(
    /// Identifier of an actor, server, lambda, process or datastore.
    ElementId
);
entity_id!(
    /// Identifier of a directed dataflow.
    DataflowId
);

/// The kind of graph entity a threat or finding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Element,
    Dataflow,
    Boundary,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TargetKind::Element => "element",
            TargetKind::Dataflow => "dataflow",
            TargetKind::Boundary => "boundary",
        })
    }
}

/// A reference to one matchable entity: its kind plus its id.
///
/// Findings and overrides are keyed by this value, so equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: String,
}

impl TargetRef {
    pub fn element(id: &ElementId) -> Self {
        Self {
            kind: TargetKind::Element,
            id: id.as_str().to_string(),
        }
    }

    pub fn dataflow(id: &DataflowId) -> Self {
        Self {
            kind: TargetKind::Dataflow,
            id: id.as_str().to_string(),
        }
    }

    pub fn boundary(id: &BoundaryId) -> Self {
        Self {
            kind: TargetKind::Boundary,
            id: id.as_str().to_string(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
