// entity.rs - Boundaries, elements and dataflows, plus the specs used to
// register them with a `ModelBuilder`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::controls::{Controls, EntityKind, FlagValue};
use crate::ids::{BoundaryId, DataflowId, ElementId};

/// The concrete kind of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A human or external principal.
    Actor,
    /// A long-running service.
    Server,
    /// A function invoked on demand (cloud function, tool).
    Lambda,
    /// An in-process component.
    Process,
    /// Persisted data.
    Datastore,
}

impl ElementKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            ElementKind::Actor => EntityKind::Actor,
            ElementKind::Server => EntityKind::Server,
            ElementKind::Lambda => EntityKind::Lambda,
            ElementKind::Process => EntityKind::Process,
            ElementKind::Datastore => EntityKind::Datastore,
        }
    }

    /// Whether elements of this kind execute code.
    pub fn runs_code(self) -> bool {
        matches!(
            self,
            ElementKind::Server | ElementKind::Lambda | ElementKind::Process
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entity_kind().fmt(f)
    }
}

/// A trust perimeter.
#[derive(Debug, Clone, Serialize)]
pub struct Boundary {
    pub id: BoundaryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub controls: Controls,
}

/// An actor, server, lambda, process or datastore.
#[derive(Debug, Clone, Serialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Weak reference: the boundary does not own the element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_boundary: Option<BoundaryId>,
    pub controls: Controls,
}

/// A directed, labeled communication between two elements.
#[derive(Debug, Clone, Serialize)]
pub struct Dataflow {
    pub id: DataflowId,
    pub source: ElementId,
    pub destination: ElementId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub controls: Controls,
}

/// Registration request for a boundary.
#[derive(Debug, Clone, Default)]
pub struct BoundarySpec {
    pub id: Option<String>,
    pub name: String,
    pub notes: Option<String>,
    pub controls: Vec<(String, FlagValue)>,
}

impl BoundarySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn control(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.controls.push((name.into(), value.into()));
        self
    }
}

/// Registration request for an element.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub id: Option<String>,
    pub kind: ElementKind,
    pub name: String,
    pub description: String,
    pub notes: Option<String>,
    pub in_boundary: Option<BoundaryId>,
    pub controls: Vec<(String, FlagValue)>,
}

impl ElementSpec {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            name: name.into(),
            description: String::new(),
            notes: None,
            in_boundary: None,
            controls: Vec::new(),
        }
    }

    pub fn actor(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Actor, name)
    }

    pub fn server(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Server, name)
    }

    pub fn lambda(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Lambda, name)
    }

    pub fn process(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Process, name)
    }

    pub fn datastore(name: impl Into<String>) -> Self {
        Self::new(ElementKind::Datastore, name)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn in_boundary(mut self, boundary: &BoundaryId) -> Self {
        self.in_boundary = Some(boundary.clone());
        self
    }

    pub fn control(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.controls.push((name.into(), value.into()));
        self
    }
}

/// Registration request for a dataflow.
#[derive(Debug, Clone)]
pub struct DataflowSpec {
    pub id: Option<String>,
    pub source: ElementId,
    pub destination: ElementId,
    pub label: String,
    pub notes: Option<String>,
    pub controls: Vec<(String, FlagValue)>,
}

impl DataflowSpec {
    pub fn new(source: &ElementId, destination: &ElementId, label: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.clone(),
            destination: destination.clone(),
            label: label.into(),
            notes: None,
            controls: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn control(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.controls.push((name.into(), value.into()));
        self
    }
}
