// graph.rs - ModelBuilder and the frozen ThreatModel.
//
// The builder is the only way to populate a model. Each `add_*` call
// validates the whole request (id collision, boundary and endpoint
// references, every control flag) before touching any state, so a failed
// registration leaves the builder exactly as it was. Ids are unique across
// boundaries, elements and dataflows, so a bare id always names one target. `build()` consumes the
// builder and returns a ThreatModel that has no mutating methods.

use std::collections::HashMap;

use serde::Serialize;

use crate::controls::{Controls, EntityKind, FlagValue};
use crate::entity::{
    Boundary, BoundarySpec, Dataflow, DataflowSpec, Element, ElementSpec,
};
use crate::error::ModelError;
use crate::ids::{BoundaryId, DataflowId, ElementId, TargetKind, TargetRef};

/// Ordered storage plus an id index. Registration order is preserved for
/// deterministic iteration.
#[derive(Debug, Clone)]
struct Table<K, V> {
    items: Vec<V>,
    index: HashMap<K, usize>,
}

impl<K: std::hash::Hash + Eq, V> Table<K, V> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    fn push(&mut self, key: K, value: V) {
        self.index.insert(key, self.items.len());
        self.items.push(value);
    }
}

/// Pick `<prefix>-N` with the smallest N >= `start` that is not taken.
fn generate_id(prefix: &str, start: usize, taken: impl Fn(&str) -> bool) -> String {
    let mut n = start;
    loop {
        let candidate = format!("{}-{}", prefix, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn build_controls(
    kind: EntityKind,
    flags: &[(String, FlagValue)],
) -> Result<Controls, ModelError> {
    let mut controls = Controls::new(kind);
    for (name, value) in flags {
        controls.set(name, value.clone())?;
    }
    Ok(controls)
}

/// Write-once builder for a threat model.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    description: String,
    notes: Option<String>,
    boundaries: Table<BoundaryId, Boundary>,
    elements: Table<ElementId, Element>,
    dataflows: Table<DataflowId, Dataflow>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            notes: None,
            boundaries: Table::new(),
            elements: Table::new(),
            dataflows: Table::new(),
        }
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn notes(&mut self, notes: impl Into<String>) -> &mut Self {
        self.notes = Some(notes.into());
        self
    }

    /// Whether `id` names a registered boundary.
    pub fn has_boundary(&self, id: &str) -> bool {
        self.boundaries.contains(&BoundaryId::new(id))
    }

    /// Whether `id` names a registered element.
    pub fn has_element(&self, id: &str) -> bool {
        self.elements.contains(&ElementId::new(id))
    }

    /// Whether `id` is used by an entity of any kind.
    pub fn is_taken(&self, id: &str) -> bool {
        self.has_boundary(id)
            || self.has_element(id)
            || self.dataflows.contains(&DataflowId::new(id))
    }

    /// Accept a caller-supplied id, or generate `<prefix>-N` from the
    /// per-kind registration count.
    fn claim(
        &self,
        kind: &'static str,
        requested: Option<String>,
        prefix: &str,
        count: usize,
    ) -> Result<String, ModelError> {
        match requested {
            Some(id) if self.is_taken(&id) => Err(ModelError::DuplicateIdentifier { kind, id }),
            Some(id) => Ok(id),
            None => Ok(generate_id(prefix, count + 1, |id| self.is_taken(id))),
        }
    }

    pub fn add_boundary(&mut self, spec: BoundarySpec) -> Result<BoundaryId, ModelError> {
        let id = BoundaryId::new(self.claim(
            "boundary",
            spec.id,
            "boundary",
            self.boundaries.items.len(),
        )?);
        let controls = build_controls(EntityKind::Boundary, &spec.controls)?;

        tracing::debug!(boundary = %id, "registered boundary");
        self.boundaries.push(
            id.clone(),
            Boundary {
                id: id.clone(),
                name: spec.name,
                notes: spec.notes,
                controls,
            },
        );
        Ok(id)
    }

    pub fn add_element(&mut self, spec: ElementSpec) -> Result<ElementId, ModelError> {
        let id = ElementId::new(self.claim(
            "element",
            spec.id,
            "element",
            self.elements.items.len(),
        )?);
        if let Some(boundary) = &spec.in_boundary {
            if !self.boundaries.contains(boundary) {
                return Err(ModelError::UnknownBoundary {
                    element: id.to_string(),
                    boundary: boundary.to_string(),
                });
            }
        }
        let controls = build_controls(spec.kind.entity_kind(), &spec.controls)?;

        tracing::debug!(element = %id, kind = %spec.kind, "registered element");
        self.elements.push(
            id.clone(),
            Element {
                id: id.clone(),
                kind: spec.kind,
                name: spec.name,
                description: spec.description,
                notes: spec.notes,
                in_boundary: spec.in_boundary,
                controls,
            },
        );
        Ok(id)
    }

    pub fn add_dataflow(&mut self, spec: DataflowSpec) -> Result<DataflowId, ModelError> {
        let id = DataflowId::new(self.claim(
            "dataflow",
            spec.id,
            "flow",
            self.dataflows.items.len(),
        )?);
        for endpoint in [&spec.source, &spec.destination] {
            if !self.elements.contains(endpoint) {
                return Err(ModelError::UnknownElement(endpoint.to_string()));
            }
        }
        let controls = build_controls(EntityKind::Dataflow, &spec.controls)?;

        tracing::debug!(dataflow = %id, from = %spec.source, to = %spec.destination, "registered dataflow");
        self.dataflows.push(
            id.clone(),
            Dataflow {
                id: id.clone(),
                source: spec.source,
                destination: spec.destination,
                label: spec.label,
                notes: spec.notes,
                controls,
            },
        );
        Ok(id)
    }

    /// Set a control flag on a registered element.
    pub fn set_element_flag(
        &mut self,
        id: &ElementId,
        name: &str,
        value: impl Into<FlagValue>,
    ) -> Result<Option<FlagValue>, ModelError> {
        let element = self
            .elements
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownElement(id.to_string()))?;
        element.controls.set(name, value)
    }

    /// Set a control flag on a registered dataflow.
    pub fn set_dataflow_flag(
        &mut self,
        id: &DataflowId,
        name: &str,
        value: impl Into<FlagValue>,
    ) -> Result<Option<FlagValue>, ModelError> {
        let flow = self
            .dataflows
            .get_mut(id)
            .ok_or_else(|| ModelError::UnknownDataflow(id.to_string()))?;
        flow.controls.set(name, value)
    }

    /// Set a control flag on a registered boundary.
    pub fn set_boundary_flag(
        &mut self,
        id: &BoundaryId,
        name: &str,
        value: impl Into<FlagValue>,
    ) -> Result<Option<FlagValue>, ModelError> {
        let boundary = self
            .boundaries
            .get_mut(id)
            .ok_or_else(|| ModelError::BoundaryNotFound(id.to_string()))?;
        boundary.controls.set(name, value)
    }

    /// Freeze the graph.
    pub fn build(self) -> ThreatModel {
        tracing::debug!(
            model = %self.name,
            boundaries = self.boundaries.items.len(),
            elements = self.elements.items.len(),
            dataflows = self.dataflows.items.len(),
            "model frozen"
        );
        ThreatModel {
            name: self.name,
            description: self.description,
            notes: self.notes,
            boundaries: self.boundaries,
            elements: self.elements,
            dataflows: self.dataflows,
        }
    }
}

/// A frozen data-flow diagram.
///
/// All accessors are read-only and iterate in registration order.
#[derive(Debug, Clone)]
pub struct ThreatModel {
    name: String,
    description: String,
    notes: Option<String>,
    boundaries: Table<BoundaryId, Boundary>,
    elements: Table<ElementId, Element>,
    dataflows: Table<DataflowId, Dataflow>,
}

impl ThreatModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries.items
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements.items
    }

    pub fn dataflows(&self) -> &[Dataflow] {
        &self.dataflows.items
    }

    pub fn boundary(&self, id: &BoundaryId) -> Option<&Boundary> {
        self.boundaries.get(id)
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn dataflow(&self, id: &DataflowId) -> Option<&Dataflow> {
        self.dataflows.get(id)
    }

    /// Elements whose `in_boundary` is `boundary`.
    pub fn elements_in<'a>(
        &'a self,
        boundary: &'a BoundaryId,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements
            .items
            .iter()
            .filter(move |e| e.in_boundary.as_ref() == Some(boundary))
    }

    /// Elements not placed in any boundary.
    pub fn unbounded_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.items.iter().filter(|e| e.in_boundary.is_none())
    }

    pub fn flows_from<'a>(
        &'a self,
        element: &'a ElementId,
    ) -> impl Iterator<Item = &'a Dataflow> + 'a {
        self.dataflows
            .items
            .iter()
            .filter(move |f| &f.source == element)
    }

    pub fn flows_to<'a>(
        &'a self,
        element: &'a ElementId,
    ) -> impl Iterator<Item = &'a Dataflow> + 'a {
        self.dataflows
            .items
            .iter()
            .filter(move |f| &f.destination == element)
    }

    /// Whether a flow's endpoints sit in different boundaries.
    ///
    /// An element with no boundary counts as its own (unnamed) zone, so a
    /// flow between a bounded and an unbounded element crosses.
    pub fn crosses_boundary(&self, flow: &Dataflow) -> bool {
        let zone = |id: &ElementId| self.element(id).and_then(|e| e.in_boundary.clone());
        zone(&flow.source) != zone(&flow.destination)
    }

    /// The boundary an element sits in, if any.
    pub fn boundary_of(&self, element: &Element) -> Option<&Boundary> {
        element.in_boundary.as_ref().and_then(|b| self.boundary(b))
    }

    /// Whether a target reference resolves in this model.
    pub fn contains_target(&self, target: &TargetRef) -> bool {
        self.target_label(target).is_some()
    }

    /// The human-readable label of a target (name or flow label).
    pub fn target_label(&self, target: &TargetRef) -> Option<&str> {
        match target.kind {
            TargetKind::Element => self
                .element(&ElementId::new(target.id.as_str()))
                .map(|e| e.name.as_str()),
            TargetKind::Dataflow => self
                .dataflow(&DataflowId::new(target.id.as_str()))
                .map(|f| f.label.as_str()),
            TargetKind::Boundary => self
                .boundary(&BoundaryId::new(target.id.as_str()))
                .map(|b| b.name.as_str()),
        }
    }

    /// Resolve a bare id against boundaries, elements and dataflows.
    ///
    /// Elements are checked first, then dataflows, then boundaries.
    pub fn resolve_target(&self, id: &str) -> Option<TargetRef> {
        if self.elements.contains(&ElementId::new(id)) {
            return Some(TargetRef::element(&ElementId::new(id)));
        }
        if self.dataflows.contains(&DataflowId::new(id)) {
            return Some(TargetRef::dataflow(&DataflowId::new(id)));
        }
        if self.boundaries.contains(&BoundaryId::new(id)) {
            return Some(TargetRef::boundary(&BoundaryId::new(id)));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.items.is_empty()
            && self.elements.items.is_empty()
            && self.dataflows.items.is_empty()
    }

    /// Serializable snapshot of the graph for external renderers.
    pub fn snapshot(&self) -> ModelSnapshot<'_> {
        ModelSnapshot {
            name: &self.name,
            description: &self.description,
            notes: self.notes.as_deref(),
            boundaries: &self.boundaries.items,
            elements: &self.elements.items,
            dataflows: &self.dataflows.items,
        }
    }
}

/// Borrowed, serializable view of a whole model.
#[derive(Debug, Serialize)]
pub struct ModelSnapshot<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
    pub boundaries: &'a [Boundary],
    pub elements: &'a [Element],
    pub dataflows: &'a [Dataflow],
}
