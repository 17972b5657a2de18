// definition.rs - Declarative model definition documents.
//
// A definition describes one model in YAML or JSON:
//
//   name: Greeting Agent
//   boundaries:
//     - { id: vpc, name: VPC Service Perimeter }
//   elements:
//     - { id: root_agent, kind: server, name: Root Agent, boundary: vpc,
//         controls: { isHardened: true } }
//   dataflows:
//     - { id: d_root_vertex, from: root_agent, to: vertex_ai, label: Prompt }
//   overrides:
//     - { id: F-DF-01, target: d_root_vertex, threat: DE01,
//         response: mitigated, severity: 6.5 }
//
// Loading runs every declaration through `ModelBuilder`, so a definition is
// rejected with the same errors as direct API use. The builder keeps ids,
// generated ones included, unique across boundaries, elements and
// dataflows, so override targets resolve by bare id.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tm_model::{
    BoundaryId, BoundarySpec, DataflowSpec, ElementId, ElementKind, ElementSpec, FlagValue,
    ModelBuilder, ModelError, ThreatModel,
};

use crate::error::DefinitionError;
use crate::finding::Response;
use crate::overrides::{Override, OverrideStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub boundaries: Vec<BoundaryDef>,
    #[serde(default)]
    pub elements: Vec<ElementDef>,
    #[serde(default)]
    pub dataflows: Vec<DataflowDef>,
    #[serde(default)]
    pub overrides: Vec<OverrideDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryDef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub controls: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementDef {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: ElementKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Id of the containing boundary.
    #[serde(default)]
    pub boundary: Option<String>,
    #[serde(default)]
    pub controls: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataflowDef {
    #[serde(default)]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub label: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub controls: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideDef {
    #[serde(default)]
    pub id: Option<String>,
    /// Bare id of a boundary, element or dataflow.
    pub target: String,
    pub threat: String,
    pub response: Response,
    #[serde(default)]
    pub severity: Option<f32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ModelDefinition {
    pub fn from_yaml_str(s: &str) -> Result<Self, DefinitionError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read a definition file, choosing the parser by extension.
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let json = match ext.as_deref() {
            Some("yaml") | Some("yml") => false,
            Some("json") => true,
            _ => return Err(DefinitionError::UnsupportedFormat(path.to_path_buf())),
        };
        let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Build the frozen model and its override store.
    pub fn into_model(self) -> Result<(ThreatModel, OverrideStore), DefinitionError> {
        let mut builder = ModelBuilder::new(self.name);
        builder.description(self.description);
        if let Some(notes) = self.notes {
            builder.notes(notes);
        }

        for def in self.boundaries {
            let mut spec = BoundarySpec::new(def.name);
            if let Some(id) = def.id {
                spec = spec.with_id(id);
            }
            if let Some(notes) = def.notes {
                spec = spec.notes(notes);
            }
            for (name, value) in def.controls {
                spec = spec.control(name, value);
            }
            builder.add_boundary(spec)?;
        }

        for def in self.elements {
            let mut spec = ElementSpec::new(def.kind, def.name).description(def.description);
            if let Some(id) = def.id {
                spec = spec.with_id(id);
            }
            if let Some(notes) = def.notes {
                spec = spec.notes(notes);
            }
            if let Some(boundary) = def.boundary {
                spec = spec.in_boundary(&BoundaryId::new(boundary));
            }
            for (name, value) in def.controls {
                spec = spec.control(name, value);
            }
            builder.add_element(spec)?;
        }

        for def in self.dataflows {
            for endpoint in [&def.from, &def.to] {
                if !builder.has_element(endpoint) && builder.has_boundary(endpoint) {
                    return Err(ModelError::InvalidEndpoint(endpoint.clone()).into());
                }
            }
            let mut spec = DataflowSpec::new(
                &ElementId::new(def.from),
                &ElementId::new(def.to),
                def.label,
            );
            if let Some(id) = def.id {
                spec = spec.with_id(id);
            }
            if let Some(notes) = def.notes {
                spec = spec.notes(notes);
            }
            for (name, value) in def.controls {
                spec = spec.control(name, value);
            }
            builder.add_dataflow(spec)?;
        }

        let model = builder.build();

        let mut store = OverrideStore::new();
        for def in self.overrides {
            let target = model.resolve_target(&def.target).ok_or_else(|| {
                DefinitionError::UnknownOverrideTarget {
                    threat: def.threat.clone(),
                    target: def.target.clone(),
                }
            })?;
            let mut ov = Override::new(target, def.threat, def.response);
            ov.id = def.id;
            ov.severity = def.severity;
            ov.notes = def.notes;
            store.add(ov);
        }

        tracing::debug!(
            model = %model.name(),
            elements = model.elements().len(),
            dataflows = model.dataflows().len(),
            overrides = store.len(),
            "model definition loaded"
        );
        Ok((model, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_model::{TargetKind, TargetRef};

    const GREETING: &str = r#"
name: Greeting Agent
description: Single agent answering greetings
boundaries:
  - id: vpc
    name: VPC Service Perimeter
    notes: Restricts data exfiltration
elements:
  - { id: user, kind: actor, name: User }
  - id: root_agent
    kind: server
    name: Root Agent
    boundary: vpc
    controls: { isHardened: true, sanitizesInput: false }
  - { id: vertex_ai, kind: server, name: Vertex AI, boundary: vpc }
dataflows:
  - { id: d_user_root, from: user, to: root_agent, label: Greeting request }
  - id: d_root_vertex
    from: root_agent
    to: vertex_ai
    label: Prompt
    controls: { isEncrypted: true, protocol: https, dstPort: 443 }
overrides:
  - { id: F-DF-01, target: d_root_vertex, threat: DE01, response: mitigated, severity: 6.5 }
"#;

    #[test]
    fn builds_model_and_overrides() {
        let (model, store) = ModelDefinition::from_yaml_str(GREETING)
            .unwrap()
            .into_model()
            .unwrap();
        assert_eq!(model.name(), "Greeting Agent");
        assert_eq!(model.boundaries().len(), 1);
        assert_eq!(model.elements().len(), 3);
        assert_eq!(model.dataflows().len(), 2);
        let flow = model.dataflow(&"d_root_vertex".into()).unwrap();
        assert_eq!(flow.controls.value("dstPort"), Some(FlagValue::Number(443.0)));
        assert!(!model.crosses_boundary(flow));

        let ov = store
            .get(&TargetRef::dataflow(&"d_root_vertex".into()), "DE01")
            .unwrap();
        assert_eq!(ov.id.as_deref(), Some("F-DF-01"));
        assert_eq!(ov.target.kind, TargetKind::Dataflow);
        assert_eq!(ov.response, Response::Mitigated);
    }

    #[test]
    fn rejects_unknown_boundary() {
        let yaml = r#"
name: m
elements:
  - { id: a, kind: server, name: A, boundary: nowhere }
"#;
        let err = ModelDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Model(ModelError::UnknownBoundary { .. })
        ));
    }

    #[test]
    fn rejects_boundary_as_endpoint() {
        let yaml = r#"
name: m
boundaries: [{ id: vpc, name: VPC }]
elements: [{ id: a, kind: server, name: A }]
dataflows: [{ from: a, to: vpc, label: x }]
"#;
        let err = ModelDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Model(ModelError::InvalidEndpoint(id)) if id == "vpc"
        ));
    }

    #[test]
    fn rejects_ids_shared_across_kinds() {
        let yaml = r#"
name: m
boundaries: [{ id: x, name: X }]
elements: [{ id: x, kind: server, name: X }]
"#;
        let err = ModelDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Model(ModelError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn explicit_id_cannot_shadow_a_generated_one() {
        let yaml = r#"
name: m
elements:
  - { kind: actor, name: User }
  - { id: agent, kind: server, name: Agent }
dataflows: [{ id: element-1, from: agent, to: agent, label: loop }]
"#;
        let err = ModelDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Model(ModelError::DuplicateIdentifier { id, .. }) if id == "element-1"
        ));
    }

    #[test]
    fn rejects_invalid_flag_values() {
        let yaml = r#"
name: m
elements: [{ id: a, kind: actor, name: A, controls: { isHardened: true } }]
"#;
        let err = ModelDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::Model(ModelError::UnknownFlag { .. })
        ));
    }

    #[test]
    fn rejects_unknown_override_target() {
        let yaml = r#"
name: m
elements: [{ id: a, kind: server, name: A }]
overrides: [{ target: ghost, threat: AC01, response: accepted }]
"#;
        let err = ModelDefinition::from_yaml_str(yaml)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownOverrideTarget { .. }));
    }

    #[test]
    fn rejects_misspelled_keys() {
        let yaml = r#"
name: m
elements: [{ id: a, kind: server, name: A, boundry: vpc }]
"#;
        assert!(ModelDefinition::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn loads_json_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(
            &path,
            r#"{"name":"m","elements":[{"id":"a","kind":"lambda","name":"Tool"}]}"#,
        )
        .unwrap();
        let (model, store) = ModelDefinition::load(&path).unwrap().into_model().unwrap();
        assert_eq!(model.elements()[0].kind, ElementKind::Lambda);
        assert!(store.is_empty());
    }
}
