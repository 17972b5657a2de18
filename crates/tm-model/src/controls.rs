// controls.rs - The security-control flag registry.
//
// Every boundary, element and dataflow carries a set of named control flags
// (isHardened, isEncrypted, protocol, ...). The set of recognized names is
// fixed and documented here, each with a value kind and a default. Threat
// predicates read flags through `Controls::value()`, which falls back to the
// registry default for anything unset, so a predicate never has to check
// presence first. Unknown names are rejected when a flag is set and when a
// catalog is loaded, which is what keeps a misspelled flag from silently
// reading as "false".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Every kind of entity that can carry control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Boundary,
    Actor,
    Server,
    Lambda,
    Process,
    Datastore,
    Dataflow,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Boundary,
        EntityKind::Actor,
        EntityKind::Server,
        EntityKind::Lambda,
        EntityKind::Process,
        EntityKind::Datastore,
        EntityKind::Dataflow,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Boundary => "boundary",
            EntityKind::Actor => "actor",
            EntityKind::Server => "server",
            EntityKind::Lambda => "lambda",
            EntityKind::Process => "process",
            EntityKind::Datastore => "datastore",
            EntityKind::Dataflow => "dataflow",
        };
        f.pad(s)
    }
}

/// A control flag value.
///
/// Enum flags carry their variant as `Text`. Serialized untagged, so YAML
/// `isHardened: true`, `dstPort: 443` and `protocol: https` all work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "bool",
            FlagValue::Number(_) => "number",
            FlagValue::Text(_) => "enum",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FlagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FlagValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Number(n) => write!(f, "{}", n),
            FlagValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        FlagValue::Bool(b)
    }
}

impl From<f64> for FlagValue {
    fn from(n: f64) -> Self {
        FlagValue::Number(n)
    }
}

impl From<i64> for FlagValue {
    fn from(n: i64) -> Self {
        FlagValue::Number(n as f64)
    }
}

impl From<&str> for FlagValue {
    fn from(s: &str) -> Self {
        FlagValue::Text(s.to_string())
    }
}

/// The value kind of a registered flag, with its default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagKind {
    Bool {
        default: bool,
    },
    Enum {
        variants: &'static [&'static str],
        default: &'static str,
    },
    Number {
        default: f64,
    },
}

impl FlagKind {
    pub fn default_value(&self) -> FlagValue {
        match self {
            FlagKind::Bool { default } => FlagValue::Bool(*default),
            FlagKind::Enum { default, .. } => FlagValue::Text((*default).to_string()),
            FlagKind::Number { default } => FlagValue::Number(*default),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FlagKind::Bool { .. } => "bool",
            FlagKind::Enum { .. } => "enum",
            FlagKind::Number { .. } => "number",
        }
    }
}

/// One entry of the registry.
#[derive(Debug)]
pub struct FlagSpec {
    pub name: &'static str,
    pub kind: FlagKind,
    pub applies_to: &'static [EntityKind],
    pub description: &'static str,
}

impl FlagSpec {
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        self.applies_to.contains(&kind)
    }

    /// Check a value against this flag's kind.
    pub fn check(&self, value: &FlagValue) -> Result<(), ModelError> {
        match (&self.kind, value) {
            (FlagKind::Bool { .. }, FlagValue::Bool(_))
            | (FlagKind::Number { .. }, FlagValue::Number(_)) => Ok(()),
            (FlagKind::Enum { variants, .. }, FlagValue::Text(v)) => {
                if variants.contains(&v.as_str()) {
                    Ok(())
                } else {
                    Err(ModelError::InvalidEnumValue {
                        flag: self.name.to_string(),
                        value: v.clone(),
                        allowed: variants.join(", "),
                    })
                }
            }
            (kind, value) => Err(ModelError::FlagTypeMismatch {
                flag: self.name.to_string(),
                expected: kind.type_name(),
                found: value.type_name(),
            }),
        }
    }
}

use EntityKind::{Actor, Boundary, Dataflow, Datastore, Lambda, Process, Server};

const EXECUTING: &[EntityKind] = &[Server, Lambda, Process];
const EXECUTING_OR_STORE: &[EntityKind] = &[Server, Lambda, Process, Datastore];
const DATASTORE: &[EntityKind] = &[Datastore];
const ACTOR: &[EntityKind] = &[Actor];
const DATAFLOW: &[EntityKind] = &[Dataflow];
const BOUNDARY: &[EntityKind] = &[Boundary];

const OFF: FlagKind = FlagKind::Bool { default: false };

const PROTOCOLS: &[&str] = &["unknown", "http", "https", "grpc", "tcp", "sql", "internal"];
const TLS_VERSIONS: &[&str] = &["none", "tls1.0", "tls1.1", "tls1.2", "tls1.3"];

/// The recognized control flags.
pub static REGISTRY: &[FlagSpec] = &[
    // Executing elements.
    FlagSpec {
        name: "isHardened",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Host or runtime follows a hardening baseline",
    },
    FlagSpec {
        name: "sanitizesInput",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Strips or neutralizes dangerous content in inputs",
    },
    FlagSpec {
        name: "validatesInput",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Validates inputs against an expected schema or bounds",
    },
    FlagSpec {
        name: "encodesOutput",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Encodes outputs for the consuming context",
    },
    FlagSpec {
        name: "implementsAuthenticationScheme",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Authenticates callers before serving requests",
    },
    FlagSpec {
        name: "implementsPOLP",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Runs with least-privilege credentials",
    },
    FlagSpec {
        name: "handlesResourceConsumption",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Rate-limits or bounds resource usage per request",
    },
    FlagSpec {
        name: "isResilient",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Degrades gracefully under failure of dependencies",
    },
    FlagSpec {
        name: "tracksExecutionFlow",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Emits an audit trail of actions and decisions",
    },
    FlagSpec {
        name: "filtersPromptInjection",
        kind: OFF,
        applies_to: EXECUTING,
        description: "Screens prompts for injection before they reach a model",
    },
    FlagSpec {
        name: "requiresHumanApproval",
        kind: OFF,
        applies_to: EXECUTING,
        description: "High-risk actions are gated on human approval",
    },
    // Executing elements and data stores.
    FlagSpec {
        name: "hasAccessControl",
        kind: OFF,
        applies_to: EXECUTING_OR_STORE,
        description: "Enforces authorization on every access",
    },
    FlagSpec {
        name: "encryption",
        kind: OFF,
        applies_to: EXECUTING_OR_STORE,
        description: "Data held by the element is encrypted at rest",
    },
    // Data stores.
    FlagSpec {
        name: "storesPII",
        kind: OFF,
        applies_to: DATASTORE,
        description: "Holds personally identifiable information",
    },
    FlagSpec {
        name: "storesCredentials",
        kind: OFF,
        applies_to: DATASTORE,
        description: "Holds secrets, keys or tokens",
    },
    FlagSpec {
        name: "isSQL",
        kind: OFF,
        applies_to: DATASTORE,
        description: "Queried through SQL",
    },
    FlagSpec {
        name: "retentionDays",
        kind: FlagKind::Number { default: -1.0 },
        applies_to: DATASTORE,
        description: "Retention limit in days; -1 means unlimited or unknown",
    },
    // Actors.
    FlagSpec {
        name: "isAdmin",
        kind: OFF,
        applies_to: ACTOR,
        description: "Principal holds administrative rights",
    },
    FlagSpec {
        name: "usesMFA",
        kind: OFF,
        applies_to: ACTOR,
        description: "Principal authenticates with a second factor",
    },
    // Dataflows.
    FlagSpec {
        name: "isEncrypted",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Payload is encrypted in transit",
    },
    FlagSpec {
        name: "authenticatesSource",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Destination verifies who sent the flow",
    },
    FlagSpec {
        name: "authenticatesDestination",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Source verifies who receives the flow",
    },
    FlagSpec {
        name: "checksDestinationRevocation",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Source checks the destination certificate for revocation",
    },
    FlagSpec {
        name: "isPII",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Carries personally identifiable information",
    },
    FlagSpec {
        name: "isCredentials",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Carries secrets, keys or tokens",
    },
    FlagSpec {
        name: "carriesModelOutput",
        kind: OFF,
        applies_to: DATAFLOW,
        description: "Carries raw output generated by a language model",
    },
    FlagSpec {
        name: "protocol",
        kind: FlagKind::Enum {
            variants: PROTOCOLS,
            default: "unknown",
        },
        applies_to: DATAFLOW,
        description: "Transport or application protocol",
    },
    FlagSpec {
        name: "tlsVersion",
        kind: FlagKind::Enum {
            variants: TLS_VERSIONS,
            default: "none",
        },
        applies_to: DATAFLOW,
        description: "Lowest TLS version accepted on the connection",
    },
    FlagSpec {
        name: "dstPort",
        kind: FlagKind::Number { default: -1.0 },
        applies_to: DATAFLOW,
        description: "Destination port; -1 when not known",
    },
    // Boundaries.
    FlagSpec {
        name: "isPublic",
        kind: OFF,
        applies_to: BOUNDARY,
        description: "Reachable from the public internet",
    },
    FlagSpec {
        name: "enforcesPerimeterControls",
        kind: OFF,
        applies_to: BOUNDARY,
        description: "Ingress is filtered by a gateway, WAF or service perimeter",
    },
];

/// Look up a flag by name regardless of entity kind.
pub fn lookup(name: &str) -> Option<&'static FlagSpec> {
    REGISTRY.iter().find(|spec| spec.name == name)
}

/// Look up a flag that may be set on entities of `kind`.
pub fn lookup_for(kind: EntityKind, name: &str) -> Option<&'static FlagSpec> {
    lookup(name).filter(|spec| spec.applies_to(kind))
}

/// All flags settable on entities of `kind`, in registry order.
pub fn flags_for(kind: EntityKind) -> impl Iterator<Item = &'static FlagSpec> {
    REGISTRY.iter().filter(move |spec| spec.applies_to(kind))
}

/// The explicitly set flags of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Controls {
    #[serde(skip)]
    kind: EntityKind,
    values: BTreeMap<String, FlagValue>,
}

impl Controls {
    pub const fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Set a flag, returning the previous explicit value.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<FlagValue>,
    ) -> Result<Option<FlagValue>, ModelError> {
        let value = value.into();
        let spec = validate(self.kind, name, &value)?;
        Ok(self.values.insert(spec.name.to_string(), value))
    }

    /// Read a flag. Unset flags read as the registry default.
    ///
    /// Flags that exist in the registry but do not apply to this kind also
    /// read as their default. Returns `None` only for names the registry
    /// does not know at all.
    pub fn value(&self, name: &str) -> Option<FlagValue> {
        if let Some(v) = self.values.get(name) {
            return Some(v.clone());
        }
        lookup(name).map(|spec| spec.kind.default_value())
    }

    /// The explicitly set value, without default fallback.
    pub fn explicit(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Validate a (name, value) pair for an entity kind without storing it.
pub fn validate(
    kind: EntityKind,
    name: &str,
    value: &FlagValue,
) -> Result<&'static FlagSpec, ModelError> {
    let spec = lookup_for(kind, name).ok_or_else(|| ModelError::UnknownFlag {
        flag: name.to_string(),
        kind,
    })?;
    spec.check(value)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = REGISTRY.iter().map(|s| s.name).collect();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn every_kind_has_at_least_one_flag() {
        for kind in EntityKind::ALL {
            assert!(flags_for(kind).count() > 0, "no flags for {}", kind);
        }
    }

    #[test]
    fn unset_flag_reads_default() {
        let controls = Controls::new(EntityKind::Dataflow);
        assert_eq!(controls.value("isEncrypted"), Some(FlagValue::Bool(false)));
        assert_eq!(
            controls.value("protocol"),
            Some(FlagValue::Text("unknown".into()))
        );
        assert_eq!(controls.value("dstPort"), Some(FlagValue::Number(-1.0)));
    }

    #[test]
    fn flag_of_other_kind_reads_default() {
        let controls = Controls::new(EntityKind::Actor);
        assert_eq!(controls.value("isHardened"), Some(FlagValue::Bool(false)));
    }

    #[test]
    fn unknown_name_reads_none() {
        let controls = Controls::new(EntityKind::Server);
        assert_eq!(controls.value("isHardend"), None);
    }

    #[test]
    fn set_and_read_back() {
        let mut controls = Controls::new(EntityKind::Server);
        assert_eq!(controls.set("isHardened", true).unwrap(), None);
        assert_eq!(controls.value("isHardened"), Some(FlagValue::Bool(true)));
        assert_eq!(
            controls.set("isHardened", false).unwrap(),
            Some(FlagValue::Bool(true))
        );
    }

    #[test]
    fn set_rejects_flag_for_wrong_kind() {
        let mut controls = Controls::new(EntityKind::Actor);
        let err = controls.set("isHardened", true).unwrap_err();
        assert!(matches!(err, ModelError::UnknownFlag { .. }));
        assert!(controls.is_empty());
    }

    #[test]
    fn set_rejects_type_mismatch() {
        let mut controls = Controls::new(EntityKind::Dataflow);
        let err = controls.set("isEncrypted", "yes").unwrap_err();
        assert_eq!(
            err,
            ModelError::FlagTypeMismatch {
                flag: "isEncrypted".into(),
                expected: "bool",
                found: "enum",
            }
        );
    }

    #[test]
    fn set_rejects_unknown_enum_variant() {
        let mut controls = Controls::new(EntityKind::Dataflow);
        let err = controls.set("protocol", "smtp").unwrap_err();
        assert!(matches!(err, ModelError::InvalidEnumValue { .. }));
        controls.set("protocol", "https").unwrap();
    }

    #[test]
    fn number_flags_accept_integers() {
        let mut controls = Controls::new(EntityKind::Dataflow);
        controls.set("dstPort", 443_i64).unwrap();
        assert_eq!(controls.value("dstPort"), Some(FlagValue::Number(443.0)));
    }

    #[test]
    fn flag_values_deserialize_untagged() {
        let values: BTreeMap<String, FlagValue> =
            serde_json::from_str(r#"{"a": true, "b": 443, "c": "https"}"#).unwrap();
        assert_eq!(values["a"], FlagValue::Bool(true));
        assert_eq!(values["b"], FlagValue::Number(443.0));
        assert_eq!(values["c"], FlagValue::Text("https".into()));
    }

    #[test]
    fn controls_serialize_only_explicit_values() {
        let mut controls = Controls::new(EntityKind::Server);
        controls.set("isHardened", true).unwrap();
        let json = serde_json::to_string(&controls).unwrap();
        assert_eq!(json, r#"{"isHardened":true}"#);
    }
}
