// condition.rs - Threat applicability predicates.
//
// A Condition is a small structured expression tree evaluated against one
// target (an element, a dataflow or a boundary) of a frozen ThreatModel.
// Evaluation is pure: it only reads the model, and its result does not
// depend on the order in which threats or targets are visited.
//
// In a catalog document a condition looks like:
//
//   condition:
//     all:
//       - crosses_boundary: true
//       - flag: { name: isEncrypted, value: false }
//       - flag: { name: sanitizesInput, of: destination, value: false }
//
// Leaves read flags through `Controls::value()`, so unset flags compare as
// their registry default.

use std::fmt;

use serde::{Deserialize, Serialize};
use tm_model::controls::EntityKind;
use tm_model::{
    Boundary, Controls, Dataflow, Element, ElementKind, FlagValue, TargetKind, TargetRef,
    ThreatModel,
};

use crate::error::EvalError;

/// Which entity a leaf test reads, relative to the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The target itself.
    #[default]
    Target,
    /// The boundary an element target sits in. Reads all defaults when the
    /// element has no boundary.
    Boundary,
    /// The source element of a dataflow target.
    Source,
    /// The destination element of a dataflow target.
    Destination,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Target => "target",
            Scope::Boundary => "boundary",
            Scope::Source => "source",
            Scope::Destination => "destination",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Compare one control flag with a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagTest {
    pub name: String,
    #[serde(default)]
    pub of: Scope,
    #[serde(default)]
    pub op: CompareOp,
    pub value: FlagValue,
}

/// Check the concrete kind of an element in scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindTest {
    #[serde(default)]
    pub of: Scope,
    pub is: ElementKind,
}

/// A predicate over a target's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Matches every target of the threat's kind.
    Always,
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    Flag(FlagTest),
    Kind(KindTest),
    /// Dataflow targets only: whether the endpoints sit in different
    /// boundaries equals the given value.
    CrossesBoundary(bool),
}

/// The entity a predicate is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Element(&'a Element),
    Dataflow(&'a Dataflow),
    Boundary(&'a Boundary),
}

impl<'a> Subject<'a> {
    pub fn kind(&self) -> TargetKind {
        match self {
            Subject::Element(_) => TargetKind::Element,
            Subject::Dataflow(_) => TargetKind::Dataflow,
            Subject::Boundary(_) => TargetKind::Boundary,
        }
    }

    pub fn target_ref(&self) -> TargetRef {
        match self {
            Subject::Element(e) => TargetRef::element(&e.id),
            Subject::Dataflow(f) => TargetRef::dataflow(&f.id),
            Subject::Boundary(b) => TargetRef::boundary(&b.id),
        }
    }

    /// Resolve a subject from a target reference.
    pub fn resolve(model: &'a ThreatModel, target: &TargetRef) -> Option<Self> {
        match target.kind {
            TargetKind::Element => model
                .element(&target.id.as_str().into())
                .map(Subject::Element),
            TargetKind::Dataflow => model
                .dataflow(&target.id.as_str().into())
                .map(Subject::Dataflow),
            TargetKind::Boundary => model
                .boundary(&target.id.as_str().into())
                .map(Subject::Boundary),
        }
    }
}

/// One evaluated leaf, recorded by `Condition::evaluate_traced`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStep {
    /// The leaf test, e.g. "target.isEncrypted == false".
    pub check: String,
    /// What the model actually holds, e.g. "false (default)".
    pub actual: String,
    pub outcome: bool,
}

/// Flags read when a boundary scope resolves to "no boundary".
static NO_BOUNDARY: Controls = Controls::new(EntityKind::Boundary);

/// What a scope resolved to.
struct Scoped<'a> {
    controls: &'a Controls,
    element_kind: Option<ElementKind>,
}

impl Condition {
    /// Parse a standalone condition in catalog form.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(
            yaml,
        ))
    }

    /// Evaluate against one subject.
    pub fn evaluate(&self, model: &ThreatModel, subject: Subject<'_>) -> Result<bool, EvalError> {
        self.eval(model, subject, &mut |_| {})
    }

    /// Evaluate and record every leaf that was actually evaluated.
    ///
    /// `all`/`any` short-circuit, so leaves after the deciding one are not
    /// recorded.
    pub fn evaluate_traced(
        &self,
        model: &ThreatModel,
        subject: Subject<'_>,
    ) -> Result<(bool, Vec<ConditionStep>), EvalError> {
        let mut steps = Vec::new();
        let outcome = self.eval(model, subject, &mut |step| steps.push(step))?;
        Ok((outcome, steps))
    }

    /// Every flag name referenced anywhere in the tree.
    pub fn referenced_flags(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_flags(&mut out);
        out
    }

    fn collect_flags<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::All(items) | Condition::Any(items) => {
                for c in items {
                    c.collect_flags(out);
                }
            }
            Condition::Not(inner) => inner.collect_flags(out),
            Condition::Flag(test) => out.push(&test.name),
            Condition::Always | Condition::Kind(_) | Condition::CrossesBoundary(_) => {}
        }
    }

    fn eval(
        &self,
        model: &ThreatModel,
        subject: Subject<'_>,
        record: &mut dyn FnMut(ConditionStep),
    ) -> Result<bool, EvalError> {
        match self {
            Condition::Always => Ok(true),
            Condition::All(items) => {
                for c in items {
                    if !c.eval(model, subject, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any(items) => {
                for c in items {
                    if c.eval(model, subject, record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(inner) => Ok(!inner.eval(model, subject, record)?),
            Condition::Flag(test) => {
                let scoped = resolve_scope(model, subject, test.of)?;
                let explicit = scoped.controls.explicit(&test.name).is_some();
                let actual = scoped
                    .controls
                    .value(&test.name)
                    .ok_or_else(|| EvalError::UnknownFlag(test.name.clone()))?;
                let outcome = compare(&test.name, &actual, test.op, &test.value)?;
                record(ConditionStep {
                    check: format!("{}.{} {} {}", test.of, test.name, test.op, test.value),
                    actual: if explicit {
                        actual.to_string()
                    } else {
                        format!("{} (default)", actual)
                    },
                    outcome,
                });
                Ok(outcome)
            }
            Condition::Kind(test) => {
                let scoped = resolve_scope(model, subject, test.of)?;
                let kind = scoped.element_kind.ok_or(EvalError::ScopeUnavailable {
                    scope: test.of,
                    target: subject.kind(),
                })?;
                let outcome = kind == test.is;
                record(ConditionStep {
                    check: format!("{}.kind == {}", test.of, test.is),
                    actual: kind.to_string(),
                    outcome,
                });
                Ok(outcome)
            }
            Condition::CrossesBoundary(expected) => {
                let flow = match subject {
                    Subject::Dataflow(flow) => flow,
                    other => {
                        return Err(EvalError::ScopeUnavailable {
                            scope: Scope::Target,
                            target: other.kind(),
                        })
                    }
                };
                let crosses = model.crosses_boundary(flow);
                let outcome = crosses == *expected;
                record(ConditionStep {
                    check: format!("crosses_boundary == {}", expected),
                    actual: crosses.to_string(),
                    outcome,
                });
                Ok(outcome)
            }
        }
    }
}

fn resolve_scope<'a>(
    model: &'a ThreatModel,
    subject: Subject<'a>,
    scope: Scope,
) -> Result<Scoped<'a>, EvalError> {
    let unavailable = || EvalError::ScopeUnavailable {
        scope,
        target: subject.kind(),
    };
    match (scope, subject) {
        (Scope::Target, Subject::Element(e)) => Ok(Scoped {
            controls: &e.controls,
            element_kind: Some(e.kind),
        }),
        (Scope::Target, Subject::Dataflow(f)) => Ok(Scoped {
            controls: &f.controls,
            element_kind: None,
        }),
        (Scope::Target, Subject::Boundary(b)) => Ok(Scoped {
            controls: &b.controls,
            element_kind: None,
        }),
        (Scope::Boundary, Subject::Element(e)) => Ok(Scoped {
            controls: model
                .boundary_of(e)
                .map(|b| &b.controls)
                .unwrap_or(&NO_BOUNDARY),
            element_kind: None,
        }),
        (Scope::Source, Subject::Dataflow(f)) => {
            let e = model.element(&f.source).ok_or_else(unavailable)?;
            Ok(Scoped {
                controls: &e.controls,
                element_kind: Some(e.kind),
            })
        }
        (Scope::Destination, Subject::Dataflow(f)) => {
            let e = model.element(&f.destination).ok_or_else(unavailable)?;
            Ok(Scoped {
                controls: &e.controls,
                element_kind: Some(e.kind),
            })
        }
        _ => Err(unavailable()),
    }
}

fn compare(
    flag: &str,
    actual: &FlagValue,
    op: CompareOp,
    literal: &FlagValue,
) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq | CompareOp::Ne => {
            let equal = match (actual, literal) {
                (FlagValue::Bool(a), FlagValue::Bool(b)) => a == b,
                (FlagValue::Number(a), FlagValue::Number(b)) => a == b,
                (FlagValue::Text(a), FlagValue::Text(b)) => a == b,
                _ => {
                    return Err(EvalError::TypeMismatch {
                        flag: flag.to_string(),
                        actual: actual.type_name(),
                        literal: literal.type_name(),
                    })
                }
            };
            Ok(if op == CompareOp::Eq { equal } else { !equal })
        }
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let a = actual.as_number().ok_or_else(|| EvalError::NotOrderable {
                flag: flag.to_string(),
                op,
                actual: actual.type_name(),
            })?;
            let b = literal.as_number().ok_or_else(|| EvalError::TypeMismatch {
                flag: flag.to_string(),
                actual: actual.type_name(),
                literal: literal.type_name(),
            })?;
            Ok(match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                _ => a >= b,
            })
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |f: &mut fmt::Formatter<'_>, name: &str, items: &[Condition]| {
            write!(f, "{}(", name)?;
            for (i, c) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, ")")
        };
        match self {
            Condition::Always => write!(f, "always"),
            Condition::All(items) => list(f, "all", items),
            Condition::Any(items) => list(f, "any", items),
            Condition::Not(inner) => write!(f, "not({})", inner),
            Condition::Flag(t) => write!(f, "{}.{} {} {}", t.of, t.name, t.op, t.value),
            Condition::Kind(t) => write!(f, "{}.kind == {}", t.of, t.is),
            Condition::CrossesBoundary(b) => write!(f, "crosses_boundary == {}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_model::{BoundarySpec, DataflowSpec, ElementSpec, ModelBuilder};

    fn flag(name: &str, value: impl Into<FlagValue>) -> Condition {
        Condition::Flag(FlagTest {
            name: name.to_string(),
            of: Scope::Target,
            op: CompareOp::Eq,
            value: value.into(),
        })
    }

    fn flag_of(scope: Scope, name: &str, value: impl Into<FlagValue>) -> Condition {
        Condition::Flag(FlagTest {
            name: name.to_string(),
            of: scope,
            op: CompareOp::Eq,
            value: value.into(),
        })
    }

    fn model() -> ThreatModel {
        let mut b = ModelBuilder::new("m");
        let internet = b
            .add_boundary(
                BoundarySpec::new("Internet")
                    .with_id("internet")
                    .control("isPublic", true),
            )
            .unwrap();
        let vpc = b
            .add_boundary(BoundarySpec::new("VPC").with_id("vpc"))
            .unwrap();
        let user = b
            .add_element(ElementSpec::actor("User").with_id("user").in_boundary(&internet))
            .unwrap();
        let agent = b
            .add_element(
                ElementSpec::server("Agent")
                    .with_id("agent")
                    .in_boundary(&vpc)
                    .control("isHardened", true),
            )
            .unwrap();
        b.add_element(ElementSpec::datastore("Loose").with_id("loose"))
            .unwrap();
        b.add_dataflow(
            DataflowSpec::new(&user, &agent, "prompt")
                .with_id("prompt")
                .control("dstPort", 443_i64),
        )
        .unwrap();
        b.build()
    }

    fn element<'a>(m: &'a ThreatModel, id: &str) -> Subject<'a> {
        Subject::Element(m.element(&id.into()).unwrap())
    }

    fn flow<'a>(m: &'a ThreatModel, id: &str) -> Subject<'a> {
        Subject::Dataflow(m.dataflow(&id.into()).unwrap())
    }

    #[test]
    fn flag_equality_reads_explicit_and_default_values() {
        let m = model();
        assert!(flag("isHardened", true)
            .evaluate(&m, element(&m, "agent"))
            .unwrap());
        assert!(flag("sanitizesInput", false)
            .evaluate(&m, element(&m, "agent"))
            .unwrap());
        assert!(flag("isEncrypted", false)
            .evaluate(&m, flow(&m, "prompt"))
            .unwrap());
    }

    #[test]
    fn combinators() {
        let m = model();
        let agent = element(&m, "agent");
        let cond = Condition::All(vec![
            flag("isHardened", true),
            Condition::Not(Box::new(flag("sanitizesInput", true))),
        ]);
        assert!(cond.evaluate(&m, agent).unwrap());
        let cond = Condition::Any(vec![flag("isHardened", false), flag("encryption", true)]);
        assert!(!cond.evaluate(&m, agent).unwrap());
        assert!(Condition::All(vec![]).evaluate(&m, agent).unwrap());
        assert!(!Condition::Any(vec![]).evaluate(&m, agent).unwrap());
    }

    #[test]
    fn boundary_scope_reads_containing_boundary_or_defaults() {
        let m = model();
        let cond = flag_of(Scope::Boundary, "isPublic", true);
        assert!(cond.evaluate(&m, element(&m, "user")).unwrap());
        assert!(!cond.evaluate(&m, element(&m, "agent")).unwrap());
        assert!(!cond.evaluate(&m, element(&m, "loose")).unwrap());
    }

    #[test]
    fn endpoint_scopes_and_kind_tests() {
        let m = model();
        let f = flow(&m, "prompt");
        assert!(flag_of(Scope::Destination, "isHardened", true)
            .evaluate(&m, f)
            .unwrap());
        let kind = Condition::Kind(KindTest {
            of: Scope::Source,
            is: ElementKind::Actor,
        });
        assert!(kind.evaluate(&m, f).unwrap());
        assert!(Condition::CrossesBoundary(true).evaluate(&m, f).unwrap());
    }

    #[test]
    fn numeric_ordering() {
        let m = model();
        let cond = Condition::Flag(FlagTest {
            name: "dstPort".into(),
            of: Scope::Target,
            op: CompareOp::Ge,
            value: FlagValue::Number(443.0),
        });
        assert!(cond.evaluate(&m, flow(&m, "prompt")).unwrap());
    }

    #[test]
    fn source_scope_on_element_is_an_error() {
        let m = model();
        let err = flag_of(Scope::Source, "isHardened", true)
            .evaluate(&m, element(&m, "agent"))
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::ScopeUnavailable {
                scope: Scope::Source,
                target: TargetKind::Element
            }
        );
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let m = model();
        let err = flag("isEncrypted", "yes")
            .evaluate(&m, flow(&m, "prompt"))
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn ordering_on_bool_is_an_error() {
        let m = model();
        let cond = Condition::Flag(FlagTest {
            name: "isEncrypted".into(),
            of: Scope::Target,
            op: CompareOp::Lt,
            value: FlagValue::Number(1.0),
        });
        let err = cond.evaluate(&m, flow(&m, "prompt")).unwrap_err();
        assert!(matches!(err, EvalError::NotOrderable { .. }));
    }

    #[test]
    fn crosses_boundary_on_element_is_an_error() {
        let m = model();
        assert!(Condition::CrossesBoundary(true)
            .evaluate(&m, element(&m, "agent"))
            .is_err());
    }

    #[test]
    fn trace_records_evaluated_leaves_only() {
        let m = model();
        let cond = Condition::All(vec![flag("isHardened", false), flag("isResilient", false)]);
        let (outcome, steps) = cond.evaluate_traced(&m, element(&m, "agent")).unwrap();
        assert!(!outcome);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].check, "target.isHardened == false");
        assert_eq!(steps[0].actual, "true");
    }

    #[test]
    fn trace_marks_default_values() {
        let m = model();
        let (_, steps) = flag("isResilient", false)
            .evaluate_traced(&m, element(&m, "agent"))
            .unwrap();
        assert_eq!(steps[0].actual, "false (default)");
    }

    #[test]
    fn parses_from_yaml() {
        let yaml = r#"
all:
  - crosses_boundary: true
  - flag: { name: isEncrypted, value: false }
  - not:
      flag: { name: sanitizesInput, of: destination, value: true }
  - kind: { of: source, is: actor }
"#;
        let cond = Condition::from_yaml_str(yaml).unwrap();
        assert_eq!(cond.referenced_flags(), vec!["isEncrypted", "sanitizesInput"]);
        assert_eq!(
            cond.to_string(),
            "all(crosses_boundary == true, target.isEncrypted == false, \
             not(destination.sanitizesInput == true), source.kind == actor)"
        );
    }

    #[test]
    fn always_parses_as_bare_string() {
        let cond = Condition::from_yaml_str("always").unwrap();
        assert_eq!(cond, Condition::Always);
    }
}
