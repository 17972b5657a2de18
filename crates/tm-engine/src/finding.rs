// finding.rs - Findings: the outcome of one threat on one target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tm_model::TargetRef;

/// How a finding has been dispositioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Matched automatically and not yet addressed.
    #[default]
    Unmitigated,
    Mitigated,
    /// Risk knowingly accepted.
    Accepted,
    /// Judged not applicable.
    Rejected,
}

impl Response {
    pub const ALL: [Response; 4] = [
        Response::Unmitigated,
        Response::Mitigated,
        Response::Accepted,
        Response::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Response::Unmitigated => "unmitigated",
            Response::Mitigated => "mitigated",
            Response::Accepted => "accepted",
            Response::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Response {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Response::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown response '{}' (expected unmitigated, mitigated, accepted or rejected)",
                    s
                )
            })
    }
}

/// Where a final finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Produced by the matcher, no override.
    Matched,
    /// Produced by the matcher, then overridden.
    Overridden,
    /// Asserted by an override with no matching candidate.
    Manual,
}

/// The resolved outcome of matching one threat against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub threat_id: String,
    pub target: TargetRef,
    pub response: Response,
    /// CVSS-style score, 0.0 to 10.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<f32>,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Finding {
    /// Deterministic id for an automatic finding, keyed by the pair rather
    /// than by evaluation order.
    pub fn candidate_id(threat_id: &str, target: &TargetRef) -> String {
        format!("{}:{}", threat_id, target.id)
    }

    /// An automatic, unmitigated finding.
    pub fn candidate(threat_id: &str, target: TargetRef, severity: Option<f32>) -> Self {
        Self {
            id: Self::candidate_id(threat_id, &target),
            threat_id: threat_id.to_string(),
            target,
            response: Response::Unmitigated,
            severity,
            origin: Origin::Matched,
            notes: None,
        }
    }
}
