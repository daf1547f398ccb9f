//! Result model shared by the session controller, the renderer and the bridge.
//!
//! Identifiers are opaque strings owned by the engine's catalog. Results are
//! immutable once received: the controller wraps them and never re-sorts,
//! filters or deduplicates what the engine returned.
//!
//! Raw engine responses pass through [`DiagnosisResult::from_wire`] and
//! [`VerificationResult::from_wire`], which reject unexpected shapes instead of
//! letting undefined fields flow downstream.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable identifier of an observable symptom, unique within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomId(String);

/// Stable identifier of a diagnosable conclusion, unique within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConclusionId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(SymptomId);
string_id!(ConclusionId);

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One inference step: a rule whose antecedents matched the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredRule {
    pub rule_id: String,
    /// Matched antecedents, in the order the engine reported them.
    pub conditions: Vec<SymptomId>,
    pub conclusion: ConclusionId,
    /// Advisory attached to the conclusion. `None` means nothing to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precautions: Option<String>,
}

/// Outcome of forward chaining. An empty `fired_rules` means the rule base
/// found no conclusion for the selection; it is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    /// Engine firing order.
    pub fired_rules: Vec<FiredRule>,
}

impl DiagnosisResult {
    pub fn is_empty(&self) -> bool {
        self.fired_rules.is_empty()
    }

    /// Fired rules that carry an advisory, in firing order.
    pub fn reports(&self) -> impl Iterator<Item = &FiredRule> {
        self.fired_rules.iter().filter(|r| r.precautions.is_some())
    }
}

/// Outcome of backward verification. Both verdicts are complete results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    /// Reasoning steps in engine order.
    pub trace: Vec<String>,
}

/// Either kind of analysis result, as kept by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    Diagnosis(DiagnosisResult),
    Verification {
        target: ConclusionId,
        #[serde(flatten)]
        result: VerificationResult,
    },
}

// ---------------------------------------------------------------------------
// Boundary validation
// ---------------------------------------------------------------------------

/// Why a raw engine response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError(pub String);

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn field<'a>(
    obj: &'a serde_json::Map<String, serde_json::Value>,
    name: &str,
    ctx: &str,
) -> Result<&'a serde_json::Value, ShapeError> {
    obj.get(name)
        .ok_or_else(|| ShapeError(format!("{ctx}: missing field `{name}`")))
}

fn non_empty_string(value: &serde_json::Value, ctx: &str) -> Result<String, ShapeError> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(ShapeError(format!("{ctx}: empty string"))),
        None => Err(ShapeError(format!("{ctx}: expected a string, got {value}"))),
    }
}

fn string_list(value: &serde_json::Value, ctx: &str) -> Result<Vec<String>, ShapeError> {
    let items = value
        .as_array()
        .ok_or_else(|| ShapeError(format!("{ctx}: expected an array, got {value}")))?;
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ShapeError(format!("{ctx}[{i}]: expected a string, got {v}")))
        })
        .collect()
}

impl FiredRule {
    fn from_wire(value: &serde_json::Value, index: usize) -> Result<Self, ShapeError> {
        let ctx = format!("fired_rules[{index}]");
        let obj = value
            .as_object()
            .ok_or_else(|| ShapeError(format!("{ctx}: expected an object")))?;

        let rule_id = non_empty_string(field(obj, "rule_id", &ctx)?, &format!("{ctx}.rule_id"))?;
        let conditions = string_list(
            field(obj, "conditions", &ctx)?,
            &format!("{ctx}.conditions"),
        )?
        .into_iter()
        .map(SymptomId::from)
        .collect();
        let conclusion = non_empty_string(
            field(obj, "conclusion", &ctx)?,
            &format!("{ctx}.conclusion"),
        )?;

        let precautions = match obj.get("precautions") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(ShapeError(format!(
                    "{ctx}.precautions: expected a string, got {other}"
                )));
            }
        };

        Ok(Self {
            rule_id,
            conditions,
            conclusion: ConclusionId::new(conclusion),
            precautions,
        })
    }
}

impl DiagnosisResult {
    /// Validate a raw forward-chaining response.
    ///
    /// Extra fields (such as `known_facts`) are ignored.
    pub fn from_wire(value: &serde_json::Value) -> Result<Self, ShapeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ShapeError("diagnosis response: expected an object".into()))?;
        let rules = field(obj, "fired_rules", "diagnosis response")?
            .as_array()
            .ok_or_else(|| ShapeError("diagnosis response: `fired_rules` is not an array".into()))?;

        let fired_rules = rules
            .iter()
            .enumerate()
            .map(|(i, r)| FiredRule::from_wire(r, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { fired_rules })
    }
}

impl VerificationResult {
    /// Validate a raw backward-verification response.
    pub fn from_wire(value: &serde_json::Value) -> Result<Self, ShapeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ShapeError("verification response: expected an object".into()))?;
        let success = field(obj, "success", "verification response")?
            .as_bool()
            .ok_or_else(|| ShapeError("verification response: `success` is not a bool".into()))?;
        let trace = string_list(
            field(obj, "trace", "verification response")?,
            "verification response.trace",
        )?;
        Ok(Self { success, trace })
    }
}

/// Validate a raw catalog listing.
pub fn ids_from_wire<T: From<String>>(
    value: &serde_json::Value,
    what: &str,
) -> Result<Vec<T>, ShapeError> {
    Ok(string_list(value, what)?.into_iter().map(T::from).collect())
}
