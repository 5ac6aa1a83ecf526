use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Class of optimization problem as reported by the Meaning stage.
///
/// The wire names follow the model contract (`"LP"`, `"Meta-Heuristics"`,
/// ...); `Unknown` is the canonical class for anything the model could not
/// ground in an optimization problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    #[serde(rename = "LP")]
    Lp,
    #[serde(rename = "MIP")]
    Mip,
    #[serde(rename = "NLP")]
    Nlp,
    Stochastic,
    Combinatorial,
    Network,
    #[serde(rename = "Meta-Heuristics")]
    MetaHeuristics,
    Unknown,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lp => "LP",
            Self::Mip => "MIP",
            Self::Nlp => "NLP",
            Self::Stochastic => "Stochastic",
            Self::Combinatorial => "Combinatorial",
            Self::Network => "Network",
            Self::MetaHeuristics => "Meta-Heuristics",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    Maximize,
    Minimize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Real,
    Integer,
    Binary,
}

/// A variable the user directly controls. `bounds` carries `[lower, upper]`
/// where either entry may be null (unbounded); an empty vector means the
/// model reported no bounds at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionVariable {
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub description: String,
    #[serde(default)]
    pub bounds: Vec<Option<f64>>,
}

impl DecisionVariable {
    pub fn has_bounds(&self) -> bool {
        !self.bounds.is_empty() && self.bounds.iter().any(Option::is_some)
    }
}

/// A variable derived from decision variables through `equation`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryVariable {
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub description: String,
    pub equation: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Inequality,
    Equality,
    Bound,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub expression: String,
    pub description: String,
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub domain: String,
    pub stakeholders: BTreeSet<String>,
    pub constraints: BTreeSet<String>,
}

/// Structured representation of one optimization problem, replaced wholesale
/// after every schema-valid Meaning turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpecification {
    pub problem_type: ProblemType,
    pub sense: Sense,
    pub objective: String,
    pub objective_description: String,
    pub decision_variables: BTreeMap<String, DecisionVariable>,
    pub auxiliary_variables: BTreeMap<String, AuxiliaryVariable>,
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    pub is_valid_problem: bool,
    pub confidence: f64,
    pub clarification: String,
    pub business_context: BusinessContext,
}

impl ProblemSpecification {
    /// Canonical shape for any turn that could not produce a usable
    /// specification: parse failures, schema violations, small talk. The
    /// reason lands in `clarification` so the conversation can continue.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            problem_type: ProblemType::Unknown,
            sense: Sense::Maximize,
            objective: String::new(),
            objective_description: String::new(),
            decision_variables: BTreeMap::new(),
            auxiliary_variables: BTreeMap::new(),
            constraints: Vec::new(),
            data: BTreeMap::new(),
            is_valid_problem: false,
            confidence: 0.0,
            clarification: reason.into(),
            business_context: BusinessContext {
                domain: "Unknown".to_string(),
                stakeholders: BTreeSet::new(),
                constraints: BTreeSet::new(),
            },
        }
    }

    /// Identifiers used in auxiliary equations that do not resolve to a
    /// decision variable. A grounding heuristic, not a gate: a non-empty
    /// result means the specification is not fully grounded yet.
    pub fn unresolved_auxiliary_references(&self) -> Vec<String> {
        let mut unresolved = BTreeSet::new();
        for auxiliary in self.auxiliary_variables.values() {
            for identifier in extract_identifiers(&auxiliary.equation) {
                if !self.decision_variables.contains_key(&identifier) {
                    unresolved.insert(identifier);
                }
            }
        }
        unresolved.into_iter().collect()
    }
}

fn extract_identifiers(expression: &str) -> Vec<String> {
    let mut identifiers = Vec::new();
    let mut current = String::new();

    for character in expression.chars() {
        let continues = character.is_ascii_alphanumeric() || character == '_';
        let starts = character.is_ascii_alphabetic() || character == '_';

        if current.is_empty() {
            if starts {
                current.push(character);
            }
        } else if continues {
            current.push(character);
        } else {
            identifiers.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        identifiers.push(current);
    }

    identifiers
}
