//! Schema contracts for the pipeline gates.
//!
//! The registry is the single source of truth for what "valid" means at
//! each gate: one contract for the Meaning stage's problem specification,
//! one stricter contract for the Refinement stage's output. Contracts are
//! compiled once at startup; a missing or malformed contract is a fatal
//! startup error, never a per-call one. Validation itself is pure.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

pub const PROBLEM_SPECIFICATION: &str = "problem_specification";
pub const REFINED_SPECIFICATION: &str = "refined_specification";

const BUILTIN_CONTRACTS: [(&str, &str); 2] = [
    (PROBLEM_SPECIFICATION, include_str!("../contracts/problem_specification.json")),
    (REFINED_SPECIFICATION, include_str!("../contracts/refined_specification.json")),
];

#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("schema directory `{0}` could not be read")]
    MissingDirectory(PathBuf),
    #[error("could not read contract file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("contract file `{path}` is not valid JSON: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("contract `{name}` does not compile as a JSON schema: {detail}")]
    Compile { name: String, detail: String },
    #[error("required contract `{0}` is missing from the schema set")]
    MissingContract(&'static str),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("unknown schema contract `{0}`")]
    UnknownContract(String),
    #[error("schema validation failed: {0}")]
    Invalid(String),
}

/// Compiled, immutable schema set, looked up by contract name.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, JSONSchema>,
}

impl SchemaRegistry {
    /// Compile the contracts shipped with this crate.
    pub fn builtin() -> Result<Self, SchemaLoadError> {
        let mut schemas = BTreeMap::new();
        for (name, raw) in BUILTIN_CONTRACTS {
            let document: Value = serde_json::from_str(raw).map_err(|source| {
                SchemaLoadError::ParseFile { path: PathBuf::from(name), source }
            })?;
            schemas.insert(name.to_string(), compile(name, &document)?);
        }
        Ok(Self { schemas })
    }

    /// Load every `*.json` contract from a directory. The two required
    /// contracts must be present; anything unreadable is fatal.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, SchemaLoadError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|_| SchemaLoadError::MissingDirectory(dir.to_path_buf()))?;

        let mut schemas = BTreeMap::new();
        for entry in entries {
            let path = entry
                .map_err(|source| SchemaLoadError::ReadFile { path: dir.to_path_buf(), source })?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            let raw = fs::read_to_string(&path)
                .map_err(|source| SchemaLoadError::ReadFile { path: path.clone(), source })?;
            let document: Value = serde_json::from_str(&raw)
                .map_err(|source| SchemaLoadError::ParseFile { path: path.clone(), source })?;
            schemas.insert(name.clone(), compile(&name, &document)?);
        }

        for required in [PROBLEM_SPECIFICATION, REFINED_SPECIFICATION] {
            if !schemas.contains_key(required) {
                return Err(SchemaLoadError::MissingContract(required));
            }
        }

        Ok(Self { schemas })
    }

    /// Validate an instance against a named contract. Pure: same instance,
    /// same outcome, no I/O.
    pub fn validate(&self, instance: &Value, schema_name: &str) -> Result<(), SchemaViolation> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| SchemaViolation::UnknownContract(schema_name.to_string()))?;

        schema.validate(instance).map_err(|errors| {
            let details: Vec<String> = errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{path}: {error}")
                    }
                })
                .collect();
            SchemaViolation::Invalid(details.join("; "))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }
}

fn compile(name: &str, document: &Value) -> Result<JSONSchema, SchemaLoadError> {
    JSONSchema::compile(document).map_err(|error| SchemaLoadError::Compile {
        name: name.to_string(),
        detail: error.to_string(),
    })
}
