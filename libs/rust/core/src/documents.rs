//! Job documents persisted by the configuration store.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MalformedConfigError, StoreError};
use crate::tensor::{infer_spec, ElementType, ParameterSpec};

/// Identifier of one training job. Also names the job's storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Result<Self, StoreError> {
        let value = value.into();
        let invalid = value.is_empty()
            || value == "."
            || value == ".."
            || value.contains(['/', '\\'])
            || value.chars().any(char::is_control);
        if invalid {
            return Err(StoreError::InvalidJobId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three documents kept per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    LocalTraining,
    FederatedTraining,
    Model,
}

impl DocumentKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::LocalTraining => "local_training",
            Self::FederatedTraining => "federated_training",
            Self::Model => "model",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::LocalTraining => "local_training.json",
            Self::FederatedTraining => "federated_training.json",
            Self::Model => "model.json",
        }
    }
}

/// Local (on-device) hyperparameters in the order the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalConfig(Map<String, Value>);

impl LocalConfig {
    pub fn from_value(value: Value) -> Result<Self, MalformedConfigError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(MalformedConfigError::new(
                DocumentKind::LocalTraining.name(),
                format!("expected a mapping, found {}", json_kind(&other)),
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Round count configured for local training, if any.
    pub fn rounds(&self) -> Option<u64> {
        self.0.get("rounds").and_then(Value::as_u64)
    }
}

/// Job-level metadata for the federated procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedConfig {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u64>,
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default, rename = "return")]
    pub output: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobConfiguration {
    pub local: LocalConfig,
    pub federated: FederatedConfig,
}

impl JobConfiguration {
    pub fn job_id(&self) -> &JobId {
        &self.federated.job_id
    }

    /// Rounds to run locally, falling back to the federated round count.
    pub fn rounds(&self) -> Option<u64> {
        self.local.rounds().or(self.federated.rounds)
    }
}

/// Expected parameter structure of a job's model, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSnapshot {
    entries: Vec<(String, ParameterSpec)>,
    index: HashMap<String, usize>,
}

impl ModelSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter. A replaced parameter keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, spec: ParameterSpec) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = spec,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, spec));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterSpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derive a snapshot from raw parameter values (name → nested array).
    pub fn from_tensors(model: &Map<String, Value>) -> Result<Self, MalformedConfigError> {
        let mut snapshot = Self::new();
        for (name, value) in model {
            let spec = infer_spec(value).map_err(|e| {
                MalformedConfigError::new(DocumentKind::Model.name(), format!("parameter {name}: {e}"))
            })?;
            snapshot.insert(name.clone(), spec);
        }
        Ok(snapshot)
    }

    /// Read a persisted model document. Each entry is either a `{shape, dtype}` spec or raw values.
    pub fn from_document(document: &Value) -> Result<Self, MalformedConfigError> {
        let malformed = |reason: String| MalformedConfigError::new(DocumentKind::Model.name(), reason);
        let map = document
            .as_object()
            .ok_or_else(|| malformed(format!("expected a mapping, found {}", json_kind(document))))?;

        let mut snapshot = Self::new();
        for (name, entry) in map {
            let spec = match entry {
                Value::Object(fields) => parse_spec(fields).map_err(|e| malformed(format!("parameter {name}: {e}")))?,
                values => infer_spec(values).map_err(|e| malformed(format!("parameter {name}: {e}")))?,
            };
            snapshot.insert(name.clone(), spec);
        }
        Ok(snapshot)
    }

    pub fn to_document(&self) -> Value {
        let map = self
            .entries
            .iter()
            .map(|(name, spec)| {
                let mut fields = Map::new();
                fields.insert("shape".into(), Value::from(spec.shape.clone()));
                fields.insert("dtype".into(), Value::from(spec.dtype.as_str()));
                (name.clone(), Value::Object(fields))
            })
            .collect();
        Value::Object(map)
    }
}

fn parse_spec(fields: &Map<String, Value>) -> Result<ParameterSpec, String> {
    let shape = fields
        .get("shape")
        .and_then(Value::as_array)
        .ok_or("missing shape")?
        .iter()
        .map(|dim| dim.as_u64().map(|d| d as usize).ok_or("shape entries must be non-negative integers"))
        .collect::<Result<Vec<_>, _>>()?;
    let dtype = fields
        .get("dtype")
        .and_then(Value::as_str)
        .ok_or("missing dtype")?
        .parse::<ElementType>()?;
    Ok(ParameterSpec::new(shape, dtype))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
