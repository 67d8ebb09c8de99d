//! Model state checker: decides whether a training payload may proceed.
//!
//! Passes run in a fixed order (presence, local, model structure, extraneous parameters) and the
//! first failure aborts the check.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::documents::{LocalConfig, ModelSnapshot};
use crate::error::{ConsistencyError, MalformedConfigError};
use crate::tensor::infer_spec;

/// Immutable view of one job's registered local config and model structure.
#[derive(Debug, Clone)]
pub struct ModelStateChecker {
    local: LocalConfig,
    snapshot: ModelSnapshot,
}

impl ModelStateChecker {
    pub fn new(local: LocalConfig, snapshot: ModelSnapshot) -> Self {
        Self { local, snapshot }
    }

    /// Build from the persisted JSON text of the local and model documents.
    pub fn from_json(local_raw: &str, model_raw: &str) -> Result<Self, MalformedConfigError> {
        let local: Value = serde_json::from_str(local_raw).map_err(|e| undecodable("local_training", e))?;
        let model: Value = serde_json::from_str(model_raw).map_err(|e| undecodable("model", e))?;
        Self::from_documents(local, &model)
    }

    pub fn from_documents(local: Value, model: &Value) -> Result<Self, MalformedConfigError> {
        let local = LocalConfig::from_value(local)?;
        let snapshot = ModelSnapshot::from_document(model)?;
        Ok(Self::new(local, snapshot))
    }

    pub fn snapshot(&self) -> &ModelSnapshot {
        &self.snapshot
    }

    pub fn local(&self) -> &LocalConfig {
        &self.local
    }

    /// Verify `payload` against the registered state. Reports only the first violation.
    pub fn verify(&self, payload: &Value) -> Result<(), ConsistencyError> {
        let local = required_mapping(payload, "local")?;
        let model = required_mapping(payload, "model")?;

        self.check_training_information(local)?;
        debug!("checked_training_information");
        self.check_model_consistency(model)?;
        debug!("checked_model_consistency");
        Ok(())
    }

    fn check_training_information(&self, incoming: &Map<String, Value>) -> Result<(), ConsistencyError> {
        for (key, got) in incoming {
            let Some(expected) = self.local.get(key) else {
                warn!(%key, "unknown_local_parameter");
                return Err(ConsistencyError::UnknownParameter { key: key.clone() });
            };
            if !values_match(expected, got) {
                warn!(%key, %expected, %got, "local_value_mismatch");
                return Err(ConsistencyError::ValueMismatch {
                    key: key.clone(),
                    expected: expected.clone(),
                    got: got.clone(),
                });
            }
            debug!(%key, "local_parameter_consistent");
        }
        Ok(())
    }

    fn check_model_consistency(&self, incoming: &Map<String, Value>) -> Result<(), ConsistencyError> {
        for (name, expected) in self.snapshot.iter() {
            let Some(values) = incoming.get(name) else {
                warn!(%name, "missing_model_parameter");
                return Err(ConsistencyError::MissingParameter { name: name.to_string() });
            };
            let got = infer_spec(values).map_err(|reason| {
                warn!(%name, %reason, "invalid_model_tensor");
                ConsistencyError::InvalidTensor { name: name.to_string(), reason }
            })?;
            if got.dtype != expected.dtype {
                warn!(%name, expected = %expected.dtype, got = %got.dtype, "model_type_mismatch");
                return Err(ConsistencyError::TypeMismatch {
                    name: name.to_string(),
                    expected: expected.dtype,
                    got: got.dtype,
                });
            }
            if got.shape != expected.shape {
                warn!(%name, expected = ?expected.shape, got = ?got.shape, "model_shape_mismatch");
                return Err(ConsistencyError::ShapeMismatch {
                    name: name.to_string(),
                    expected: expected.shape.clone(),
                    got: got.shape,
                });
            }
            debug!(%name, "model_parameter_consistent");
        }

        if let Some(name) = incoming.keys().find(|name| !self.snapshot.contains(name)) {
            warn!(%name, "unexpected_model_parameter");
            return Err(ConsistencyError::UnexpectedParameter { name: name.clone() });
        }
        info!(parameters = self.snapshot.len(), "model_consistency_check_completed");
        Ok(())
    }
}

fn undecodable(document: &'static str, err: serde_json::Error) -> MalformedConfigError {
    error!(document, error = %err, "document_decode_failed");
    MalformedConfigError::new(document, err.to_string())
}

fn required_mapping<'a>(payload: &'a Value, field: &'static str) -> Result<&'a Map<String, Value>, ConsistencyError> {
    payload.get(field).and_then(Value::as_object).ok_or_else(|| {
        warn!(field, "missing_payload_field");
        ConsistencyError::MissingField { field }
    })
}

/// Structural equality where integers and floats of equal value match (`512 == 512.0`).
pub fn values_match(expected: &Value, got: &Value) -> bool {
    match (expected, got) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        (Value::Array(a), Value::Array(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y)),
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(k, x)| b.get(k).is_some_and(|y| values_match(x, y)))
        }
        _ => expected == got,
    }
}
