//! Parameter specs and shape/type inference for nested JSON arrays.
//!
//! `infer_spec` is the only place a tensor's element type and shape are derived from raw values.
//! Promotion follows the reference tensor library: `bool < int64 < float32`, and a tensor
//! without any leaves defaults to `float32`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TensorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Bool,
    Uint8,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    Bfloat16,
    Float32,
    Float64,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float16 => "float16",
            Self::Bfloat16 => "bfloat16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    /// Accepts the canonical names plus `torch.`-prefixed and short aliases (`float`, `long`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().strip_prefix("torch.").unwrap_or(s.trim());
        let ty = match name.to_ascii_lowercase().as_str() {
            "bool" => Self::Bool,
            "uint8" => Self::Uint8,
            "int8" => Self::Int8,
            "int16" | "short" => Self::Int16,
            "int32" | "int" => Self::Int32,
            "int64" | "long" => Self::Int64,
            "float16" | "half" => Self::Float16,
            "bfloat16" => Self::Bfloat16,
            "float32" | "float" => Self::Float32,
            "float64" | "double" => Self::Float64,
            other => return Err(format!("unknown element type {other:?}")),
        };
        Ok(ty)
    }
}

/// Expected shape and element type of one named model parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub shape: Vec<usize>,
    pub dtype: ElementType,
}

impl ParameterSpec {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: ElementType) -> Self {
        Self { shape: shape.into(), dtype }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LeafKind {
    Bool,
    Int,
    Float,
}

/// Infer shape and element type of a scalar or (nested) array.
pub fn infer_spec(value: &Value) -> Result<ParameterSpec, TensorError> {
    let mut kind = None;
    let shape = walk(value, 0, &mut kind)?;
    let dtype = match kind {
        Some(LeafKind::Bool) => ElementType::Bool,
        Some(LeafKind::Int) => ElementType::Int64,
        Some(LeafKind::Float) | None => ElementType::Float32,
    };
    Ok(ParameterSpec::new(shape, dtype))
}

fn walk(value: &Value, depth: usize, kind: &mut Option<LeafKind>) -> Result<Vec<usize>, TensorError> {
    let leaf = match value {
        Value::Array(items) => {
            let mut inner: Option<Vec<usize>> = None;
            for item in items {
                let shape = walk(item, depth + 1, kind)?;
                match &inner {
                    None => inner = Some(shape),
                    Some(expected) if *expected != shape => return Err(TensorError::Ragged { depth: depth + 1 }),
                    Some(_) => {}
                }
            }
            let mut shape = Vec::with_capacity(1 + inner.as_ref().map_or(0, Vec::len));
            shape.push(items.len());
            shape.extend(inner.unwrap_or_default());
            return Ok(shape);
        }
        Value::Bool(_) => LeafKind::Bool,
        Value::Number(n) if n.is_f64() => LeafKind::Float,
        Value::Number(n) => match n.as_u64() {
            Some(v) if v > i64::MAX as u64 => return Err(TensorError::IntegerOverflow { value: v }),
            _ => LeafKind::Int,
        },
        Value::Null => return Err(TensorError::NonNumeric { found: "null" }),
        Value::String(_) => return Err(TensorError::NonNumeric { found: "string" }),
        Value::Object(_) => return Err(TensorError::NonNumeric { found: "object" }),
    };
    *kind = Some(kind.map_or(leaf, |k| k.max(leaf)));
    Ok(Vec::new())
}
