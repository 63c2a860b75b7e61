use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One decoded unit of input: an open-ended mapping from field names to
/// dynamically-typed JSON values. Records move between pipeline stages by
/// value; whichever stage holds a record owns it exclusively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Field access that turns an absent field into a rejection instead of a
    /// panic or an unrelated type fault further down the chain.
    pub fn require(&self, key: &str) -> Result<&serde_json::Value, Rejection> {
        self.data.get(key).ok_or_else(|| Rejection::missing_field(key))
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, Rejection> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| Rejection::wrong_type(key, "number"))
    }

    pub fn require_str(&self, key: &str) -> Result<&str, Rejection> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| Rejection::wrong_type(key, "string"))
    }
}

/// A record that has passed every transform applied so far. Only fully
/// accepted results ever reach the output queue.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformResult {
    pub record: Record,
}

impl TransformResult {
    pub fn new(record: Record) -> Self {
        Self { record }
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

/// Why a record was dropped from the pipeline. Rejection is a normal
/// outcome, not an error: the record is discarded after optional debug
/// logging and never surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Name of the transform that rejected the record, stamped by the chain.
    pub op: String,
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            op: String::new(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(key: &str) -> Self {
        Self::new(format!("field '{}' is missing", key))
    }

    pub fn wrong_type(key: &str, expected: &str) -> Self {
        Self::new(format!("field '{}' is not a {}", key, expected))
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = op.into();
        self
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "rejected by '{}': {}", self.op, self.reason)
        }
    }
}
