//! Builtin transforms and the CLI spec parser that instantiates them.
//!
//! Spec grammar, one op per spec string:
//!
//! ```text
//! reject-eq:FIELD=VALUE   drop the record when FIELD equals VALUE
//! drop:FIELD              remove FIELD if present
//! rename:FROM=TO          rename FROM to TO; rejects when FROM is absent
//! set:FIELD=VALUE         insert or overwrite FIELD with VALUE
//! ```
//!
//! VALUE parses as JSON first, falling back to a bare string, so
//! `reject-eq:id=557` compares numbers and `set:foo=bar` sets a string.

use crate::core::chain::Transform;
use crate::domain::model::{Record, Rejection};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Reject a record when `field` equals `value`. An absent field never
/// matches.
pub struct RejectEq {
    field: String,
    value: Value,
}

impl RejectEq {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

#[async_trait]
impl Transform for RejectEq {
    fn name(&self) -> &str {
        "reject-eq"
    }

    async fn apply(&self, record: &mut Record) -> std::result::Result<(), Rejection> {
        match record.get(&self.field) {
            Some(value) if *value == self.value => {
                Err(Rejection::new(format!("{} = {}", self.field, self.value)))
            }
            _ => Ok(()),
        }
    }
}

/// Remove a field from a record. Removing an absent field is a no-op.
pub struct DropField {
    field: String,
}

impl DropField {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[async_trait]
impl Transform for DropField {
    fn name(&self) -> &str {
        "drop"
    }

    async fn apply(&self, record: &mut Record) -> std::result::Result<(), Rejection> {
        record.remove(&self.field);
        Ok(())
    }
}

/// Rename a field. Rejects the record when the source field is absent,
/// rather than silently producing a record missing the renamed field.
pub struct RenameField {
    from: String,
    to: String,
}

impl RenameField {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[async_trait]
impl Transform for RenameField {
    fn name(&self) -> &str {
        "rename"
    }

    async fn apply(&self, record: &mut Record) -> std::result::Result<(), Rejection> {
        match record.remove(&self.from) {
            Some(value) => {
                record.insert(self.to.clone(), value);
                Ok(())
            }
            None => Err(Rejection::missing_field(&self.from)),
        }
    }
}

/// Insert or overwrite a field with a fixed value.
pub struct SetField {
    field: String,
    value: Value,
}

impl SetField {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

#[async_trait]
impl Transform for SetField {
    fn name(&self) -> &str {
        "set"
    }

    async fn apply(&self, record: &mut Record) -> std::result::Result<(), Rejection> {
        record.insert(self.field.clone(), self.value.clone());
        Ok(())
    }
}

/// Instantiate a transform from a CLI spec string.
pub fn from_spec(spec: &str) -> Result<Box<dyn Transform>> {
    let (kind, args) = spec
        .split_once(':')
        .ok_or_else(|| invalid(spec, "expected KIND:ARGS"))?;

    match kind {
        "reject-eq" => {
            let (field, raw) = split_pair(spec, args)?;
            Ok(Box::new(RejectEq::new(field, parse_value(raw))))
        }
        "drop" => {
            if args.is_empty() {
                return Err(invalid(spec, "expected a field name"));
            }
            Ok(Box::new(DropField::new(args)))
        }
        "rename" => {
            let (from, to) = split_pair(spec, args)?;
            if to.is_empty() {
                return Err(invalid(spec, "target field name is empty"));
            }
            Ok(Box::new(RenameField::new(from, to)))
        }
        "set" => {
            let (field, raw) = split_pair(spec, args)?;
            Ok(Box::new(SetField::new(field, parse_value(raw))))
        }
        other => Err(invalid(spec, format!("unknown transform kind '{}'", other))),
    }
}

fn split_pair<'a>(spec: &str, args: &'a str) -> Result<(&'a str, &'a str)> {
    let (left, right) = args
        .split_once('=')
        .ok_or_else(|| invalid(spec, "expected FIELD=VALUE"))?;
    if left.is_empty() {
        return Err(invalid(spec, "field name is empty"));
    }
    Ok((left, right))
}

// Bare words become JSON strings so `set:foo=bar` works without quoting.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn invalid(spec: &str, reason: impl Into<String>) -> EtlError {
    EtlError::InvalidTransformSpecError {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}
