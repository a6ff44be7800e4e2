//! Validation of bound records.
//!
//! A [`Validator`] looks at one field at a time and is run over every
//! descriptor once binding is complete. [`TagValidator`] interprets the
//! `validate` tag with a small rule set:
//!
//! | rule          | strings, lists | numbers         |
//! |---------------|----------------|-----------------|
//! | `required`    | not empty      | not zero        |
//! | `min=N`       | length >= N    | value >= N      |
//! | `max=N`       | length <= N    | value <= N      |
//! | `len=N`       | length == N    | value == N      |
//! | `oneof=a b c` | one of         | one of          |
//!
//! Rules are comma separated, `validate = "required,min=2"`. Absent optional
//! values only fail `required`.

use crate::descriptor::FieldDescriptor;
use crate::metadata::TypeMetadata;
use crate::record::{FieldRef, Record};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub trait Validator: Send + Sync {
    fn validate_field(&self, descriptor: &FieldDescriptor, field: FieldRef<'_>) -> Result<(), Violation>;
}

/// Runs `validator` over every described field of `record`, collecting all
/// violations.
pub fn validate<R: Record>(
    validator: &dyn Validator,
    metadata: &TypeMetadata<R>,
    record: &R,
) -> Result<(), ValidationError> {
    let mut violations = vec![];
    let Ok(()) = record.visit_fields(|index, field| {
        if let Some(descriptor) = metadata.descriptor_at(index)
            && let Err(violation) = validator.validate_field(descriptor, field)
        {
            violations.push(violation);
        }
        Ok::<_, Infallible>(())
    });

    if violations.is_empty() { Ok(()) } else { Err(ValidationError { violations }) }
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    field: &'static str,
    path: String,
    rule: String,
    reason: String,
}

impl Violation {
    pub fn new<P: ToString, R: ToString, S: ToString>(field: &'static str, path: P, rule: R, reason: S) -> Self {
        Self { field, path: path.to_string(), rule: rule.to_string(), reason: reason.to_string() }
    }

    fn of(descriptor: &FieldDescriptor, rule: &str, reason: impl ToString) -> Self {
        Self::new(descriptor.field_name(), descriptor.log_path(), rule, reason)
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The log path of the field, `query.name`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` fails `{}`: {}", self.path, self.rule, self.reason)
    }
}

/// Every violation found in a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", join(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

fn join(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "no violation".to_owned();
    }
    violations.iter().map(Violation::to_string).collect::<Vec<_>>().join("; ")
}

/// Interprets the `validate` tag of each field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagValidator;

impl Validator for TagValidator {
    fn validate_field(&self, descriptor: &FieldDescriptor, field: FieldRef<'_>) -> Result<(), Violation> {
        let Some(rules) = descriptor.validate() else {
            return Ok(());
        };
        if matches!(field, FieldRef::Opaque(_)) {
            return Ok(());
        }

        let value = field.to_json();
        for rule in rules.split(',').map(str::trim).filter(|rule| !rule.is_empty()) {
            let (name, param) = rule.split_once('=').unwrap_or((rule, ""));
            match name {
                "required" => {
                    if field.is_zero() {
                        return Err(Violation::of(descriptor, rule, "value is required"));
                    }
                }
                _ if value.is_null() => {}
                "min" | "max" | "len" => check_bound(descriptor, rule, name, param, &value)?,
                "oneof" => check_oneof(descriptor, rule, param, &value)?,
                unknown => warn!(field = descriptor.field_name(), rule = unknown, "unknown validation rule"),
            }
        }
        Ok(())
    }
}

fn check_bound(
    descriptor: &FieldDescriptor,
    rule: &str,
    name: &str,
    param: &str,
    value: &Value,
) -> Result<(), Violation> {
    let Ok(limit) = param.parse::<f64>() else {
        warn!(field = descriptor.field_name(), rule, "invalid validation rule parameter");
        return Ok(());
    };

    let (measured, what) = match value {
        Value::String(s) => (s.chars().count() as f64, "length"),
        Value::Array(items) => (items.len() as f64, "length"),
        Value::Number(n) => match n.as_f64() {
            Some(n) => (n, "value"),
            None => return Ok(()),
        },
        _ => return Ok(()),
    };

    let ok = match name {
        "min" => measured >= limit,
        "max" => measured <= limit,
        _ => (measured - limit).abs() < f64::EPSILON,
    };
    if ok {
        Ok(())
    } else {
        Err(Violation::of(descriptor, rule, format!("{what} is {measured}")))
    }
}

fn check_oneof(descriptor: &FieldDescriptor, rule: &str, param: &str, value: &Value) -> Result<(), Violation> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Ok(()),
    };

    if param.split_whitespace().any(|allowed| allowed == text) {
        Ok(())
    } else {
        Err(Violation::of(descriptor, rule, format!("`{text}` is not allowed")))
    }
}
