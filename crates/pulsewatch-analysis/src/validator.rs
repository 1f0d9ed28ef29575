//! Result validator: the gate between analysis output and durable storage.
//!
//! Walks every `ok` unit payload in a consolidated insight against that
//! unit's registered schema. Validation is all-or-nothing for the whole
//! insight: one malformed payload rejects the record, because a malformed
//! nested structure downstream is worse than a delayed record. `failed`
//! unit entries pass through untouched — a recorded failure is a
//! legitimate, storable outcome.

use serde_json::Value;

use pulsewatch_core::types::{AnalysisUnitResult, ConsolidatedInsight};

use crate::error::ValidationError;
use crate::schema::{FieldKind, FieldSpec};
use crate::units::unit_by_id;

/// Validates a consolidated insight against the registered unit schemas.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found; the caller must not commit
/// the insight in that case.
pub fn validate(insight: &ConsolidatedInsight) -> Result<(), ValidationError> {
    for (unit_id, result) in &insight.results {
        let AnalysisUnitResult::Ok { payload } = result else {
            continue;
        };
        let unit = unit_by_id(unit_id).ok_or_else(|| ValidationError::UnknownUnit {
            unit: unit_id.clone(),
        })?;
        check_fields(unit_id, "", unit.schema, payload)?;
    }
    Ok(())
}

/// Checks a JSON object against a field list. Fields not named in the spec
/// are ignored: the contract pins what must be present and well-typed, not
/// what else the service may volunteer.
fn check_fields(
    unit: &str,
    prefix: &str,
    fields: &[FieldSpec],
    value: &Value,
) -> Result<(), ValidationError> {
    let Value::Object(map) = value else {
        return Err(wrong_type(unit, prefix, "object"));
    };

    for field in fields {
        let path = join_path(prefix, field.name);
        match map.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(ValidationError::MissingField {
                        unit: unit.to_string(),
                        field: path,
                    });
                }
            }
            Some(v) => check_value(unit, &path, &field.kind, v)?,
        }
    }
    Ok(())
}

fn check_value(
    unit: &str,
    path: &str,
    kind: &FieldKind,
    value: &Value,
) -> Result<(), ValidationError> {
    match kind {
        FieldKind::String => {
            if !value.is_string() {
                return Err(wrong_type(unit, path, kind.expected_name()));
            }
        }
        FieldKind::Bool => {
            if !value.is_boolean() {
                return Err(wrong_type(unit, path, kind.expected_name()));
            }
        }
        FieldKind::Integer { min, max } => {
            let Some(n) = value.as_i64() else {
                return Err(wrong_type(unit, path, kind.expected_name()));
            };
            if let Some(min) = min {
                if n < *min {
                    return Err(out_of_range(unit, path, format!("{n} < {min}")));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(out_of_range(unit, path, format!("{n} > {max}")));
                }
            }
        }
        FieldKind::Number { min, max } => {
            let Some(n) = value.as_f64() else {
                return Err(wrong_type(unit, path, kind.expected_name()));
            };
            if let Some(min) = min {
                if n < *min {
                    return Err(out_of_range(unit, path, format!("{n} < {min}")));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(out_of_range(unit, path, format!("{n} > {max}")));
                }
            }
        }
        FieldKind::Array(elem) => {
            let Value::Array(items) = value else {
                return Err(wrong_type(unit, path, kind.expected_name()));
            };
            for (index, item) in items.iter().enumerate() {
                check_value(unit, &format!("{path}[{index}]"), elem, item)?;
            }
        }
        FieldKind::Object(fields) => check_fields(unit, path, fields, value)?,
    }
    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn wrong_type(unit: &str, field: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        unit: unit.to_string(),
        field: if field.is_empty() {
            "<payload>".to_string()
        } else {
            field.to_string()
        },
        expected,
    }
}

fn out_of_range(unit: &str, field: &str, reason: String) -> ValidationError {
    ValidationError::OutOfRange {
        unit: unit.to_string(),
        field: field.to_string(),
        reason,
    }
}
