//! Explicit schema descriptions for unit payloads.
//!
//! Each analysis unit registers a schema as plain values — field name,
//! expected type, optional numeric bounds — checked by the generic walker in
//! [`crate::validator`]. These schemas are the real wire contract of the
//! system and are versioned alongside each unit's instructions.

/// Expected type of one payload field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    Bool,
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Homogeneous array; every element must match the inner kind.
    Array(&'static FieldKind),
    /// Nested object with its own field specs.
    Object(&'static [FieldSpec]),
}

impl FieldKind {
    #[must_use]
    pub fn expected_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Number { .. } => "number",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }
}

/// One field of a unit payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: true,
            kind,
        }
    }

    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: false,
            kind,
        }
    }
}
