//! Attribute definitions for entities.

use serde::Serialize;

/// Scalar type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Microseconds since Unix epoch.
    Timestamp,
}

/// An attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    /// Attribute name.
    pub name: String,
    /// Attribute type.
    pub scalar: ScalarType,
    /// Whether the attribute may be null.
    pub nullable: bool,
}

impl FieldDef {
    /// Create a non-nullable attribute.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: false,
        }
    }

    /// Create a nullable attribute.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: true,
        }
    }
}
