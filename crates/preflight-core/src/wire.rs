//! Wire-level type tags for bound parameters

use serde::{Deserialize, Serialize};

use crate::Value;

/// Element type of a typed SQL array parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayElement {
    Int4,
    Int8,
    Text,
}

impl ArrayElement {
    /// Infer the element type of an untyped array from its first element
    ///
    /// Narrow integers map to `Int4`, `Int64` to `Int8`, anything else
    /// (including an empty array) to `Text`.
    pub fn infer(items: &[Value]) -> Self {
        match items.first() {
            Some(Value::Int8(_) | Value::Int16(_) | Value::Int32(_)) => Self::Int4,
            Some(Value::Int64(_)) => Self::Int8,
            _ => Self::Text,
        }
    }

    /// PostgreSQL name of the element type
    pub fn pg_name(&self) -> &'static str {
        match self {
            Self::Int4 => "int4",
            Self::Int8 => "int8",
            Self::Text => "text",
        }
    }
}

/// Explicit wire type attached to a parameter binding
///
/// When a caller binds a value with an explicit type, the tag is recorded and
/// takes precedence over the runtime type of the value when the statement is
/// re-bound for EXPLAIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    Null,
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Text,
    Varchar,
    Bytea,
    Uuid,
    Json,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Array(ArrayElement),
}

impl WireType {
    /// PostgreSQL type name for this wire type
    pub fn pg_name(&self) -> &'static str {
        match self {
            Self::Null => "unknown",
            Self::Boolean => "bool",
            Self::SmallInt => "int2",
            Self::Integer => "int4",
            Self::BigInt => "int8",
            Self::Real => "float4",
            Self::Double => "float8",
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Varchar => "varchar",
            Self::Bytea => "bytea",
            Self::Uuid => "uuid",
            Self::Json => "json",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Array(ArrayElement::Int4) => "_int4",
            Self::Array(ArrayElement::Int8) => "_int8",
            Self::Array(ArrayElement::Text) => "_text",
        }
    }

    /// Returns true for array wire types
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}

impl std::fmt::Display for WireType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pg_name())
    }
}

#[cfg(test)]
mod tests;
