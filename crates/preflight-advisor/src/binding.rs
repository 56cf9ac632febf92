//! Re-binding captured parameters onto an EXPLAIN statement
//!
//! Each captured [`BoundParam`] is mapped to a [`Binder`] that decides which
//! wire type the value is bound with. An explicit wire type recorded at
//! capture time always wins over the runtime type of the value.

use preflight_core::{ArrayElement, BoundParam, PreparedStatement, Result, Value, WireType};

/// How a single parameter is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binder {
    /// SQL NULL with the captured wire type, or an untyped NULL
    Null(WireType),
    /// Bind with the wire type recorded at capture time
    Explicit(WireType),
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Text,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Array(ArrayElement),
    /// No dedicated binder; the driver decides from the value itself
    PassThrough,
}

impl Binder {
    /// Wire type handed to the driver, `None` for pass-through
    pub fn wire_type(&self) -> Option<WireType> {
        match self {
            Self::Null(wire_type) | Self::Explicit(wire_type) => Some(*wire_type),
            Self::Boolean => Some(WireType::Boolean),
            Self::SmallInt => Some(WireType::SmallInt),
            Self::Integer => Some(WireType::Integer),
            Self::BigInt => Some(WireType::BigInt),
            Self::Real => Some(WireType::Real),
            Self::Double => Some(WireType::Double),
            Self::Numeric => Some(WireType::Numeric),
            Self::Text => Some(WireType::Text),
            Self::Date => Some(WireType::Date),
            Self::Time => Some(WireType::Time),
            Self::Timestamp => Some(WireType::Timestamp),
            Self::TimestampTz => Some(WireType::TimestampTz),
            Self::Array(element) => Some(WireType::Array(*element)),
            Self::PassThrough => None,
        }
    }
}

/// Pick the binder for `param`
pub fn select_binder(param: &BoundParam) -> Binder {
    if param.value.is_null() {
        return Binder::Null(param.wire_type.unwrap_or(WireType::Null));
    }
    if let Some(wire_type) = param.wire_type {
        return Binder::Explicit(wire_type);
    }

    match &param.value {
        Value::Bool(_) => Binder::Boolean,
        Value::Int8(_) | Value::Int16(_) => Binder::SmallInt,
        Value::Int32(_) => Binder::Integer,
        Value::Int64(_) => Binder::BigInt,
        Value::Float32(_) => Binder::Real,
        Value::Float64(_) => Binder::Double,
        Value::Decimal(_) => Binder::Numeric,
        Value::String(_) => Binder::Text,
        Value::Date(_) => Binder::Date,
        Value::Time(_) => Binder::Time,
        Value::DateTime(_) => Binder::Timestamp,
        Value::DateTimeUtc(_) => Binder::TimestampTz,
        Value::Array(items) => Binder::Array(ArrayElement::infer(items)),
        other => {
            tracing::debug!(
                position = param.position,
                kind = other.kind(),
                "no dedicated binder, passing value through"
            );
            Binder::PassThrough
        }
    }
}

/// Bind `param` onto `statement` using its selected binder
pub fn bind_param(statement: &mut dyn PreparedStatement, param: &BoundParam) -> Result<Binder> {
    let binder = select_binder(param);
    statement.bind(param.position, param.value.clone(), binder.wire_type())?;
    Ok(binder)
}

#[cfg(test)]
mod tests;
