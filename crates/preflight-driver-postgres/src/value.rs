//! Conversions between preflight values and PostgreSQL wire values

use std::fmt;

use bytes::{BufMut, BytesMut};
use preflight_core::{ArrayElement, PreflightError, Result, Value, WireType};
use tokio_postgres::Row as PgRow;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

type BoxError = Box<dyn std::error::Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_MAX_DSCALE: usize = 0x3FFF;

/// Owned parameter value that tokio-postgres can encode
///
/// The variant is chosen against the statement's parameter type so the
/// encoded width matches the server's expectation (4 bytes for INT4, not 8).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(PgNumeric),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    Int16Array(Vec<Option<i16>>),
    Int32Array(Vec<Option<i32>>),
    Int64Array(Vec<Option<i64>>),
    TextArray(Vec<Option<String>>),
}

/// Array element encodings the driver can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PgElement {
    Int2,
    Int4,
    Int8,
    Text,
}

impl From<ArrayElement> for PgElement {
    fn from(element: ArrayElement) -> Self {
        match element {
            ArrayElement::Int4 => PgElement::Int4,
            ArrayElement::Int8 => PgElement::Int8,
            ArrayElement::Text => PgElement::Text,
        }
    }
}

impl PgValue {
    /// Convert a bound parameter for a statement parameter of type `target`
    ///
    /// The server's parameter type decides scalar encodings. An explicit
    /// array wire type decides the element encoding when the server reports a
    /// non-array type for the position. Values that do not fit the target
    /// type are rejected rather than truncated.
    pub(crate) fn from_binding(
        value: &Value,
        wire_type: Option<WireType>,
        target: &Type,
    ) -> Result<Self> {
        match value {
            Value::Null => Ok(PgValue::Null),
            _ if wire_type == Some(WireType::Null) => Ok(PgValue::Null),
            Value::Array(items) => {
                let element = array_element_of(target)
                    .or(match wire_type {
                        Some(WireType::Array(element)) => Some(element.into()),
                        _ => None,
                    })
                    .unwrap_or_else(|| ArrayElement::infer(items).into());
                Self::array(items, element)
            }
            _ => Self::from_value_for_type(value, target),
        }
    }

    /// Convert a value for a parameter of the given target type
    pub(crate) fn from_value_for_type(value: &Value, target_type: &Type) -> Result<Self> {
        Ok(match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),

            Value::Int8(v) => Self::coerce_int(i64::from(*v), target_type)?,
            Value::Int16(v) => Self::coerce_int(i64::from(*v), target_type)?,
            Value::Int32(v) => Self::coerce_int(i64::from(*v), target_type)?,
            Value::Int64(v) => Self::coerce_int(*v, target_type)?,

            Value::Float32(v) => match *target_type {
                Type::FLOAT8 => PgValue::Float64(f64::from(*v)),
                Type::NUMERIC => PgValue::Numeric(PgNumeric::parse(&v.to_string())?),
                _ => PgValue::Float32(*v),
            },
            Value::Float64(v) => match *target_type {
                Type::FLOAT4 => PgValue::Float32(*v as f32),
                Type::NUMERIC => PgValue::Numeric(PgNumeric::parse(&v.to_string())?),
                _ => PgValue::Float64(*v),
            },

            Value::Decimal(v) => Self::coerce_decimal(v, target_type)?,
            Value::String(v) => Self::coerce_string(v, target_type)?,
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::Array(items) => Self::array(
                items,
                array_element_of(target_type)
                    .unwrap_or_else(|| ArrayElement::infer(items).into()),
            )?,
        })
    }

    /// Fallback used when the target parameter type is unknown
    pub(crate) fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int8(v) => PgValue::Int16(i16::from(*v)),
            Value::Int16(v) => PgValue::Int16(*v),
            Value::Int32(v) => PgValue::Int32(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) => PgValue::Numeric(PgNumeric::parse(v)?),
            Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::Array(items) => Self::array(items, ArrayElement::infer(items).into())?,
        })
    }

    fn array(items: &[Value], element: PgElement) -> Result<Self> {
        Ok(match element {
            PgElement::Int2 => PgValue::Int16Array(int_elements(items, "int2")?),
            PgElement::Int4 => PgValue::Int32Array(int_elements(items, "int4")?),
            PgElement::Int8 => PgValue::Int64Array(int_elements(items, "int8")?),
            PgElement::Text => PgValue::TextArray(
                items
                    .iter()
                    .map(|item| (!item.is_null()).then(|| item.to_string()))
                    .collect(),
            ),
        })
    }

    fn coerce_int(value: i64, target_type: &Type) -> Result<Self> {
        Ok(match *target_type {
            Type::INT2 => PgValue::Int16(narrow(value, "int2")?),
            Type::INT4 => PgValue::Int32(narrow(value, "int4")?),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            Type::NUMERIC => PgValue::Numeric(PgNumeric::parse(&value.to_string())?),
            Type::TEXT | Type::VARCHAR => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        })
    }

    /// Exact decimal text goes out as binary NUMERIC, or parsed for the
    /// numeric type the server asked for
    fn coerce_decimal(value: &str, target_type: &Type) -> Result<Self> {
        match *target_type {
            Type::NUMERIC => Ok(PgValue::Numeric(PgNumeric::parse(value)?)),
            Type::FLOAT4 | Type::FLOAT8 => {
                let parsed = value.trim().parse::<f64>().map_err(|_| {
                    PreflightError::Query(format!("decimal {value} is not a valid {target_type}"))
                })?;
                Self::from_value_for_type(&Value::Float64(parsed), target_type)
            }
            Type::INT2 | Type::INT4 | Type::INT8 => {
                let parsed = value.trim().parse::<i64>().map_err(|_| {
                    PreflightError::Query(format!("decimal {value} is not a valid {target_type}"))
                })?;
                Self::coerce_int(parsed, target_type)
            }
            _ => Ok(PgValue::String(value.to_string())),
        }
    }

    /// Coerce string literals into typed values when the statement declares a
    /// concrete parameter type
    fn coerce_string(value: &str, target_type: &Type) -> Result<Self> {
        let fallback = || PgValue::String(value.to_string());

        Ok(match *target_type {
            Type::NUMERIC => PgValue::Numeric(PgNumeric::parse(value)?),
            Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(value)
                .map(PgValue::Json)
                .unwrap_or_else(|_| fallback()),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| fallback()),
            Type::TIME => chrono::NaiveTime::parse_from_str(value, "%H:%M:%S")
                .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%H:%M:%S%.f"))
                .map(PgValue::Time)
                .unwrap_or_else(|_| fallback()),
            Type::TIMESTAMP => parse_naive_timestamp(value)
                .map(PgValue::DateTime)
                .unwrap_or_else(fallback),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
                .or_else(|| parse_naive_timestamp(value).map(|naive| naive.and_utc()))
                .map(PgValue::DateTimeUtc)
                .unwrap_or_else(fallback),
            Type::UUID => uuid::Uuid::parse_str(value)
                .map(PgValue::Uuid)
                .unwrap_or_else(|_| fallback()),
            Type::BOOL => match value.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => PgValue::Bool(true),
                "false" | "f" | "0" => PgValue::Bool(false),
                _ => fallback(),
            },
            _ => fallback(),
        })
    }
}

fn out_of_range(value: impl fmt::Display, pg_type: &str) -> PreflightError {
    PreflightError::Query(format!("value {value} out of range for {pg_type}"))
}

fn narrow<T: TryFrom<i64>>(value: i64, pg_type: &str) -> Result<T> {
    T::try_from(value).map_err(|_| out_of_range(value, pg_type))
}

fn int_elements<T: TryFrom<i64>>(items: &[Value], pg_type: &str) -> Result<Vec<Option<T>>> {
    items
        .iter()
        .map(|item| {
            if item.is_null() {
                return Ok(None);
            }
            let value = item.as_i64().ok_or_else(|| {
                PreflightError::Query(format!("array element {item} is not a valid {pg_type}"))
            })?;
            narrow(value, pg_type).map(Some)
        })
        .collect()
}

fn parse_naive_timestamp(value: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn array_element_of(ty: &Type) -> Option<PgElement> {
    match *ty {
        Type::INT2_ARRAY => Some(PgElement::Int2),
        Type::INT4_ARRAY => Some(PgElement::Int4),
        Type::INT8_ARRAY => Some(PgElement::Int8),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY | Type::NAME_ARRAY => {
            Some(PgElement::Text)
        }
        _ => None,
    }
}

/// A decimal in PostgreSQL's binary NUMERIC layout: base-10000 digit groups,
/// the weight of the first group, a sign word and the display scale
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PgNumeric {
    weight: i16,
    sign: u16,
    dscale: u16,
    digits: Vec<u16>,
}

impl PgNumeric {
    fn nan() -> Self {
        Self {
            weight: 0,
            sign: NUMERIC_NAN,
            dscale: 0,
            digits: Vec::new(),
        }
    }

    /// Parse plain decimal text such as `-12.50`, or `NaN`
    ///
    /// Exponents and infinities are rejected.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        let invalid = || PreflightError::Query(format!("invalid numeric value: {text:?}"));
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("nan") {
            return Ok(Self::nan());
        }

        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if integer.len() + fraction.len() == 0 || !all_digits(integer) || !all_digits(fraction) {
            return Err(invalid());
        }
        if fraction.len() > NUMERIC_MAX_DSCALE {
            return Err(invalid());
        }

        let integer = integer.trim_start_matches('0');
        let integer_groups = integer.len().div_ceil(4);
        let mut padded = "0".repeat(integer_groups * 4 - integer.len());
        padded.push_str(integer);
        padded.push_str(fraction);
        padded.push_str(&"0".repeat((4 - fraction.len() % 4) % 4));

        let mut digits: Vec<u16> = padded
            .as_bytes()
            .chunks(4)
            .map(|chunk| chunk.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0')))
            .collect();
        let mut weight = i32::try_from(integer_groups).map_err(|_| invalid())? - 1;

        let leading = digits.iter().take_while(|group| **group == 0).count();
        digits.drain(..leading);
        weight -= i32::try_from(leading).map_err(|_| invalid())?;
        while digits.last() == Some(&0) {
            digits.pop();
        }

        let weight = if digits.is_empty() {
            0
        } else {
            i16::try_from(weight).map_err(|_| invalid())?
        };
        let sign = if negative && !digits.is_empty() {
            NUMERIC_NEG
        } else {
            NUMERIC_POS
        };
        if i16::try_from(digits.len()).is_err() {
            return Err(invalid());
        }

        Ok(Self {
            weight,
            sign,
            dscale: fraction.len() as u16,
            digits,
        })
    }

    fn encode(&self, out: &mut BytesMut) {
        out.reserve(8 + self.digits.len() * 2);
        out.put_i16(self.digits.len() as i16);
        out.put_i16(self.weight);
        out.put_u16(self.sign);
        out.put_u16(self.dscale);
        for group in &self.digits {
            out.put_u16(*group);
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::Numeric(v) if *ty == Type::NUMERIC => {
                v.encode(out);
                Ok(IsNull::No)
            }
            PgValue::Numeric(_) => Err(format!("cannot encode numeric as {ty}").into()),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
            PgValue::Int16Array(v) => v.to_sql(ty, out),
            PgValue::Int32Array(v) => v.to_sql(ty, out),
            PgValue::Int64Array(v) => v.to_sql(ty, out),
            PgValue::TextArray(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Convert positional values against the statement's parameter types
pub(crate) fn encode_params(params: &[Value], types: &[Type]) -> Result<Vec<PgValue>> {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| match types.get(i) {
            Some(target_type) => PgValue::from_value_for_type(value, target_type),
            None => PgValue::from_value(value),
        })
        .collect()
}

pub(crate) fn as_sql_refs(values: &[PgValue]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// NUMERIC decoded to its exact decimal text
#[derive(Debug)]
struct PgNumericString(String);

/// Raw UTF-8 payload for types without a dedicated decoder
#[derive(Debug)]
struct PgFallbackString(String);

impl PgNumericString {
    fn parse(raw: &[u8]) -> std::result::Result<String, BoxError> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }

        let ndigits = i16::from_be_bytes([raw[0], raw[1]]) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]);
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]) as usize;

        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        if sign == 0xC000 {
            return Ok("NaN".to_string());
        }

        let mut digits = Vec::with_capacity(ndigits);
        for index in 0..ndigits {
            let offset = 8 + index * 2;
            let group = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
            if group > 9999 {
                return Err("invalid NUMERIC payload: group out of range".into());
            }
            digits.push(group);
        }
        if digits.is_empty() {
            return Ok("0".to_string());
        }

        let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };

        let mut integer_text = String::new();
        if integer_groups == 0 {
            integer_text.push('0');
        }
        for group_index in 0..integer_groups {
            let group = digits.get(group_index).copied().unwrap_or(0);
            if group_index == 0 {
                integer_text.push_str(&group.to_string());
            } else {
                integer_text.push_str(&format!("{group:04}"));
            }
        }

        let mut fraction_text = String::new();
        if dscale > 0 {
            // negative weights put leading zero groups after the point
            if weight < -1 {
                fraction_text.push_str(&"0000".repeat((-weight - 1) as usize));
            }
            for group in digits.iter().skip(integer_groups.min(digits.len())) {
                fraction_text.push_str(&format!("{group:04}"));
            }
            if fraction_text.len() < dscale {
                fraction_text.push_str(&"0".repeat(dscale - fraction_text.len()));
            } else {
                fraction_text.truncate(dscale);
            }
            while fraction_text.ends_with('0') {
                fraction_text.pop();
            }
        }

        let mut output = String::new();
        if sign == 0x4000 && (integer_text != "0" || !fraction_text.is_empty()) {
            output.push('-');
        }
        output.push_str(&integer_text);
        if !fraction_text.is_empty() {
            output.push('.');
            output.push_str(&fraction_text);
        }
        Ok(output)
    }
}

impl<'a> FromSql<'a> for PgNumericString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Self(Self::parse(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

impl<'a> FromSql<'a> for PgFallbackString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert a PostgreSQL row value to a [`Value`]
///
/// EXPLAIN output arrives as `json` in FORMAT JSON, so that column type
/// decodes to [`Value::Json`].
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let Some(column) = row.columns().get(idx) else {
        return Err(preflight_core::PreflightError::Query(format!(
            "column index {idx} out of range"
        )));
    };

    let value = match column.type_().name() {
        "bool" => get(row, idx).map(Value::Bool),
        "int2" => get(row, idx).map(Value::Int16),
        "int4" => get(row, idx).map(Value::Int32),
        "int8" => get(row, idx).map(Value::Int64),
        "float4" => get(row, idx).map(Value::Float32),
        "float8" => get(row, idx).map(Value::Float64),
        "text" | "varchar" | "char" | "bpchar" | "name" => get(row, idx).map(Value::String),
        "bytea" => get(row, idx).map(Value::Bytes),
        "uuid" => get(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get(row, idx).map(Value::Json),
        "date" => get(row, idx).map(Value::Date),
        "time" => get(row, idx).map(Value::Time),
        "timestamp" => get(row, idx).map(Value::DateTime),
        "timestamptz" => get(row, idx).map(Value::DateTimeUtc),
        "numeric" => get::<PgNumericString>(row, idx).map(|v| Value::Decimal(v.0)),
        "_text" | "_varchar" | "_bpchar" | "_name" => get::<Vec<Option<String>>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(optional(Value::String)).collect())),
        "_int2" => get::<Vec<Option<i16>>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(optional(Value::Int16)).collect())),
        "_int4" => get::<Vec<Option<i32>>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(optional(Value::Int32)).collect())),
        "_int8" => get::<Vec<Option<i64>>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(optional(Value::Int64)).collect())),
        // custom types such as enums: decode the raw UTF-8 payload
        _ => get::<PgFallbackString>(row, idx).map(|v| Value::String(v.0)),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn optional<T>(wrap: fn(T) -> Value) -> impl Fn(Option<T>) -> Value {
    move |item| item.map(wrap).unwrap_or(Value::Null)
}
