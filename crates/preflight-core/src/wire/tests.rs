use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_pg_names() {
    assert_eq!(WireType::Integer.pg_name(), "int4");
    assert_eq!(WireType::BigInt.pg_name(), "int8");
    assert_eq!(WireType::TimestampTz.pg_name(), "timestamptz");
    assert_eq!(WireType::Array(ArrayElement::Text).pg_name(), "_text");
    assert_eq!(ArrayElement::Int8.pg_name(), "int8");
}

#[test]
fn test_is_array() {
    assert!(WireType::Array(ArrayElement::Int4).is_array());
    assert!(!WireType::Text.is_array());
}

#[test]
fn test_serialization() {
    let json = serde_json::to_string(&WireType::SmallInt).unwrap();
    assert_eq!(json, "\"small_int\"");

    let json = serde_json::to_string(&WireType::Array(ArrayElement::Int8)).unwrap();
    assert_eq!(json, r#"{"array":"int8"}"#);

    let parsed: WireType = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, WireType::Array(ArrayElement::Int8));
}

#[test]
fn test_array_element_inference() {
    assert_eq!(
        ArrayElement::infer(&[Value::Int16(1), Value::Int64(2)]),
        ArrayElement::Int4
    );
    assert_eq!(ArrayElement::infer(&[Value::Int64(7)]), ArrayElement::Int8);
    assert_eq!(
        ArrayElement::infer(&[Value::String("a".into())]),
        ArrayElement::Text
    );
    assert_eq!(ArrayElement::infer(&[]), ArrayElement::Text);
}
