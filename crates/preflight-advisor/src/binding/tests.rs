use super::*;

fn binder_for(value: Value) -> Binder {
    select_binder(&BoundParam::new(1, value))
}

mod select_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_keeps_captured_type() {
        let typed = BoundParam::typed(1, Value::Null, WireType::BigInt);
        assert_eq!(select_binder(&typed), Binder::Null(WireType::BigInt));
        assert_eq!(binder_for(Value::Null), Binder::Null(WireType::Null));
    }

    #[test]
    fn test_explicit_type_wins_over_runtime_type() {
        let param = BoundParam::typed(2, Value::String("42".into()), WireType::Integer);
        assert_eq!(select_binder(&param), Binder::Explicit(WireType::Integer));
    }

    #[test]
    fn test_runtime_dispatch() {
        assert_eq!(binder_for(Value::Bool(true)), Binder::Boolean);
        assert_eq!(binder_for(Value::Int8(1)), Binder::SmallInt);
        assert_eq!(binder_for(Value::Int16(1)), Binder::SmallInt);
        assert_eq!(binder_for(Value::Int32(1)), Binder::Integer);
        assert_eq!(binder_for(Value::Int64(1)), Binder::BigInt);
        assert_eq!(binder_for(Value::Float32(1.0)), Binder::Real);
        assert_eq!(binder_for(Value::Float64(1.0)), Binder::Double);
        assert_eq!(binder_for(Value::Decimal("1.5".into())), Binder::Numeric);
        assert_eq!(binder_for(Value::String("x".into())), Binder::Text);
    }

    #[test]
    fn test_array_element_inferred_from_first_item() {
        assert_eq!(
            binder_for(Value::Array(vec![Value::Int32(1), Value::Int32(2)])),
            Binder::Array(ArrayElement::Int4)
        );
        assert_eq!(
            binder_for(Value::Array(vec![Value::Int64(1)])),
            Binder::Array(ArrayElement::Int8)
        );
        assert_eq!(
            binder_for(Value::Array(vec![Value::Bool(true)])),
            Binder::Array(ArrayElement::Text)
        );
        assert_eq!(
            binder_for(Value::Array(Vec::new())),
            Binder::Array(ArrayElement::Text)
        );
    }

    #[test]
    fn test_other_values_pass_through() {
        assert_eq!(binder_for(Value::Bytes(vec![1, 2])), Binder::PassThrough);
        assert_eq!(
            binder_for(Value::Json(serde_json::json!({"a": 1}))),
            Binder::PassThrough
        );
        assert_eq!(Binder::PassThrough.wire_type(), None);
    }
}

mod wire_type_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binder_wire_types() {
        assert_eq!(Binder::Integer.wire_type(), Some(WireType::Integer));
        assert_eq!(
            Binder::Array(ArrayElement::Int8).wire_type(),
            Some(WireType::Array(ArrayElement::Int8))
        );
        assert_eq!(
            Binder::Null(WireType::Text).wire_type(),
            Some(WireType::Text)
        );
    }
}
