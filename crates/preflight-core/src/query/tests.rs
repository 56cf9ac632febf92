use super::*;

mod bound_param_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preview_is_capped() {
        let long = "x".repeat(500);
        let param = BoundParam::new(1, Value::String(long));
        assert_eq!(param.preview.as_ref().map(|p| p.chars().count()), Some(PREVIEW_MAX_CHARS));
    }

    #[test]
    fn test_null_has_no_preview() {
        let param = BoundParam::new(2, Value::Null);
        assert!(param.preview.is_none());
    }

    #[test]
    fn test_typed_keeps_wire_type() {
        let param = BoundParam::typed(1, Value::Int64(7), WireType::BigInt);
        assert_eq!(param.wire_type, Some(WireType::BigInt));
        assert_eq!(param.preview.as_deref(), Some("7"));
    }
}

mod bound_query_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_params_sorted_by_position() {
        let query = BoundQuery::new(
            "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3",
            vec![
                BoundParam::new(3, Value::Int32(3)),
                BoundParam::new(1, Value::Int32(1)),
                BoundParam::new(2, Value::Int32(2)),
            ],
        );
        let positions: Vec<usize> = query.params().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_position_last_wins() {
        let query = BoundQuery::new(
            "SELECT $1",
            vec![
                BoundParam::new(1, Value::String("first".into())),
                BoundParam::new(1, Value::String("second".into())),
            ],
        );
        assert_eq!(query.params().len(), 1);
        assert_eq!(query.params()[0].value, Value::String("second".into()));
    }

    #[test]
    fn test_param_lookup() {
        let query = BoundQuery::new(
            "SELECT $1, $4",
            vec![
                BoundParam::new(4, Value::Bool(true)),
                BoundParam::new(1, Value::Int8(1)),
            ],
        );
        assert_eq!(query.param(4).map(|p| &p.value), Some(&Value::Bool(true)));
        assert!(query.param(2).is_none());
    }

    #[test]
    fn test_metadata() {
        let query = BoundQuery::new("SELECT 1", Vec::new())
            .with_data_source("orders-db")
            .with_tag("endpoint", "/orders");
        assert_eq!(query.data_source_id(), Some("orders-db"));
        assert_eq!(query.tags().get("endpoint").map(String::as_str), Some("/orders"));
        assert_eq!(query.sql(), "SELECT 1");
    }
}
