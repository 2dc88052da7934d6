use ol_database::infer::{ColumnType, SchemaError, infer_schema};
use ol_types::{Record, RecordSet, Value};

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_union_of_fields_in_first_seen_order() {
    let set = RecordSet::new(
        "orders",
        vec![
            record(&[("order_id", Value::Int(1)), ("customer", Value::Text("VINET".into()))]),
            record(&[("order_id", Value::Int(2)), ("freight", Value::Real(3.25))]),
        ],
    );
    let schema = infer_schema(&set).expect("infer");
    let names: Vec<&str> = schema.columns().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["order_id", "customer", "freight"]);
}

#[test]
fn test_widening_int_and_real_resolves_real() {
    let set = RecordSet::new(
        "t",
        vec![
            record(&[("price", Value::Int(4))]),
            record(&[("price", Value::Real(4.5))]),
        ],
    );
    let schema = infer_schema(&set).unwrap();
    assert_eq!(schema.column_type("price"), Some(ColumnType::Real));
}

#[test]
fn test_any_text_observation_resolves_text() {
    let set = RecordSet::new(
        "t",
        vec![
            record(&[("code", Value::Int(7))]),
            record(&[("code", Value::Real(7.5))]),
            record(&[("code", Value::Text("A7".into()))]),
        ],
    );
    let schema = infer_schema(&set).unwrap();
    assert_eq!(schema.column_type("code"), Some(ColumnType::Text));
}

#[test]
fn test_ragged_records_keep_all_columns() {
    let set = RecordSet::new(
        "t",
        vec![
            record(&[("a", Value::Int(1))]),
            record(&[("b", Value::Text("x".into()))]),
        ],
    );
    let schema = infer_schema(&set).unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(schema.column_type("a"), Some(ColumnType::Integer));
    assert_eq!(schema.column_type("b"), Some(ColumnType::Text));
}

#[test]
fn test_type_mapping_is_order_independent() {
    let records = vec![
        record(&[("k", Value::Int(1)), ("v", Value::Real(0.5))]),
        record(&[("k", Value::Text("two".into())), ("w", Value::Null)]),
        record(&[("v", Value::Int(3)), ("w", Value::Int(4))]),
    ];
    let forward = infer_schema(&RecordSet::new("t", records.clone())).unwrap();
    let mut reversed_records = records;
    reversed_records.reverse();
    let reversed = infer_schema(&RecordSet::new("t", reversed_records)).unwrap();

    for (name, ty) in forward.columns() {
        assert_eq!(
            reversed.column_type(name),
            Some(ty),
            "column '{name}' resolved differently after permutation"
        );
    }
    assert_eq!(forward.len(), reversed.len());
}

#[test]
fn test_dates_observe_as_text() {
    let d = chrono::NaiveDate::from_ymd_opt(1996, 7, 4).unwrap();
    let set = RecordSet::new("t", vec![record(&[("order_date", Value::Date(d))])]);
    let schema = infer_schema(&set).unwrap();
    assert_eq!(schema.column_type("order_date"), Some(ColumnType::Text));
}

#[test]
fn test_binary_mixed_with_numeric_conflicts() {
    let set = RecordSet::new(
        "t",
        vec![
            record(&[("picture", Value::Bytes(vec![1, 2]))]),
            record(&[("picture", Value::Int(5))]),
        ],
    );
    match infer_schema(&set) {
        Err(SchemaError::Conflict { field, .. }) => assert_eq!(field, "picture"),
        other => panic!("expected a schema conflict, got {other:?}"),
    }
}

#[test]
fn test_binary_only_field_resolves_blob() {
    let set = RecordSet::new(
        "t",
        vec![
            record(&[("picture", Value::Bytes(vec![1]))]),
            record(&[("picture", Value::Null)]),
        ],
    );
    let schema = infer_schema(&set).unwrap();
    assert_eq!(schema.column_type("picture"), Some(ColumnType::Blob));
}

#[test]
fn test_all_null_field_falls_back_to_text() {
    let set = RecordSet::new("t", vec![record(&[("region", Value::Null)])]);
    let schema = infer_schema(&set).unwrap();
    assert_eq!(schema.column_type("region"), Some(ColumnType::Text));
}
