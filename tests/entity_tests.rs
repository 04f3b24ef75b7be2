use yearseq::entity::{EntityKind, NumberedRecord, YearPrefix};
use yearseq::error::NumberingError;

#[test]
fn test_dispatch_table() {
    let customer = EntityKind::Customer.format();
    assert_eq!(customer.tag, "C-");
    assert_eq!(customer.width, 5);
    assert_eq!(customer.table, "customers");
    assert_eq!(customer.column, "customer_number");

    assert_eq!(EntityKind::Order.tag(), "O-");
    assert_eq!(EntityKind::Order.table(), "orders");
    assert_eq!(EntityKind::Order.column(), "order_number");
    assert_eq!(EntityKind::Order.max_sequence(), 99_999);
}

#[test]
fn test_entity_kind_from_str() {
    assert_eq!("customer".parse::<EntityKind>().unwrap(), EntityKind::Customer);
    assert_eq!("Orders".parse::<EntityKind>().unwrap(), EntityKind::Order);
    assert!(matches!(
        "invoice".parse::<EntityKind>(),
        Err(NumberingError::UnknownEntity(name)) if name == "invoice"
    ));
}

#[test]
fn test_year_prefix_accepts_two_characters_only() {
    assert_eq!(YearPrefix::new("23").unwrap().as_str(), "23");
    assert_eq!(YearPrefix::new("ab").unwrap().as_str(), "ab");
    assert!(matches!(
        YearPrefix::new("2023"),
        Err(NumberingError::InvalidPrefix(_))
    ));
    assert!(YearPrefix::new("").is_err());
    assert!(YearPrefix::new("7").is_err());
}

#[test]
fn test_year_prefix_for_year() {
    assert_eq!(YearPrefix::for_year(2023).as_str(), "23");
    assert_eq!(YearPrefix::for_year(2005).as_str(), "05");
    assert_eq!(YearPrefix::for_year(2100).as_str(), "00");
    assert_eq!(YearPrefix::current().as_str().len(), 2);
}

#[test]
fn test_partition_prefix() {
    let prefix = YearPrefix::new("24").unwrap();
    assert_eq!(EntityKind::Customer.partition_prefix(&prefix), "C-24");
    assert_eq!(EntityKind::Order.partition_prefix(&prefix), "O-24");
}

#[test]
fn test_record_json_uses_kind_column() {
    let created_at = chrono::NaiveDate::from_ymd_opt(2023, 5, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    let record = NumberedRecord {
        kind: EntityKind::Order,
        id: 7,
        number: "O-2300007".to_string(),
        created_at,
    };
    assert_eq!(
        record.to_json(),
        serde_json::json!({ "order_number": "O-2300007" })
    );
}
