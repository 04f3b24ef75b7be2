use serde_json::json;
use std::sync::Arc;
use yearseq::cli::{CliError, Command, dispatch};
use yearseq::entity::{EntityKind, YearPrefix};
use yearseq::orm::{Db, auto_migrate};
use yearseq::settings::Settings;

async fn setup() -> (Db, Settings) {
    let db = Db::connect(":memory:").await.unwrap();
    auto_migrate(Arc::new(db.clone())).await.unwrap();
    (db, Settings::default())
}

fn yy(prefix: &str) -> Option<YearPrefix> {
    Some(YearPrefix::new(prefix).unwrap())
}

#[tokio::test]
async fn test_issue_prints_number_under_kind_column() {
    let (db, settings) = setup().await;
    let output = dispatch(
        Command::Issue {
            kind: EntityKind::Customer,
            prefix: yy("23"),
        },
        &db,
        &settings,
    )
    .await
    .unwrap();
    assert_eq!(output, json!({ "customer_number": "C-2300001" }));
}

#[tokio::test]
async fn test_find_and_list() {
    let (db, settings) = setup().await;
    for _ in 0..2 {
        dispatch(
            Command::Issue {
                kind: EntityKind::Order,
                prefix: yy("23"),
            },
            &db,
            &settings,
        )
        .await
        .unwrap();
    }

    let found = dispatch(
        Command::Find {
            kind: EntityKind::Order,
            number: "O-2300002".to_string(),
        },
        &db,
        &settings,
    )
    .await
    .unwrap();
    assert_eq!(found["number"], "O-2300002");
    assert_eq!(found["kind"], "order");

    let listed = dispatch(
        Command::List {
            kind: EntityKind::Order,
            prefix: yy("23"),
        },
        &db,
        &settings,
    )
    .await
    .unwrap();
    let numbers: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["O-2300001", "O-2300002"]);
}

#[tokio::test]
async fn test_find_missing_number() {
    let (db, settings) = setup().await;
    let err = dispatch(
        Command::Find {
            kind: EntityKind::Customer,
            number: "C-2399999".to_string(),
        },
        &db,
        &settings,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::NotFound { .. }));
}

#[tokio::test]
async fn test_wipe_then_migrate_resets_sequences() {
    let (db, settings) = setup().await;
    let issue = || Command::Issue {
        kind: EntityKind::Customer,
        prefix: yy("23"),
    };
    dispatch(issue(), &db, &settings).await.unwrap();

    dispatch(Command::Wipe, &db, &settings).await.unwrap();
    dispatch(Command::Migrate, &db, &settings).await.unwrap();

    let output = dispatch(issue(), &db, &settings).await.unwrap();
    assert_eq!(output, json!({ "customer_number": "C-2300001" }));
}
