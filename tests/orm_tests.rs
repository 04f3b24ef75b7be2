use std::sync::Arc;
use yearseq::orm::{Db, Model, auto_migrate, wipe};

#[tokio::test]
async fn test_db_basic_crud() {
    use sqlx::FromRow;

    #[derive(Debug, FromRow, PartialEq, Eq)]
    struct Person {
        name: String,
    }

    let db = Db::connect(":memory:").await.unwrap();
    db.execute("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")
        .await
        .unwrap();
    db.execute("INSERT INTO person (name) VALUES ('Alice')")
        .await
        .unwrap();

    let people: Vec<Person> = db.fetch_all("SELECT name FROM person").await.unwrap();
    let names: Vec<String> = people.into_iter().map(|person| person.name).collect();
    assert_eq!(names, vec!["Alice"]);
}

async fn table_names(db: &Db) -> Vec<String> {
    let rows: Vec<(String,)> = db
        .fetch_all("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .await
        .unwrap();
    rows.into_iter().map(|(name,)| name).collect()
}

#[tokio::test]
async fn test_auto_migrate_creates_registered_tables() {
    let db = Db::connect("sqlite::memory:").await.unwrap();
    auto_migrate(Arc::new(db.clone())).await.unwrap();

    let tables = table_names(&db).await;
    for expected in ["customers", "orders", "number_sequences", "__yearseq_migrations"] {
        assert!(tables.contains(&expected.to_string()), "missing {expected}");
    }

    let applied: Vec<(String,)> = db
        .fetch_all("SELECT table_name FROM __yearseq_migrations ORDER BY table_name")
        .await
        .unwrap();
    assert_eq!(applied.len(), 3);
}

#[tokio::test]
async fn test_auto_migrate_is_idempotent() {
    let db = Db::connect(":memory:").await.unwrap();
    auto_migrate(Arc::new(db.clone())).await.unwrap();
    db.execute("INSERT INTO customers (customer_number) VALUES ('C-2300001')")
        .await
        .unwrap();

    auto_migrate(Arc::new(db.clone())).await.unwrap();

    let rows: Vec<(String,)> = db
        .fetch_all("SELECT customer_number FROM customers")
        .await
        .unwrap();
    assert_eq!(rows, vec![("C-2300001".to_string(),)]);
}

#[tokio::test]
async fn test_wipe_drops_tables_and_allows_remigration() {
    let db = Db::connect(":memory:").await.unwrap();
    auto_migrate(Arc::new(db.clone())).await.unwrap();
    db.execute("INSERT INTO orders (order_number) VALUES ('O-2300001')")
        .await
        .unwrap();

    wipe(&db).await.unwrap();
    let tables = table_names(&db).await;
    assert!(!tables.contains(&"orders".to_string()));
    assert!(!tables.contains(&"customers".to_string()));

    auto_migrate(Arc::new(db.clone())).await.unwrap();
    let rows: Vec<(i64,)> = db.fetch_all("SELECT COUNT(*) FROM orders").await.unwrap();
    assert_eq!(rows, vec![(0,)]);
}

struct NoteV1;
struct NoteV2;

#[async_trait::async_trait]
impl Model for NoteV1 {
    fn table_name() -> &'static str {
        "notes"
    }
    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT)".to_string()
    }
    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".to_string(), "INTEGER".to_string()),
            ("body".to_string(), "TEXT".to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl Model for NoteV2 {
    fn table_name() -> &'static str {
        "notes"
    }
    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT, author TEXT)"
            .to_string()
    }
    fn columns() -> Vec<(String, String)> {
        vec![
            ("id".to_string(), "INTEGER".to_string()),
            ("body".to_string(), "TEXT".to_string()),
            ("author".to_string(), "TEXT".to_string()),
        ]
    }
}

#[tokio::test]
async fn test_model_migrate_adds_new_columns() {
    let db = Arc::new(Db::connect(":memory:").await.unwrap());
    NoteV1::migrate(db.clone()).await.unwrap();
    db.execute("INSERT INTO notes (body) VALUES ('hello')")
        .await
        .unwrap();

    NoteV2::migrate(db.clone()).await.unwrap();

    let rows: Vec<(String, Option<String>)> = db
        .fetch_all("SELECT body, author FROM notes")
        .await
        .unwrap();
    assert_eq!(rows, vec![("hello".to_string(), None)]);
}
