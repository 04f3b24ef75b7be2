//! Numbered entity kinds and their fixed number layout.
//!
//! Every kind maps to one row of the dispatch table below: the literal tag that
//! starts its numbers, the zero-padded digit width of the sequence, and the
//! table/column that store the numbers.
use chrono::{Datelike, Local, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::NumberingError;
use crate::orm::{Migration, Model};

/// Layout of the numbers issued for one entity kind.
#[derive(Debug, PartialEq, Eq)]
pub struct NumberFormat {
    pub tag: &'static str,
    pub width: usize,
    pub table: &'static str,
    pub column: &'static str,
}

const CUSTOMER_FORMAT: NumberFormat = NumberFormat {
    tag: "C-",
    width: 5,
    table: "customers",
    column: "customer_number",
};

const ORDER_FORMAT: NumberFormat = NumberFormat {
    tag: "O-",
    width: 5,
    table: "orders",
    column: "order_number",
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Customer,
    Order,
}

impl EntityKind {
    pub const fn format(self) -> &'static NumberFormat {
        match self {
            EntityKind::Customer => &CUSTOMER_FORMAT,
            EntityKind::Order => &ORDER_FORMAT,
        }
    }

    pub const fn tag(self) -> &'static str {
        self.format().tag
    }

    pub const fn width(self) -> usize {
        self.format().width
    }

    pub const fn table(self) -> &'static str {
        self.format().table
    }

    pub const fn column(self) -> &'static str {
        self.format().column
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::Order => "order",
        }
    }

    /// Tag followed by the year prefix, e.g. `C-23`.
    pub fn partition_prefix(self, prefix: &YearPrefix) -> String {
        format!("{}{}", self.tag(), prefix)
    }

    /// Largest sequence that still fits into the digit width.
    pub fn max_sequence(self) -> u64 {
        10u64.pow(self.width() as u32) - 1
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = NumberingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" | "customers" => Ok(EntityKind::Customer),
            "order" | "orders" => Ok(EntityKind::Order),
            _ => Err(NumberingError::UnknownEntity(s.to_string())),
        }
    }
}

/// Two-character year prefix embedded in every number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct YearPrefix(String);

impl YearPrefix {
    /// Accepts any two-character string; no calendar check is made.
    pub fn new(prefix: impl Into<String>) -> Result<Self, NumberingError> {
        let prefix = prefix.into();
        if prefix.chars().count() != 2 {
            return Err(NumberingError::InvalidPrefix(prefix));
        }
        Ok(YearPrefix(prefix))
    }

    /// Last two digits of `year`.
    pub fn for_year(year: i32) -> Self {
        YearPrefix(format!("{:02}", year.rem_euclid(100)))
    }

    /// Prefix for the current local calendar year.
    pub fn current() -> Self {
        Self::for_year(Local::now().year())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for YearPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for YearPrefix {
    type Err = NumberingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        YearPrefix::new(s)
    }
}

/// A persisted customer or order: the shape shared by both tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberedRecord {
    pub kind: EntityKind,
    pub id: i64,
    pub number: String,
    pub created_at: NaiveDateTime,
}

impl NumberedRecord {
    /// `{"customer_number": "C-2300001"}` or `{"order_number": ...}`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            self.kind.column().to_string(),
            Value::String(self.number.clone()),
        );
        Value::Object(body)
    }
}

fn numbered_table_sql(kind: EntityKind) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    {} TEXT UNIQUE NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
)",
        kind.table(),
        kind.column()
    )
}

fn numbered_columns(kind: EntityKind) -> Vec<(String, String)> {
    vec![
        ("id".to_string(), "INTEGER".to_string()),
        (kind.column().to_string(), "TEXT".to_string()),
        ("created_at".to_string(), "DATETIME".to_string()),
    ]
}

macro_rules! numbered_model {
    ($name:ident, $kind:expr, $column:ident) => {
        #[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
        pub struct $name {
            pub id: i64,
            pub $column: String,
            pub created_at: NaiveDateTime,
        }

        impl $name {
            pub const KIND: EntityKind = $kind;
        }

        #[async_trait::async_trait]
        impl Model for $name {
            fn table_name() -> &'static str {
                Self::KIND.table()
            }

            fn create_table_sql() -> String {
                numbered_table_sql(Self::KIND)
            }

            fn columns() -> Vec<(String, String)> {
                numbered_columns(Self::KIND)
            }
        }

        inventory::submit! {
            Migration {
                table: $kind.table(),
                run: |db| <$name as Model>::migrate(db),
            }
        }
    };
}

numbered_model!(Customer, EntityKind::Customer, customer_number);
numbered_model!(Order, EntityKind::Order, order_number);

/// Per-partition counter row used by counter allocation.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct SequenceCounter {
    pub entity: String,
    pub prefix: String,
    pub last_sequence: i64,
}

#[async_trait::async_trait]
impl Model for SequenceCounter {
    fn table_name() -> &'static str {
        "number_sequences"
    }

    fn create_table_sql() -> String {
        "CREATE TABLE IF NOT EXISTS number_sequences (
    entity TEXT NOT NULL,
    prefix TEXT NOT NULL,
    last_sequence INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (entity, prefix)
)"
        .to_string()
    }

    fn columns() -> Vec<(String, String)> {
        vec![
            ("entity".to_string(), "TEXT".to_string()),
            ("prefix".to_string(), "TEXT".to_string()),
            ("last_sequence".to_string(), "INTEGER".to_string()),
        ]
    }
}

inventory::submit! {
    Migration {
        table: "number_sequences",
        run: |db| <SequenceCounter as Model>::migrate(db),
    }
}
