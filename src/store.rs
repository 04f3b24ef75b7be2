//! Record queries for numbered tables.
//!
//! All functions run on a borrowed connection so they can take part in a
//! transaction the caller owns (`&mut *tx`) or run on a plain pooled connection.
use chrono::NaiveDateTime;
use log::{debug, info};
use sqlx::{FromRow, SqliteConnection};

use crate::entity::{EntityKind, NumberedRecord, YearPrefix};
use crate::error::{NumberingError, Result};

#[derive(FromRow)]
struct RecordRow {
    id: i64,
    number: String,
    created_at: NaiveDateTime,
}

impl RecordRow {
    fn into_record(self, kind: EntityKind) -> NumberedRecord {
        NumberedRecord {
            kind,
            id: self.id,
            number: self.number,
            created_at: self.created_at,
        }
    }
}

fn select_sql(kind: EntityKind) -> String {
    format!(
        "SELECT id, {} AS number, created_at FROM {}",
        kind.column(),
        kind.table()
    )
}

/// Most recently inserted record (highest id) whose number starts with
/// `tag + prefix`.
pub async fn latest_in_partition(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    prefix: &YearPrefix,
) -> Result<Option<NumberedRecord>> {
    let partition = kind.partition_prefix(prefix);
    let sql = format!(
        "{} WHERE substr({col}, 1, length(?1)) = ?1 ORDER BY id DESC LIMIT 1",
        select_sql(kind),
        col = kind.column()
    );
    debug!("Looking up latest `{}` record for `{}`", kind, partition);
    let row: Option<RecordRow> = sqlx::query_as(&sql)
        .bind(&partition)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.into_record(kind)))
}

/// Insert a new record carrying `number`. A duplicate number fails with
/// `UniquenessViolation` and leaves the table untouched.
pub async fn insert_record(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    number: &str,
) -> Result<NumberedRecord> {
    let sql = format!(
        "INSERT INTO {} ({col}) VALUES (?) RETURNING id, {col} AS number, created_at",
        kind.table(),
        col = kind.column()
    );
    let row: RecordRow = sqlx::query_as(&sql)
        .bind(number)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| NumberingError::from_insert(e, number))?;
    info!("Inserted {} `{}` (id {})", kind, row.number, row.id);
    Ok(row.into_record(kind))
}

pub async fn find_by_number(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    number: &str,
) -> Result<Option<NumberedRecord>> {
    let sql = format!("{} WHERE {} = ?", select_sql(kind), kind.column());
    let row: Option<RecordRow> = sqlx::query_as(&sql)
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| r.into_record(kind)))
}

/// Every record of a partition in insertion order.
pub async fn list_partition(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    prefix: &YearPrefix,
) -> Result<Vec<NumberedRecord>> {
    let sql = format!(
        "{} WHERE substr({col}, 1, length(?1)) = ?1 ORDER BY id ASC",
        select_sql(kind),
        col = kind.column()
    );
    let rows: Vec<RecordRow> = sqlx::query_as(&sql)
        .bind(kind.partition_prefix(prefix))
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.into_record(kind)).collect())
}
