//! Derivation of the next number in a (kind, year prefix) partition.
use log::debug;
use sqlx::SqliteConnection;

use crate::entity::{EntityKind, YearPrefix};
use crate::error::{NumberingError, Result};
use crate::store;

/// Render `tag + prefix + zero-padded sequence`, refusing sequences that
/// overflow the kind's digit width.
pub fn format_number(kind: EntityKind, prefix: &YearPrefix, sequence: u64) -> Result<String> {
    if sequence > kind.max_sequence() {
        return Err(NumberingError::SequenceExhausted {
            prefix: kind.partition_prefix(prefix),
            width: kind.width(),
        });
    }
    Ok(format!(
        "{}{:0width$}",
        kind.partition_prefix(prefix),
        sequence,
        width = kind.width()
    ))
}

/// Numeric suffix of a stored number belonging to the partition. Suffixes
/// wider than the kind's digit width are malformed.
pub fn parse_sequence(kind: EntityKind, prefix: &YearPrefix, number: &str) -> Result<u64> {
    let malformed = || NumberingError::Parse {
        number: number.to_string(),
    };
    let digits = number
        .strip_prefix(&kind.partition_prefix(prefix))
        .ok_or_else(malformed)?;
    if digits.is_empty()
        || digits.len() > kind.width()
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }
    digits.parse::<u64>().map_err(|_| malformed())
}

/// Next unused number for `kind` under `prefix`.
///
/// Reads the most recently inserted record of the partition (id descending) and
/// increments its sequence; an empty partition starts at 1. Nothing is written:
/// the caller inserts the record and owns the transaction. Two callers racing on
/// the same partition can compute the same number, in which case the table's
/// unique constraint rejects the second insert.
pub async fn next_number(
    conn: &mut SqliteConnection,
    prefix: &YearPrefix,
    kind: EntityKind,
) -> Result<String> {
    let next = latest_sequence(conn, kind, prefix).await? + 1;
    let number = format_number(kind, prefix, next)?;
    debug!("Next {} number is `{}`", kind, number);
    Ok(number)
}

/// Sequence of the latest record in the partition, 0 when it is empty.
async fn latest_sequence(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    prefix: &YearPrefix,
) -> Result<u64> {
    match store::latest_in_partition(conn, kind, prefix).await? {
        Some(last) => parse_sequence(kind, prefix, &last.number),
        None => Ok(0),
    }
}

/// Next number taken from the `number_sequences` counter row of the partition.
///
/// The upsert increments atomically, so concurrent callers never receive the
/// same value. The counter never falls behind the latest record of the
/// partition, which lets a partition switch to counter allocation after
/// numbers were already issued from the latest record.
pub async fn next_from_counter(
    conn: &mut SqliteConnection,
    prefix: &YearPrefix,
    kind: EntityKind,
) -> Result<String> {
    let floor = latest_sequence(conn, kind, prefix).await?;
    let (sequence,): (i64,) = sqlx::query_as(
        "INSERT INTO number_sequences (entity, prefix, last_sequence) VALUES (?1, ?2, ?3 + 1)
         ON CONFLICT (entity, prefix) DO UPDATE SET last_sequence = MAX(last_sequence, ?3) + 1
         RETURNING last_sequence",
    )
    .bind(kind.as_str())
    .bind(prefix.as_str())
    .bind(floor as i64)
    .fetch_one(&mut *conn)
    .await?;
    let number = format_number(kind, prefix, sequence as u64)?;
    debug!("Counter issued {} number `{}`", kind, number);
    Ok(number)
}
