use thiserror::Error;

const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Everything that can go wrong while deriving or committing a number.
#[derive(Debug, Error)]
pub enum NumberingError {
    /// A stored number in the partition does not look like `prefix + digits`.
    #[error("stored number `{number}` does not match the expected prefix and digit layout")]
    Parse { number: String },

    /// The store rejected the insert because the number already exists.
    #[error("number `{number}` is already taken")]
    UniquenessViolation { number: String },

    /// Another writer held the database lock past the busy timeout.
    #[error("store busy: {0}")]
    StoreBusy(#[source] sqlx::Error),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    /// The next sequence no longer fits into the fixed digit width.
    #[error("sequence for `{prefix}` exhausted the {width}-digit range")]
    SequenceExhausted { prefix: String, width: usize },

    #[error("invalid year prefix `{0}`: expected exactly two characters")]
    InvalidPrefix(String),

    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
}

/// SQLITE_BUSY / SQLITE_LOCKED, including their extended codes.
fn is_busy(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .and_then(|code| code.parse::<i64>().ok())
        .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

impl From<sqlx::Error> for NumberingError {
    fn from(err: sqlx::Error) -> Self {
        if is_busy(&err) {
            NumberingError::StoreBusy(err)
        } else {
            NumberingError::StoreUnavailable(err)
        }
    }
}

impl NumberingError {
    /// Maps an insert failure, turning unique-constraint errors into
    /// `UniquenessViolation` for the number being inserted.
    pub fn from_insert(err: sqlx::Error, number: &str) -> Self {
        let unique = err
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);
        if unique {
            NumberingError::UniquenessViolation {
                number: number.to_string(),
            }
        } else {
            NumberingError::from(err)
        }
    }

    /// Failures a fresh attempt with a re-read sequence can get past.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NumberingError::UniquenessViolation { .. } | NumberingError::StoreBusy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NumberingError>;
