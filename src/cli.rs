//! Command-line surface of the `yearseq` binary.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::entity::{EntityKind, YearPrefix};
use crate::error::NumberingError;
use crate::issuer::{Issuer, IssuerConfig};
use crate::orm::{self, Db};
use crate::settings::{Settings, SettingsError};
use crate::store;

#[derive(Debug, Parser)]
#[command(
    name = "yearseq",
    version,
    about = "Issue year-prefixed customer and order numbers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or update the record tables.
    Migrate,
    /// Issue the next number and store the new record.
    Issue {
        kind: EntityKind,
        /// Two-character year prefix; defaults to the current year.
        #[arg(long)]
        prefix: Option<YearPrefix>,
    },
    /// Look up a record by its number.
    Find { kind: EntityKind, number: String },
    /// List the records of one year.
    List {
        kind: EntityKind,
        #[arg(long)]
        prefix: Option<YearPrefix>,
    },
    /// Drop all record tables.
    Wipe,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Numbering(#[from] NumberingError),
    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("no {kind} with number `{number}`")]
    NotFound { kind: EntityKind, number: String },
}

impl From<sqlx::Error> for CliError {
    fn from(err: sqlx::Error) -> Self {
        CliError::Numbering(NumberingError::from(err))
    }
}

/// Connect with `settings`, prepare the schema and run `command`.
pub async fn run(command: Command, settings: &Settings) -> Result<Value, CliError> {
    let db = Db::connect_with(settings).await?;
    if !matches!(command, Command::Wipe | Command::Migrate) {
        orm::auto_migrate(Arc::new(db.clone())).await?;
    }
    let result = dispatch(command, &db, settings).await;
    db.close().await;
    result
}

/// Run `command` against an already connected store.
pub async fn dispatch(command: Command, db: &Db, settings: &Settings) -> Result<Value, CliError> {
    match command {
        Command::Migrate => {
            orm::auto_migrate(Arc::new(db.clone())).await?;
            Ok(serde_json::json!({ "migrated": true }))
        }
        Command::Issue { kind, prefix } => {
            let issuer = Issuer::new(db.clone(), IssuerConfig::from(settings));
            let prefix = prefix.unwrap_or_else(YearPrefix::current);
            let record = issuer.issue(kind, &prefix).await?;
            Ok(record.to_json())
        }
        Command::Find { kind, number } => {
            let mut conn = db.acquire().await?;
            match store::find_by_number(&mut *conn, kind, &number).await? {
                Some(record) => Ok(serde_json::to_value(&record)?),
                None => Err(CliError::NotFound { kind, number }),
            }
        }
        Command::List { kind, prefix } => {
            let prefix = prefix.unwrap_or_else(YearPrefix::current);
            let mut conn = db.acquire().await?;
            let records = store::list_partition(&mut *conn, kind, &prefix).await?;
            Ok(serde_json::to_value(&records)?)
        }
        Command::Wipe => {
            orm::wipe(db).await?;
            Ok(serde_json::json!({ "wiped": true }))
        }
    }
}
