//! Generate-and-commit wrapper around the sequence derivation.
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::entity::{EntityKind, NumberedRecord, YearPrefix};
use crate::error::Result;
use crate::orm::Db;
use crate::sequence::{next_from_counter, next_number};
use crate::settings::{Allocation, DEFAULT_MAX_ATTEMPTS, Settings};
use crate::store;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IssuerConfig {
    /// Attempts per call, including the first. Values below 1 count as 1.
    pub max_attempts: u32,
    pub allocation: Allocation,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        IssuerConfig {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            allocation: Allocation::Latest,
        }
    }
}

impl From<&Settings> for IssuerConfig {
    fn from(settings: &Settings) -> Self {
        IssuerConfig {
            max_attempts: settings.max_attempts,
            allocation: settings.allocation,
        }
    }
}

type PartitionKey = (EntityKind, YearPrefix);

/// One async mutex per partition. Different partitions only wait for each
/// other on the database write lock.
#[derive(Default)]
struct PartitionLocks {
    inner: Mutex<HashMap<PartitionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PartitionLocks {
    fn lock_for(&self, key: PartitionKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.entry(key).or_default().clone()
    }
}

/// Issues numbers and persists the matching records.
///
/// Calls sharing an `Issuer` (clones included) are serialized per partition.
/// Each attempt runs in a `BEGIN IMMEDIATE` transaction, so the read of the
/// latest sequence and the insert happen under the database write lock.
/// Writers that bypass that lock are stopped by the unique constraint. A
/// collision or a busy store is rolled back and retried with a freshly read
/// sequence until `max_attempts` is spent, then the last error is returned.
#[derive(Clone)]
pub struct Issuer {
    db: Db,
    config: IssuerConfig,
    locks: Arc<PartitionLocks>,
}

impl Issuer {
    pub fn new(db: Db, config: IssuerConfig) -> Self {
        Issuer {
            db,
            config,
            locks: Arc::new(PartitionLocks::default()),
        }
    }

    pub async fn issue(&self, kind: EntityKind, prefix: &YearPrefix) -> Result<NumberedRecord> {
        let lock = self.locks.lock_for((kind, prefix.clone()));
        let _guard = lock.lock().await;

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_issue(kind, prefix).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        "Attempt {}/{} for {} `{}{}` failed: {}; retrying",
                        attempt,
                        max_attempts,
                        kind,
                        kind.tag(),
                        prefix,
                        e
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Issue under the prefix of the current calendar year.
    pub async fn issue_current_year(&self, kind: EntityKind) -> Result<NumberedRecord> {
        self.issue(kind, &YearPrefix::current()).await
    }

    async fn try_issue(&self, kind: EntityKind, prefix: &YearPrefix) -> Result<NumberedRecord> {
        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.db.begin_immediate().await?;
        let number = match self.config.allocation {
            Allocation::Latest => next_number(&mut *tx, prefix, kind).await?,
            Allocation::Counter => next_from_counter(&mut *tx, prefix, kind).await?,
        };
        let record = store::insert_record(&mut *tx, kind, &number).await?;
        tx.commit().await?;
        info!("Issued {} number `{}`", kind, record.number);
        Ok(record)
    }
}
