// SPDX-License-Identifier: MIT

//! Thin async wrapper over a `redb` database storing `bincode` values
//!
//! Ledger stores and the persistent lease-lock table both live in a
//! [`Database`]. Every closure passed to [`Database::read_with`] or
//! [`Database::write_with`] runs as one `redb` transaction.

pub mod error;

use std::path::PathBuf;

use error::{CommitSnafu, DatabaseSnafu, DbResult, InvalidPathSnafu, JoinSnafu, TransactionSnafu};
use redb_bincode::{ReadTransaction, WriteTransaction, redb};
use snafu::{OptionExt as _, ResultExt as _};
use tracing::{debug, warn};
use uniledger_util_error::fmt::FmtCompact as _;

const LOG_TARGET: &str = "uniledger::db";

#[derive(Debug)]
pub struct Database {
    inner: redb_bincode::Database,
    ephemeral: bool,
}

impl Database {
    pub async fn new_in_memory() -> DbResult<Database> {
        debug!(target: LOG_TARGET, "Opening in-memory database");
        let inner = redb::Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .context(DatabaseSnafu)?;
        Ok(Self {
            inner: inner.into(),
            ephemeral: true,
        })
    }

    pub async fn open(path: impl Into<PathBuf>) -> DbResult<Database> {
        let path = path.into();
        tokio::fs::create_dir_all(path.parent().context(InvalidPathSnafu)?).await?;
        debug!(target: LOG_TARGET, path = %path.display(), "Opening database…");

        let inner = tokio::task::spawn_blocking(move || {
            let mut db = redb::Database::create(path)?;
            let _ = db.compact().inspect_err(|err| {
                warn!(target: LOG_TARGET, err = %err.fmt_compact(), "Failed to compact database");
            });
            Ok(db)
        })
        .await
        .context(JoinSnafu)?
        .context(DatabaseSnafu)?;

        Ok(Self {
            inner: inner.into(),
            ephemeral: false,
        })
    }

    /// Run `f` in a read transaction
    ///
    /// Blocks the current worker thread, so requires a multi-threaded
    /// tokio runtime.
    pub async fn read_with<T>(
        &self,
        f: impl FnOnce(&'_ ReadTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = self.inner.begin_read().context(TransactionSnafu)?;

            f(&dbtx)
        })
    }

    /// Run `f` in a write transaction, committing if it returns `Ok`
    ///
    /// Logical outcomes (e.g. "already present") should be returned inside
    /// `Ok`, so the transaction still commits.
    pub async fn write_with<T>(
        &self,
        f: impl FnOnce(&'_ WriteTransaction) -> DbResult<T>,
    ) -> DbResult<T> {
        tokio::task::block_in_place(|| {
            let dbtx = self.inner.begin_write().context(TransactionSnafu)?;
            let res = f(&dbtx)?;
            dbtx.commit().context(CommitSnafu)?;

            Ok(res)
        })
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }
}
