//! Handle-level transaction lifecycle and scoped transactions.
//!
//! A handle has at most one handle-level transaction, begun when the handle
//! is opened. Its state only moves forward:
//!
//! ```text
//! NoTransaction --begin--> Active --commit/dispose--> Terminal
//! NoTransaction --dispose--> Terminal(Disposed)
//! ```
//!
//! Scoped transactions ([`ScopedTransaction`]) are independent of that
//! state. They roll back when dropped unless committed.

use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How a handle-level transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    /// Committed successfully.
    Committed,
    /// Rolled back, either by disposal or after a failed commit.
    RolledBack,
    /// The handle was disposed before any transaction began.
    Disposed,
}

/// State of the handle-level transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// None has been started.
    NoTransaction,
    /// Begun and not yet ended.
    Active,
    /// Ended; no further transaction can start on this handle.
    Terminal(TransactionEnd),
}

impl TransactionState {
    /// Returns `true` while a transaction is open.
    pub fn is_active(self) -> bool {
        self == TransactionState::Active
    }
}

/// Owns the handle-level transaction state machine.
#[derive(Debug)]
pub(crate) struct TransactionController {
    state: TransactionState,
}

impl TransactionController {
    pub(crate) fn new() -> Self {
        Self {
            state: TransactionState::NoTransaction,
        }
    }

    pub(crate) fn state(&self) -> TransactionState {
        self.state
    }

    /// Begins an immediate transaction.
    pub(crate) fn begin(&mut self, conn: &Connection) -> Result<()> {
        if self.state != TransactionState::NoTransaction {
            return Err(Error::TransactionAlreadyStarted);
        }
        conn.execute_batch("BEGIN IMMEDIATE")?;
        self.state = TransactionState::Active;
        debug!("Began handle transaction");
        Ok(())
    }

    /// Commits the active transaction.
    ///
    /// The state leaves `Active` before `COMMIT` is issued, so a failed
    /// commit is never retried. If the engine keeps the transaction open
    /// after the failure, it is rolled back.
    pub(crate) fn commit(&mut self, conn: &Connection) -> Result<()> {
        if !self.state.is_active() {
            return Err(Error::NoActiveTransaction);
        }
        self.state = TransactionState::Terminal(TransactionEnd::Committed);

        if let Err(e) = conn.execute_batch("COMMIT") {
            self.state = TransactionState::Terminal(TransactionEnd::RolledBack);
            if !conn.is_autocommit() {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback, "Rollback after failed commit also failed");
                }
            }
            return Err(e.into());
        }
        debug!("Committed handle transaction");
        Ok(())
    }

    /// Ends the transaction as part of handle disposal. Idempotent.
    ///
    /// An active transaction is rolled back; a handle that never began one
    /// moves to `Terminal(Disposed)`.
    pub(crate) fn dispose_all(&mut self, conn: &Connection) -> Result<()> {
        match self.state {
            TransactionState::Active => {
                self.state = TransactionState::Terminal(TransactionEnd::RolledBack);
                // A failed statement may already have ended it.
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                    debug!("Rolled back handle transaction on dispose");
                }
            }
            TransactionState::NoTransaction => {
                self.state = TransactionState::Terminal(TransactionEnd::Disposed);
            }
            TransactionState::Terminal(_) => {}
        }
        Ok(())
    }
}

static SAVEPOINT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Guard for one scoped transaction.
///
/// The outermost scope is a [`rusqlite::Transaction`] begun `IMMEDIATE`.
/// When nesting is allowed and a transaction is already open, the scope is
/// a savepoint instead. Either way it rolls back on drop unless
/// [`commit`](Self::commit) succeeded.
#[derive(Debug)]
pub(crate) enum ScopedTransaction<'c> {
    Outer(Transaction<'c>),
    Nested(NestedScope<'c>),
}

impl<'c> ScopedTransaction<'c> {
    pub(crate) fn begin(conn: &'c Connection, allow_nested: bool) -> Result<Self> {
        if allow_nested && !conn.is_autocommit() {
            return Ok(Self::Nested(NestedScope::begin(conn)?));
        }
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        debug!("Began scoped transaction");
        Ok(Self::Outer(tx))
    }

    /// Commits the scope. A failed `COMMIT` leaves nothing open: the
    /// transaction is rolled back as the guard drops.
    pub(crate) fn commit(self) -> Result<()> {
        match self {
            Self::Outer(tx) => tx.commit()?,
            Self::Nested(scope) => scope.release()?,
        }
        Ok(())
    }
}

/// Savepoint held through a shared connection.
///
/// rusqlite's own `Savepoint` needs `&mut Connection`, which a handle
/// shared behind `&self` cannot lend out.
#[derive(Debug)]
pub(crate) struct NestedScope<'c> {
    conn: &'c Connection,
    name: String,
    released: bool,
}

impl<'c> NestedScope<'c> {
    fn begin(conn: &'c Connection) -> rusqlite::Result<Self> {
        let name = format!("sp_{}", SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed));
        conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        debug!(savepoint = %name, "Began nested scoped transaction");
        Ok(Self {
            conn,
            name,
            released: false,
        })
    }

    fn release(mut self) -> rusqlite::Result<()> {
        self.conn.execute_batch(&format!("RELEASE {}", self.name))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for NestedScope<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let name = &self.name;
        match self
            .conn
            .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
        {
            Ok(()) => debug!(savepoint = %name, "Rolled back nested scoped transaction"),
            Err(e) => warn!(savepoint = %name, error = %e, "Failed to roll back nested scoped transaction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_begin_commit() {
        let conn = conn();
        let mut tx = TransactionController::new();
        tx.begin(&conn).unwrap();
        assert!(tx.state().is_active());
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        tx.commit(&conn).unwrap();
        assert_eq!(
            tx.state(),
            TransactionState::Terminal(TransactionEnd::Committed)
        );
        assert!(conn.is_autocommit());
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_commit_without_transaction_keeps_state() {
        let conn = conn();
        let mut tx = TransactionController::new();
        assert!(matches!(tx.commit(&conn), Err(Error::NoActiveTransaction)));
        assert_eq!(tx.state(), TransactionState::NoTransaction);
    }

    #[test]
    fn test_second_commit_fails() {
        let conn = conn();
        let mut tx = TransactionController::new();
        tx.begin(&conn).unwrap();
        tx.commit(&conn).unwrap();
        assert!(matches!(tx.commit(&conn), Err(Error::NoActiveTransaction)));
    }

    #[test]
    fn test_begin_twice_fails() {
        let conn = conn();
        let mut tx = TransactionController::new();
        tx.begin(&conn).unwrap();
        assert!(matches!(
            tx.begin(&conn),
            Err(Error::TransactionAlreadyStarted)
        ));
    }

    #[test]
    fn test_dispose_rolls_back_active() {
        let conn = conn();
        let mut tx = TransactionController::new();
        tx.begin(&conn).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        tx.dispose_all(&conn).unwrap();
        tx.dispose_all(&conn).unwrap();
        assert_eq!(
            tx.state(),
            TransactionState::Terminal(TransactionEnd::RolledBack)
        );
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_dispose_without_transaction() {
        let conn = conn();
        let mut tx = TransactionController::new();
        tx.dispose_all(&conn).unwrap();
        assert_eq!(
            tx.state(),
            TransactionState::Terminal(TransactionEnd::Disposed)
        );
        assert!(matches!(
            tx.begin(&conn),
            Err(Error::TransactionAlreadyStarted)
        ));
    }

    #[test]
    fn test_scoped_drop_rolls_back() {
        let conn = conn();
        {
            let _scope = ScopedTransaction::begin(&conn, false).unwrap();
            conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        }
        assert!(conn.is_autocommit());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_nested_savepoint() {
        let conn = conn();
        let outer = ScopedTransaction::begin(&conn, true).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (1)").unwrap();
        {
            let _inner = ScopedTransaction::begin(&conn, true).unwrap();
            conn.execute_batch("INSERT INTO t VALUES (2)").unwrap();
        }
        assert_eq!(count(&conn), 1);
        outer.commit().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_nested_without_permission_fails() {
        let conn = conn();
        let _outer = ScopedTransaction::begin(&conn, false).unwrap();
        let err = ScopedTransaction::begin(&conn, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot start a transaction within a transaction"
        );
    }

    #[test]
    fn test_scoped_failed_commit_rolls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("locked.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2);")
            .unwrap();
        conn.busy_timeout(Duration::ZERO).unwrap();

        // A half-stepped read keeps a shared lock, so COMMIT cannot finish.
        let reader = Connection::open(&path).unwrap();
        let mut stmt = reader.prepare("SELECT x FROM t").unwrap();
        let mut rows = stmt.query([]).unwrap();
        assert!(rows.next().unwrap().is_some());

        let scope = ScopedTransaction::begin(&conn, false).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (3)").unwrap();
        let err = scope.commit().unwrap_err();
        assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::DatabaseBusy));
        assert!(conn.is_autocommit());

        drop(rows);
        drop(stmt);
        assert_eq!(count(&conn), 2);
        let scope = ScopedTransaction::begin(&conn, false).unwrap();
        conn.execute_batch("INSERT INTO t VALUES (3)").unwrap();
        scope.commit().unwrap();
        assert_eq!(count(&conn), 3);
    }
}
