//! The connection handle: one engine connection plus its transaction state
//! and the commands it owns.

use std::cell::RefCell;
use std::fmt;
use std::panic::UnwindSafe;

use rusqlite::{Connection, OpenFlags};
use scriptlite_core::{
    Args, Lookup, Parameter, ResourceRegistry, ResultSet, Row, Shape, Table, Value,
};
use tracing::{debug, warn};

use crate::command::{Command, CommandInput};
use crate::error::{Error, Result};
use crate::executor::CommandExecutor;
use crate::functions;
use crate::options::{ConnectionSettings, OpenOptions};
use crate::transaction::{ScopedTransaction, TransactionController, TransactionState};

/// An open SQLite connection.
///
/// Dropping the handle disposes it: an open handle-level transaction is
/// rolled back, tracked commands are released, cached statements are
/// finalized and the connection is closed. [`close`](Self::close) does the
/// same and reports failures.
///
/// # Examples
///
/// ```
/// use scriptlite::{args, ConnectionHandle, OpenOptions, Value};
///
/// let db = ConnectionHandle::open(&OpenOptions::memory()).unwrap();
/// db.execute("CREATE TABLE t (id INTEGER, name TEXT)", args![]).unwrap();
/// let n = db
///     .execute_non_query("INSERT INTO t VALUES (?, ?), (?, ?)", args![1, "a", 2, "b"])
///     .unwrap();
/// assert_eq!(n, 2);
///
/// let name = db.execute_scalar("SELECT name FROM t WHERE id = ?", args![2]).unwrap();
/// assert_eq!(name, Value::from("b"));
/// db.close().unwrap();
/// ```
pub struct ConnectionHandle {
    conn: Option<Connection>,
    transaction: RefCell<TransactionController>,
    commands: RefCell<ResourceRegistry<Command>>,
    settings: ConnectionSettings,
}

impl ConnectionHandle {
    /// Opens a connection.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOption`] if the options cannot be resolved.
    /// - [`Error::Open`] if the engine cannot open or configure the
    ///   database.
    /// - [`Error::Begin`] if the requested transaction cannot begin; the
    ///   connection is closed again.
    pub fn open(options: &OpenOptions) -> Result<Self> {
        let settings = options.resolve()?;
        let flags = open_flags(&settings);
        debug!(database = %settings.data_source, ?flags, "Opening connection");

        let conn = Connection::open_with_flags(&settings.data_source, flags)
            .map_err(|source| Error::Open { source })?;
        configure(&conn, &settings).map_err(|source| Error::Open { source })?;

        let mut transaction = TransactionController::new();
        if settings.transaction {
            if let Err(e) = transaction.begin(&conn) {
                if let Err((_, close_err)) = conn.close() {
                    warn!(error = %close_err, "Failed to close connection after begin failure");
                }
                return Err(match e {
                    Error::Engine(source) => Error::Begin { source },
                    other => other,
                });
            }
        }

        Ok(Self {
            conn: Some(conn),
            transaction: RefCell::new(transaction),
            commands: RefCell::new(ResourceRegistry::new()),
            settings,
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&OpenOptions::memory())
    }

    /// The resolved settings this handle was opened with.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// The underlying engine connection, for anything this handle does not
    /// cover.
    pub fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::Closed)
    }

    fn executor(&self) -> Result<CommandExecutor<'_>> {
        Ok(CommandExecutor::new(self.connection()?))
    }

    /// Runs a command, discarding any result.
    pub fn execute(&self, command: impl Into<CommandInput>, args: impl Into<Args>) -> Result<()> {
        self.executor()?.execute(command.into(), args.into())
    }

    /// Runs a command and returns the number of rows it changed.
    pub fn execute_non_query(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
    ) -> Result<u64> {
        self.executor()?.non_query(command.into(), args.into())
    }

    /// First column of the first row, or [`Value::Null`] without rows.
    pub fn execute_scalar(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
    ) -> Result<Value> {
        self.executor()?.scalar(command.into(), args.into())
    }

    /// First column of every row.
    pub fn execute_column(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
    ) -> Result<Vec<Value>> {
        self.executor()?.column(command.into(), args.into())
    }

    /// First column to second column. A repeated key takes the last value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProjectionArity`] if the command projects fewer
    /// than two columns.
    pub fn execute_lookup(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
    ) -> Result<Lookup> {
        self.executor()?.lookup(command.into(), args.into())
    }

    /// All rows with the column schema.
    pub fn execute_table(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
    ) -> Result<Table> {
        self.executor()?.table(command.into(), args.into())
    }

    /// All rows.
    pub fn execute_rows(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
    ) -> Result<Vec<Row>> {
        self.executor()?.rows(command.into(), args.into())
    }

    /// Runs a command in the requested shape.
    pub fn query(
        &self,
        command: impl Into<CommandInput>,
        args: impl Into<Args>,
        shape: Shape,
    ) -> Result<ResultSet> {
        self.executor()?.run(command.into(), args.into(), shape)
    }

    /// Creates a raw command. With `track` set, the handle disposes the
    /// command when it closes.
    pub fn create_command(
        &self,
        text: impl Into<String>,
        track: bool,
        params: Vec<Parameter>,
    ) -> Result<Command> {
        self.connection()?;
        let command = Command::new(text, params);
        if track {
            Ok(self.commands.borrow_mut().register(command))
        } else {
            Ok(command)
        }
    }

    /// Number of commands waiting to be disposed with the handle.
    pub fn tracked_commands(&self) -> usize {
        self.commands.borrow().len()
    }

    /// Commits the handle-level transaction begun at open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if there is none, or it was
    /// already committed. An engine failure ends the transaction as rolled
    /// back.
    pub fn commit(&self) -> Result<()> {
        let conn = self.connection()?;
        self.transaction.borrow_mut().commit(conn)
    }

    /// State of the handle-level transaction.
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction.borrow().state()
    }

    /// Runs `body` inside a scoped transaction.
    ///
    /// The transaction commits when `body` returns `Ok` and rolls back when
    /// it returns `Err` or panics. If a transaction is already open, the
    /// scope becomes a savepoint when nested transactions are allowed;
    /// otherwise the engine refuses to begin.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptlite::{args, ConnectionHandle, Error, Value};
    ///
    /// let db = ConnectionHandle::open_in_memory().unwrap();
    /// db.execute("CREATE TABLE t (x)", args![]).unwrap();
    ///
    /// let failed: Result<(), Error> = db.use_transaction(|db| {
    ///     db.execute("INSERT INTO t VALUES (1)", args![])?;
    ///     db.execute("INSERT INTO missing VALUES (1)", args![])
    /// });
    /// assert!(failed.is_err());
    /// assert_eq!(db.execute_scalar("SELECT COUNT(*) FROM t", args![]).unwrap(), Value::Integer(0));
    /// ```
    pub fn use_transaction<T, E, F>(&self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let conn = self.connection()?;
        let scope = ScopedTransaction::begin(conn, self.settings.allow_nested_transactions)?;
        let value = body(self)?;
        scope.commit()?;
        Ok(value)
    }

    /// Registers a deterministic scalar function under `name`.
    ///
    /// `n_args` is the exact argument count, or `-1` for any.
    pub fn register_function<F>(&self, name: &str, n_args: i32, f: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Value + Send + UnwindSafe + 'static,
    {
        functions::register(self.connection()?, name, n_args, f)?;
        Ok(())
    }

    /// Disposes the handle and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the first failure among rolling back the handle-level
    /// transaction and closing the connection. Disposal runs to the end
    /// either way.
    pub fn close(mut self) -> Result<()> {
        self.dispose()
    }

    fn dispose(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        let rolled_back = self.transaction.get_mut().dispose_all(&conn);
        let released = self.commands.get_mut().dispose_all();
        conn.flush_prepared_statement_cache();
        debug!(
            database = %self.settings.data_source,
            released,
            "Closing connection"
        );
        let closed = conn.close().map_err(|(_, e)| Error::from(e));
        rolled_back.and(closed)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            warn!(error = %e, "Failed to dispose connection cleanly");
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("database", &self.settings.data_source)
            .field("open", &self.conn.is_some())
            .field("transaction", &self.transaction_state())
            .field("tracked_commands", &self.tracked_commands())
            .finish()
    }
}

fn open_flags(settings: &ConnectionSettings) -> OpenFlags {
    let access = if settings.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else if settings.create_file || settings.is_memory() {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn configure(conn: &Connection, settings: &ConnectionSettings) -> rusqlite::Result<()> {
    if let Some(timeout) = settings.busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    if settings.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    }
    if let Some(mode) = &settings.journal_mode {
        // Validated as a single word when parsed.
        let applied: String =
            conn.query_row(&format!("PRAGMA journal_mode = {mode}"), [], |row| row.get(0))?;
        debug!(requested = %mode, applied = %applied, "Set journal mode");
    }
    functions::register_regexp(conn)
}
