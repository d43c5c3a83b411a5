//! SQLite connection handle for scripting hosts.
//!
//! A [`ConnectionHandle`] wraps one SQLite connection together with an
//! optional handle-level transaction and the raw commands it owns. Commands
//! run as text with loosely typed arguments, or as reusable [`Command`]
//! objects, and their results come back in one of the shapes of
//! [`Shape`].
//!
//! # Architecture
//!
//! - **`options`**: open options, YAML loading and connection-string parsing
//! - **`handle`**: open sequence, operations and disposal
//! - **`transaction`**: handle-level transaction state and scoped transactions
//! - **`executor`**: parameter binding and statement preparation
//! - **`materialize`**: cursor to result shape
//! - **`command`**: raw commands
//! - **`functions`**: `REGEXP` and host scalar functions
//! - **`convert`**: value conversion to and from the engine
//!
//! # Quick start
//!
//! ```
//! use scriptlite::{args, Arg, ConnectionHandle, OpenOptions, Shape, ResultSet};
//!
//! let db = ConnectionHandle::open(&OpenOptions::memory()).unwrap();
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", args![]).unwrap();
//! db.execute(
//!     "INSERT INTO users (name) VALUES (:name)",
//!     args![Arg::named([("name", "Joe")])],
//! )
//! .unwrap();
//!
//! let names = db.query("SELECT id, name FROM users", args![], Shape::Lookup).unwrap();
//! assert!(matches!(names, ResultSet::Lookup(ref l) if l.len() == 1));
//! ```
//!
//! # Transactions
//!
//! Opening with [`OpenOptions::transaction`] begins a transaction that lasts
//! until [`ConnectionHandle::commit`]; if the handle is dropped first, the
//! transaction is rolled back. [`ConnectionHandle::use_transaction`] runs a
//! closure in its own transaction instead.

mod command;
mod convert;
mod error;
mod executor;
mod functions;
mod handle;
mod materialize;
mod options;
mod transaction;

pub use command::{Command, CommandInput};
pub use error::{Error, ErrorKind, Result};
pub use handle::ConnectionHandle;
pub use options::{ConnectionSettings, ConnectionString, MEMORY_TARGET, OpenOptions};
pub use transaction::{TransactionEnd, TransactionState};

pub use scriptlite_core::{
    Arg, Args, Column, Lookup, LookupKey, ParamType, Parameter, ResultSet, Row, Shape, Table,
    Value, ValueError, args,
};
