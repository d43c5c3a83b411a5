//! Error types for connection handle operations.
//!
//! Engine failures are carried unchanged: [`Error::Engine`] displays exactly
//! the engine's message. Only misuse of the handle's contract produces
//! messages of its own.

use scriptlite_core::ValueError;
use thiserror::Error;

/// Broad class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller broke the contract; raised before any engine call.
    Usage,
    /// Syntax, constraint or I/O failure reported by the engine.
    Engine,
    /// Opening the connection or its mandatory transaction failed.
    Lifecycle,
    /// Invalid connection options or configuration file.
    Config,
}

/// Errors that can occur while using a [`ConnectionHandle`](crate::ConnectionHandle).
#[derive(Debug, Error)]
pub enum Error {
    /// Engine failure, propagated as is.
    #[error(transparent)]
    Engine(#[from] rusqlite::Error),

    /// Opening the connection failed.
    #[error("{source}")]
    Open {
        /// Engine failure.
        source: rusqlite::Error,
    },

    /// Beginning the transaction requested at open failed; the connection
    /// has been closed.
    #[error("{source}")]
    Begin {
        /// Engine failure.
        source: rusqlite::Error,
    },

    /// Arguments were supplied together with a raw command.
    #[error("parameters are not used with a raw command")]
    ParametersWithRawCommand,

    /// Commit without an active transaction.
    #[error("no active transaction, it is either completed or was never created")]
    NoActiveTransaction,

    /// A transaction was requested while one already exists or ended.
    #[error("transaction already started")]
    TransactionAlreadyStarted,

    /// Lookup needs two projected columns.
    #[error("lookup requires at least 2 result columns, got {0}")]
    ProjectionArity(usize),

    /// The raw command has been disposed.
    #[error("command has been disposed")]
    CommandDisposed,

    /// The connection has already been closed.
    #[error("connection is closed")]
    Closed,

    /// Parameter value does not fit its declared type.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Connection option cannot be applied.
    #[error("invalid connection option '{key}': {reason}")]
    InvalidOption {
        /// Option key as written.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Configuration file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Engine(_) => ErrorKind::Engine,
            Error::Open { .. } | Error::Begin { .. } | Error::Closed => ErrorKind::Lifecycle,
            Error::ParametersWithRawCommand
            | Error::NoActiveTransaction
            | Error::TransactionAlreadyStarted
            | Error::ProjectionArity(_)
            | Error::CommandDisposed
            | Error::Value(_) => ErrorKind::Usage,
            Error::InvalidOption { .. } | Error::Io(_) | Error::Yaml(_) => ErrorKind::Config,
        }
    }

    /// The underlying engine error, if there is one.
    pub fn engine_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Error::Engine(e) | Error::Open { source: e } | Error::Begin { source: e } => Some(e),
            _ => None,
        }
    }

    /// Primary SQLite result code of an engine failure.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        self.engine_error().and_then(rusqlite::Error::sqlite_error_code)
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
