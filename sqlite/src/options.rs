//! Open options and connection-string parsing.
//!
//! [`OpenOptions`] gathers everything needed to open a
//! [`ConnectionHandle`](crate::ConnectionHandle): a database target, a free
//! form options string of `key=value;` pairs, and explicit switches. It can
//! be loaded from YAML:
//!
//! ```yaml
//! database: data/app.db
//! options: "Busy Timeout=2000; Journal Mode=WAL"
//! create_file: true
//! foreign_keys: true
//! transaction: false
//! ```
//!
//! # Resolution rules
//!
//! - Target and options both empty: an in-memory database.
//! - A non-empty target is the data source, overriding `Data Source` in the
//!   options string.
//! - Switches and their options-string counterparts are combined; either
//!   one turns the feature on.

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// The in-memory target name.
pub const MEMORY_TARGET: &str = ":memory:";

/// Options for opening a connection handle.
///
/// # Examples
///
/// ```
/// use scriptlite::OpenOptions;
///
/// let opts = OpenOptions::new("app.db").foreign_keys(true).transaction(true);
/// assert_eq!(opts.database, "app.db");
/// assert!(opts.foreign_keys);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Database file, `:memory:`, or a `file:` URI. May be empty.
    pub database: String,
    /// Engine options as `key=value;` pairs. May be empty.
    pub options: String,
    /// Create the database file if it does not exist.
    pub create_file: bool,
    /// Begin a transaction right after opening.
    pub transaction: bool,
    /// Let scoped transactions nest as savepoints.
    pub allow_nested_transactions: bool,
    /// Enforce foreign key constraints.
    pub foreign_keys: bool,
    /// Open the database read-only.
    pub read_only: bool,
}

impl OpenOptions {
    /// Creates options for the given target with every switch off.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Options for a private in-memory database.
    pub fn memory() -> Self {
        Self::new(MEMORY_TARGET)
    }

    /// Sets the engine options string.
    pub fn options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    /// Sets [`create_file`](Self::create_file).
    pub fn create_file(mut self, on: bool) -> Self {
        self.create_file = on;
        self
    }

    /// Sets [`transaction`](Self::transaction).
    pub fn transaction(mut self, on: bool) -> Self {
        self.transaction = on;
        self
    }

    /// Sets [`allow_nested_transactions`](Self::allow_nested_transactions).
    pub fn allow_nested_transactions(mut self, on: bool) -> Self {
        self.allow_nested_transactions = on;
        self
    }

    /// Sets [`foreign_keys`](Self::foreign_keys).
    pub fn foreign_keys(mut self, on: bool) -> Self {
        self.foreign_keys = on;
        self
    }

    /// Sets [`read_only`](Self::read_only).
    pub fn read_only(mut self, on: bool) -> Self {
        self.read_only = on;
        self
    }

    /// Loads options from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or [`Error::Yaml`]
    /// if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let options = serde_yaml::from_reader(reader)?;
        Ok(options)
    }

    /// Saves the options as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written, or
    /// [`Error::Yaml`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Resolves target, options string and switches into one settings set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for malformed option values, or when
    /// neither the target nor the options string names a data source.
    pub fn resolve(&self) -> Result<ConnectionSettings> {
        if self.database.is_empty() && self.options.trim().is_empty() {
            return Ok(ConnectionSettings {
                data_source: MEMORY_TARGET.to_string(),
                ..ConnectionSettings::from_switches(self)
            });
        }

        let parsed = ConnectionString::parse(&self.options)?;
        let data_source = if !self.database.is_empty() {
            self.database.clone()
        } else {
            parsed.data_source.clone().ok_or_else(|| Error::InvalidOption {
                key: "Data Source".to_string(),
                reason: "no database given and no data source in options".to_string(),
            })?
        };

        let switches = ConnectionSettings::from_switches(self);
        Ok(ConnectionSettings {
            data_source,
            read_only: switches.read_only || parsed.read_only,
            foreign_keys: switches.foreign_keys || parsed.foreign_keys,
            allow_nested_transactions: switches.allow_nested_transactions
                || parsed.allow_nested_transactions,
            busy_timeout: parsed.busy_timeout,
            journal_mode: parsed.journal_mode,
            ..switches
        })
    }
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// File path, `:memory:` or `file:` URI.
    pub data_source: String,
    /// Create the file if missing.
    pub create_file: bool,
    /// Begin a transaction after opening.
    pub transaction: bool,
    /// Scoped transactions may nest as savepoints.
    pub allow_nested_transactions: bool,
    /// Run `PRAGMA foreign_keys = ON`.
    pub foreign_keys: bool,
    /// Open read-only.
    pub read_only: bool,
    /// Busy handler timeout; engine default when `None`.
    pub busy_timeout: Option<Duration>,
    /// `PRAGMA journal_mode` value.
    pub journal_mode: Option<String>,
}

impl ConnectionSettings {
    fn from_switches(options: &OpenOptions) -> Self {
        Self {
            data_source: options.database.clone(),
            create_file: options.create_file,
            transaction: options.transaction,
            allow_nested_transactions: options.allow_nested_transactions,
            foreign_keys: options.foreign_keys,
            read_only: options.read_only,
            busy_timeout: None,
            journal_mode: None,
        }
    }

    /// Returns `true` for a private in-memory database.
    pub fn is_memory(&self) -> bool {
        self.data_source.eq_ignore_ascii_case(MEMORY_TARGET)
    }
}

/// Parsed `key=value;` options string.
///
/// Keys are case-insensitive and spaces inside keys are ignored, so
/// `Foreign Keys`, `foreignkeys` and `FOREIGN KEYS` are the same key.
///
/// # Examples
///
/// ```
/// use scriptlite::ConnectionString;
///
/// let cs = ConnectionString::parse("Data Source=app.db; Foreign Keys=True; Flags=AllowNestedTransactions").unwrap();
/// assert_eq!(cs.data_source.as_deref(), Some("app.db"));
/// assert!(cs.foreign_keys);
/// assert!(cs.allow_nested_transactions);
/// assert!(!cs.read_only);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    /// `Data Source`.
    pub data_source: Option<String>,
    /// `Read Only`.
    pub read_only: bool,
    /// `Foreign Keys`.
    pub foreign_keys: bool,
    /// `Flags` contains `AllowNestedTransactions`.
    pub allow_nested_transactions: bool,
    /// `Busy Timeout` (milliseconds) or `Default Timeout` (seconds).
    pub busy_timeout: Option<Duration>,
    /// `Journal Mode`.
    pub journal_mode: Option<String>,
}

impl ConnectionString {
    /// Parses an options string. Empty segments are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for a segment without `=` or a value
    /// that does not fit its key.
    pub fn parse(options: &str) -> Result<Self> {
        let mut parsed = Self::default();

        for segment in options.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let Some((raw_key, raw_value)) = segment.split_once('=') else {
                return Err(invalid(segment, "expected key=value"));
            };
            let value = unquote(raw_value.trim());
            let key: String = raw_key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();

            match key.as_str() {
                "datasource" | "data" | "filename" => {
                    parsed.data_source = Some(value.to_string());
                }
                "readonly" => parsed.read_only = parse_bool(raw_key, value)?,
                "foreignkeys" => parsed.foreign_keys = parse_bool(raw_key, value)?,
                "flags" => {
                    parsed.allow_nested_transactions = value
                        .split([',', '|', ' '])
                        .any(|flag| flag.trim().eq_ignore_ascii_case("AllowNestedTransactions"));
                }
                "busytimeout" => {
                    parsed.busy_timeout = Some(Duration::from_millis(parse_number(raw_key, value)?));
                }
                "defaulttimeout" => {
                    parsed.busy_timeout = Some(Duration::from_secs(parse_number(raw_key, value)?));
                }
                "journalmode" => {
                    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphabetic()) {
                        return Err(invalid(raw_key, "journal mode must be a single word"));
                    }
                    parsed.journal_mode = Some(value.to_ascii_uppercase());
                }
                "version" => {}
                _ => warn!(key = raw_key.trim(), "Ignoring unknown connection option"),
            }
        }

        Ok(parsed)
    }
}

fn invalid(key: &str, reason: &str) -> Error {
    Error::InvalidOption {
        key: key.trim().to_string(),
        reason: reason.to_string(),
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, &format!("expected a boolean, got '{value}'"))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| invalid(key, &format!("expected a non-negative integer, got '{value}'")))
}
