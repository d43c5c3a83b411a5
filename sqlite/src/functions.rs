//! Scalar SQL functions registered on a connection.
//!
//! `REGEXP` is always present, so `x REGEXP 'pattern'` works out of the box.
//! Host functions are added through
//! [`ConnectionHandle::register_function`](crate::ConnectionHandle::register_function).

use std::panic::UnwindSafe;
use std::sync::Arc;

use regex::Regex;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use scriptlite_core::Value;

use crate::convert::{from_value_ref, to_sql_value};

fn flags() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers a deterministic scalar function taking `n_args` arguments
/// (`-1` for any number).
pub(crate) fn register<F>(conn: &Connection, name: &str, n_args: i32, f: F) -> rusqlite::Result<()>
where
    F: Fn(&[Value]) -> Value + Send + UnwindSafe + 'static,
{
    conn.create_scalar_function(name, n_args, flags(), move |ctx| {
        let args: Vec<Value> = (0..ctx.len()).map(|i| from_value_ref(ctx.get_raw(i))).collect();
        Ok(to_sql_value(&f(&args)))
    })
}

/// Registers `REGEXP(pattern, input)`.
///
/// Non-text arguments never match. The compiled pattern is kept as
/// auxiliary data, so a constant pattern compiles once per statement.
pub(crate) fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("regexp", 2, flags(), regexp)
}

fn regexp(ctx: &Context<'_>) -> rusqlite::Result<bool> {
    let input = match (ctx.get_raw(0), ctx.get_raw(1)) {
        (ValueRef::Text(_), ValueRef::Text(input)) => match std::str::from_utf8(input) {
            Ok(input) => input,
            Err(_) => return Ok(false),
        },
        _ => return Ok(false),
    };
    let re: Arc<Regex> = ctx.get_or_create_aux(0, |pattern| -> Result<_, BoxError> {
        Ok(Regex::new(pattern.as_str()?)?)
    })?;
    Ok(re.is_match(input))
}
