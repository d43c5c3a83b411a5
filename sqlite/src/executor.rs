//! Running a command against a connection in one of the result shapes.
//!
//! [`CommandExecutor`] resolves what to run (text plus bound arguments, or a
//! raw command with its own parameters), prepares it through the
//! connection's statement cache, binds parameters by name and hands the
//! statement to [`materialize`](crate::materialize).

use rusqlite::{Batch, CachedStatement, Connection, Statement};
use rusqlite::fallible_iterator::FallibleIterator;
use scriptlite_core::{
    Args, Lookup, Parameter, ParameterBinder, ParameterSet, ResultSet, Row, Shape, Table, Value,
};
use tracing::debug;

use crate::command::CommandInput;
use crate::convert::to_sql_value;
use crate::error::{Error, Result};
use crate::materialize;

/// Executes commands on a borrowed connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CommandExecutor<'c> {
    conn: &'c Connection,
}

impl<'c> CommandExecutor<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Runs a command and discards any result.
    pub(crate) fn execute(&self, input: CommandInput, args: Args) -> Result<()> {
        self.non_query(input, args).map(|_| ())
    }

    /// Runs a command and returns the number of rows changed; 0 for
    /// statements that do not write.
    pub(crate) fn non_query(&self, input: CommandInput, args: Args) -> Result<u64> {
        let (text, params) = resolve(input, args)?;
        let before = self.conn.total_changes();
        if params.is_empty() {
            debug!(command = %text, "Running command as batch");
            // Prepared one at a time so later statements see earlier DDL.
            let mut batch = Batch::new(self.conn, &text);
            while let Some(mut stmt) = batch.next()? {
                let mut rows = stmt.raw_query();
                while rows.next()?.is_some() {}
            }
        } else {
            let mut stmt = self.prepare(&text, &params)?;
            let mut rows = stmt.raw_query();
            while rows.next()?.is_some() {}
        }
        // Schema statements and reads leave the change counters alone.
        if self.conn.total_changes() == before {
            Ok(0)
        } else {
            Ok(self.conn.changes())
        }
    }

    pub(crate) fn scalar(&self, input: CommandInput, args: Args) -> Result<Value> {
        self.with_statement(input, args, materialize::scalar)
    }

    pub(crate) fn column(&self, input: CommandInput, args: Args) -> Result<Vec<Value>> {
        self.with_statement(input, args, materialize::column)
    }

    pub(crate) fn lookup(&self, input: CommandInput, args: Args) -> Result<Lookup> {
        self.with_statement(input, args, materialize::lookup)
    }

    pub(crate) fn table(&self, input: CommandInput, args: Args) -> Result<Table> {
        self.with_statement(input, args, materialize::table)
    }

    pub(crate) fn rows(&self, input: CommandInput, args: Args) -> Result<Vec<Row>> {
        self.with_statement(input, args, materialize::rows)
    }

    /// Runs a command and materializes it in the requested shape.
    pub(crate) fn run(&self, input: CommandInput, args: Args, shape: Shape) -> Result<ResultSet> {
        Ok(match shape {
            Shape::NonQuery => ResultSet::NonQueryCount(self.non_query(input, args)?),
            Shape::Scalar => ResultSet::Scalar(self.scalar(input, args)?),
            Shape::Column => ResultSet::Column(self.column(input, args)?),
            Shape::Lookup => ResultSet::Lookup(self.lookup(input, args)?),
            Shape::Table => ResultSet::Table(self.table(input, args)?),
        })
    }

    fn with_statement<T>(
        &self,
        input: CommandInput,
        args: Args,
        f: impl FnOnce(&mut Statement<'_>) -> Result<T>,
    ) -> Result<T> {
        let (text, params) = resolve(input, args)?;
        let mut stmt = self.prepare(&text, &params)?;
        f(&mut *stmt)
    }

    fn prepare(&self, text: &str, params: &ParameterSet) -> Result<CachedStatement<'c>> {
        debug!(command = %text, params = params.len(), "Preparing command");
        let mut stmt = self.conn.prepare_cached(text)?;
        for param in params {
            if let Some(index) = parameter_index(&stmt, param)? {
                stmt.raw_bind_parameter(index, to_sql_value(param.value()))?;
            }
        }
        Ok(stmt)
    }
}

/// Picks the command text and parameters, rejecting misuse before any
/// engine call.
fn resolve(input: CommandInput, args: Args) -> Result<(String, ParameterSet)> {
    match input {
        CommandInput::Text(text) => Ok((text, ParameterBinder::bind(args))),
        CommandInput::Command(command) => {
            if !args.is_empty() {
                return Err(Error::ParametersWithRawCommand);
            }
            command.ensure_live()?;
            let params = command.parameters().clone();
            Ok((command.text().to_string(), params))
        }
    }
}

/// Finds the placeholder a parameter binds to.
///
/// Positional names (`"1"`, `"2"`, ...) bind by index. Names with a sigil
/// must match exactly; bare names try `:name`, `@name` and `$name`.
/// Parameters without a matching placeholder are skipped.
fn parameter_index(stmt: &Statement<'_>, param: &Parameter) -> Result<Option<usize>> {
    if let Some(position) = param.position() {
        return Ok((position >= 1 && position <= stmt.parameter_count()).then_some(position));
    }
    let name = param.name();
    if name.starts_with([':', '@', '$', '?']) {
        return Ok(stmt.parameter_index(name)?);
    }
    for sigil in [':', '@', '$'] {
        if let Some(index) = stmt.parameter_index(&format!("{sigil}{name}"))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}
