//! Turning a prepared, bound statement into one of the result shapes.
//!
//! Every function steps a forward-only cursor once over the result.

use std::sync::Arc;

use rusqlite::Statement;
use scriptlite_core::{Column, Lookup, LookupKey, Row, Table, Value};

use crate::convert::from_value_ref;
use crate::error::{Error, Result};

/// First column of the first row, or `Null` when there is none.
pub(crate) fn scalar(stmt: &mut Statement<'_>) -> Result<Value> {
    if stmt.column_count() == 0 {
        // Still run it for its side effects.
        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
        return Ok(Value::Null);
    }
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => Ok(from_value_ref(row.get_ref(0)?)),
        None => Ok(Value::Null),
    }
}

/// First column of every row.
pub(crate) fn column(stmt: &mut Statement<'_>) -> Result<Vec<Value>> {
    let has_columns = stmt.column_count() > 0;
    let mut values = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        if has_columns {
            values.push(from_value_ref(row.get_ref(0)?));
        }
    }
    Ok(values)
}

/// First column to second column, in cursor order.
pub(crate) fn lookup(stmt: &mut Statement<'_>) -> Result<Lookup> {
    let count = stmt.column_count();
    if count < 2 {
        return Err(Error::ProjectionArity(count));
    }
    let mut lookup = Lookup::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let key = LookupKey::from(from_value_ref(row.get_ref(0)?));
        lookup.insert(key, from_value_ref(row.get_ref(1)?));
    }
    Ok(lookup)
}

/// All rows with the column schema captured before the first step.
pub(crate) fn table(stmt: &mut Statement<'_>) -> Result<Table> {
    let columns: Vec<Column> = stmt
        .columns()
        .iter()
        .map(|c| Column {
            name: c.name().to_string(),
            decl_type: c.decl_type().map(str::to_string),
        })
        .collect();
    let rows = collect_rows(stmt, shared_names(&columns))?;
    Ok(Table { columns, rows })
}

/// All rows, without the declared types.
pub(crate) fn rows(stmt: &mut Statement<'_>) -> Result<Vec<Row>> {
    let names: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .into();
    collect_rows(stmt, names)
}

fn shared_names(columns: &[Column]) -> Arc<[String]> {
    columns
        .iter()
        .map(|c| c.name.clone())
        .collect::<Vec<_>>()
        .into()
}

fn collect_rows(stmt: &mut Statement<'_>, names: Arc<[String]>) -> Result<Vec<Row>> {
    let width = names.len();
    let mut out = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|i| row.get_ref(i).map(from_value_ref))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.push(Row::new(Arc::clone(&names), values));
    }
    Ok(out)
}
