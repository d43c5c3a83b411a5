//! Materialized query results.
//!
//! A query result takes one of the shapes selected by [`Shape`]: an
//! affected-row count, a scalar, the first column of every row, a lookup
//! from the first column to the second, or a full [`Table`].

use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::value::{LookupKey, Value};

/// First column to second column, in cursor order. A repeated key keeps its
/// first position and takes the last value.
pub type Lookup = IndexMap<LookupKey, Value>;

/// Requested result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Affected-row count.
    NonQuery,
    /// First column of the first row.
    Scalar,
    /// First column of every row.
    Column,
    /// First column to second column.
    Lookup,
    /// All rows with their column schema.
    Table,
}

/// Name and declared type of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as reported by the engine.
    pub name: String,
    /// Declared type from the table definition; `None` for expressions.
    pub decl_type: Option<String>,
}

/// One result row: a named mapping of column to value.
///
/// Column names are shared by all rows of a result.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use scriptlite_core::{Row, Value};
///
/// let columns: Arc<[String]> = vec!["id".to_string(), "Name".to_string()].into();
/// let row = Row::new(columns, vec![Value::from(1), Value::from("Joe")]);
///
/// assert_eq!(row.get("id"), Some(&Value::Integer(1)));
/// assert_eq!(row.get("name"), Some(&Value::from("Joe")));
/// assert_eq!(row.get_index(5), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` is in column order.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Value of the named column: exact match first, then ASCII
    /// case-insensitive.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))?;
        self.values.get(index)
    }

    /// Value at a zero-based column index.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` for a row without columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A fully materialized result: column schema plus rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    /// Columns, captured once before the first row.
    pub columns: Vec<Column>,
    /// Rows in cursor order.
    pub rows: Vec<Row>,
}

impl Table {
    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of one command in the requested [`Shape`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    /// Number of rows changed.
    NonQueryCount(u64),
    /// Single value; [`Value::Null`] when there were no rows.
    Scalar(Value),
    /// First column of every row.
    Column(Vec<Value>),
    /// First column to second column, serialized as `[key, value]` pairs.
    #[serde(serialize_with = "serialize_pairs")]
    Lookup(Lookup),
    /// All rows.
    Table(Table),
}

// Not a map: keys such as 1 and '1' would collide as JSON object keys.
fn serialize_pairs<S: Serializer>(lookup: &Lookup, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(lookup.iter())
}

impl ResultSet {
    /// The shape this result has.
    pub fn shape(&self) -> Shape {
        match self {
            ResultSet::NonQueryCount(_) => Shape::NonQuery,
            ResultSet::Scalar(_) => Shape::Scalar,
            ResultSet::Column(_) => Shape::Column,
            ResultSet::Lookup(_) => Shape::Lookup,
            ResultSet::Table(_) => Shape::Table,
        }
    }
}
