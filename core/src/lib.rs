//! Engine-agnostic building blocks of scriptlite.
//!
//! This crate holds everything that does not need a live connection:
//!
//! - [`Value`] and [`ParamType`]: engine values and declared parameter
//!   types with coercion.
//! - [`Arg`], [`Args`], [`Parameter`] and [`ParameterBinder`]: turning a
//!   loosely typed call-site argument list into named engine parameters.
//! - [`ResourceRegistry`]: deferred, exactly-once disposal of resources
//!   owned by a connection handle.
//! - [`ResultSet`], [`Shape`], [`Table`], [`Row`] and [`Lookup`]: the
//!   materialized result shapes.
//!
//! The SQLite backend lives in the `scriptlite` crate.
//!
//! # Example
//!
//! ```
//! use scriptlite_core::*;
//!
//! let set = ParameterBinder::bind(args![1, Arg::named([("name", "Joe")]), 2]);
//! let names: Vec<_> = set.iter().map(|p| p.name()).collect();
//! assert_eq!(names, ["1", "name", "2"]);
//! ```

mod param;
mod registry;
mod result;
mod value;

pub use param::{Arg, Args, Parameter, ParameterBinder, ParameterSet};
pub use registry::{Resource, ResourceRegistry};
pub use result::{Column, Lookup, ResultSet, Row, Shape, Table};
pub use value::{LookupKey, ParamType, Value, ValueError};
