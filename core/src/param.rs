//! Call-site arguments and parameter binding.
//!
//! A host hands over a loosely typed argument list. Each argument is one of
//! three shapes, modelled by [`Arg`]:
//!
//! - a named mapping, expanded into one named parameter per entry,
//! - a fully typed [`Parameter`], attached as is,
//! - a plain value, bound positionally.
//!
//! [`ParameterBinder`] resolves them, in order, into a [`ParameterSet`].
//! Positional values are named `"1"`, `"2"`, ... by their rank among
//! positional values only; named and typed arguments never consume a slot.
//!
//! # Examples
//!
//! ```
//! use indexmap::IndexMap;
//! use scriptlite_core::{Arg, Args, Parameter, ParameterBinder, ParamType, Value};
//!
//! let mut named = IndexMap::new();
//! named.insert("name".to_string(), Value::from("Joe"));
//!
//! let set = ParameterBinder::bind(Args::List(vec![
//!     Arg::from(10),
//!     Arg::Named(named),
//!     Arg::from(Parameter::typed("@flag", ParamType::Boolean, "yes").unwrap()),
//!     Arg::from("x"),
//! ]));
//!
//! let names: Vec<_> = set.iter().map(|p| p.name()).collect();
//! assert_eq!(names, ["1", "name", "@flag", "2"]);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{ParamType, Value, ValueError};

/// One bound engine parameter: name, optional declared type, and value.
///
/// A typed parameter always holds a value of its declared type; the value
/// is coerced when the parameter is built and on every
/// [`set_value`](Parameter::set_value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    param_type: Option<ParamType>,
    value: Value,
}

impl Parameter {
    /// Creates an untyped parameter.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            param_type: None,
            value: value.into(),
        }
    }

    /// Creates a typed parameter, coercing `value` to `param_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Conversion`] if the value cannot be represented
    /// in the declared type.
    pub fn typed(
        name: impl Into<String>,
        param_type: ParamType,
        value: impl Into<Value>,
    ) -> Result<Self, ValueError> {
        Ok(Self {
            name: name.into(),
            param_type: Some(param_type),
            value: param_type.coerce(value.into())?,
        })
    }

    /// Parameter name as given (may carry a `:`, `@` or `$` sigil).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type, if the parameter is typed.
    pub fn param_type(&self) -> Option<ParamType> {
        self.param_type
    }

    /// Current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replaces the value, coercing it under the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Conversion`] if the value cannot be represented
    /// in the declared type; the previous value is kept.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ValueError> {
        let value = value.into();
        self.value = match self.param_type {
            Some(ty) => ty.coerce(value)?,
            None => value,
        };
        Ok(())
    }

    /// One-based position for positional names (`"1"`, `"2"`, ...).
    pub fn position(&self) -> Option<usize> {
        if self.name.is_empty() || !self.name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.name.parse().ok()
    }
}

/// One call-site argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Key/value pairs, each bound as a named parameter.
    Named(IndexMap<String, Value>),
    /// A pre-built parameter, bound verbatim.
    Typed(Parameter),
    /// A plain value, bound at the next positional slot.
    Positional(Value),
}

impl Arg {
    /// Builds a named-mapping argument from pairs.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Arg::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

macro_rules! positional_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(v: $ty) -> Self {
                    Arg::Positional(Value::from(v))
                }
            }
        )*
    };
}

positional_from!(i32, i64, u32, f64, bool, String, &str, Vec<u8>, &[u8]);

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Positional(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        Arg::Positional(Value::from(v))
    }
}

impl From<Parameter> for Arg {
    fn from(p: Parameter) -> Self {
        Arg::Typed(p)
    }
}

impl From<IndexMap<String, Value>> for Arg {
    fn from(map: IndexMap<String, Value>) -> Self {
        Arg::Named(map)
    }
}

/// The whole argument list of one call.
///
/// Hosts distinguish "no arguments" from "an argument list that is itself
/// null". The first binds nothing; the second binds a single parameter
/// `"1" = NULL`, which keeps engines that reject parameterless binds of a
/// placeholder command working.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Args {
    /// Omitted or explicitly empty: no parameters.
    #[default]
    None,
    /// The list itself is null: one null parameter named `"1"`.
    Null,
    /// Ordered arguments.
    List(Vec<Arg>),
}

impl Args {
    /// Returns `true` if binding these arguments yields no parameters.
    pub fn is_empty(&self) -> bool {
        match self {
            Args::None => true,
            Args::Null => false,
            Args::List(list) => list.is_empty(),
        }
    }
}

impl From<Vec<Arg>> for Args {
    fn from(list: Vec<Arg>) -> Self {
        Args::List(list)
    }
}

impl From<Arg> for Args {
    fn from(arg: Arg) -> Self {
        Args::List(vec![arg])
    }
}

/// Builds an [`Args::List`] from values convertible into [`Arg`].
///
/// ```
/// use scriptlite_core::{args, Args};
///
/// let list = args![1, "two", None::<i64>];
/// assert!(matches!(list, Args::List(ref v) if v.len() == 3));
/// assert_eq!(args![], Args::List(vec![]));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::List(::std::vec::Vec::new())
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::Args::List(::std::vec![$($crate::Arg::from($arg)),+])
    };
}

/// Ordered parameters of one command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn push(&mut self, param: Parameter) {
        self.params.push(param);
    }

    /// Finds the first parameter with the given name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Finds the first parameter with the given name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    /// Iterates in binding order.
    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Removes every parameter.
    pub fn clear(&mut self) {
        self.params.clear();
    }
}

impl From<Vec<Parameter>> for ParameterSet {
    fn from(params: Vec<Parameter>) -> Self {
        Self { params }
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// Resolves call-site arguments into parameters.
///
/// Keeps the running positional counter, so arguments of one command may be
/// fed in several calls to [`bind_into`](Self::bind_into).
#[derive(Debug)]
pub struct ParameterBinder {
    next_position: usize,
}

impl Default for ParameterBinder {
    fn default() -> Self {
        Self { next_position: 1 }
    }
}

impl ParameterBinder {
    /// Creates a binder whose first positional name is `"1"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a whole argument list into a fresh set.
    pub fn bind(args: Args) -> ParameterSet {
        let mut set = ParameterSet::new();
        Self::new().bind_into(&mut set, args);
        set
    }

    /// Binds a whole argument list, appending to `set`.
    pub fn bind_into(&mut self, set: &mut ParameterSet, args: Args) {
        match args {
            Args::None => {}
            Args::Null => set.push(Parameter::new("1", Value::Null)),
            Args::List(list) => {
                for arg in list {
                    self.bind_arg(set, arg);
                }
            }
        }
    }

    /// Binds one argument, appending to `set`.
    pub fn bind_arg(&mut self, set: &mut ParameterSet, arg: Arg) {
        match arg {
            Arg::Named(map) => {
                for (name, value) in map {
                    set.push(Parameter::new(name, value));
                }
            }
            Arg::Typed(param) => set.push(param),
            Arg::Positional(value) => {
                set.push(Parameter::new(self.next_position.to_string(), value));
                self.next_position += 1;
            }
        }
    }
}
