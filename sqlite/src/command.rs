//! Raw commands: reusable command text with its own parameter set.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use scriptlite_core::{Parameter, ParameterSet, Resource, Value};

use crate::error::{Error, Result};

/// A command object owned by its creator.
///
/// Clones share the same command. Parameters are set on the command itself;
/// executing it with extra arguments is an error. A handle tracks the
/// commands it created with tracking on and disposes them when it closes.
#[derive(Clone)]
pub struct Command {
    inner: Rc<CommandInner>,
}

struct CommandInner {
    text: String,
    params: RefCell<ParameterSet>,
    disposed: Cell<bool>,
}

impl Command {
    pub(crate) fn new(text: impl Into<String>, params: Vec<Parameter>) -> Self {
        Self {
            inner: Rc::new(CommandInner {
                text: text.into(),
                params: RefCell::new(ParameterSet::from(params)),
                disposed: Cell::new(false),
            }),
        }
    }

    /// The command text.
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Borrows the parameter set.
    pub fn parameters(&self) -> Ref<'_, ParameterSet> {
        self.inner.params.borrow()
    }

    /// Appends a parameter.
    pub fn add_parameter(&self, param: Parameter) -> Result<()> {
        self.ensure_live()?;
        self.inner.params.borrow_mut().push(param);
        Ok(())
    }

    /// Sets the value of a named parameter, adding it if missing. A
    /// declared type is kept and the value coerced to it.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_live()?;
        let mut params = self.inner.params.borrow_mut();
        match params.get_mut(name) {
            Some(param) => param.set_value(value)?,
            None => params.push(Parameter::new(name, value)),
        }
        Ok(())
    }

    /// Returns `true` once disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Disposes the command. Later executions fail with
    /// [`Error::CommandDisposed`].
    pub fn dispose(&self) {
        self.release();
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::CommandDisposed)
        } else {
            Ok(())
        }
    }
}

impl Resource for Command {
    fn release(&self) {
        if !self.inner.disposed.replace(true) {
            self.inner.params.borrow_mut().clear();
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.inner.text)
            .field("params", &self.inner.params.borrow().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// What can be executed: command text or a raw [`Command`].
#[derive(Debug, Clone)]
pub enum CommandInput {
    /// Command text; arguments are bound to it.
    Text(String),
    /// A raw command carrying its own parameters.
    Command(Command),
}

impl From<&str> for CommandInput {
    fn from(text: &str) -> Self {
        CommandInput::Text(text.to_string())
    }
}

impl From<String> for CommandInput {
    fn from(text: String) -> Self {
        CommandInput::Text(text)
    }
}

impl From<&String> for CommandInput {
    fn from(text: &String) -> Self {
        CommandInput::Text(text.clone())
    }
}

impl From<Command> for CommandInput {
    fn from(command: Command) -> Self {
        CommandInput::Command(command)
    }
}

impl From<&Command> for CommandInput {
    fn from(command: &Command) -> Self {
        CommandInput::Command(command.clone())
    }
}
