//! Command handler contract and the name-to-handler registry.
//!
//! # Invariants
//! - Command names are unique and non-empty.
//! - The registry is built once per process and only read afterwards.

use super::error::CommandResult;
use super::handlers::default_handlers;
use super::params::Params;
use super::reply::Reply;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One host command.
pub trait CommandHandler {
    /// Name the host invokes the command by.
    fn name(&self) -> &'static str;
    /// Whether the router must wrap `execute` in one transaction.
    fn transactional(&self) -> bool;
    /// Runs the command against a migrated connection.
    fn execute(&self, conn: &Connection, params: &Params) -> CommandResult<Reply>;
}

/// Plain-function handler body.
pub type HandlerFn = fn(&Connection, &Params) -> CommandResult<Reply>;

/// Handler backed by a plain function.
#[derive(Clone, Copy)]
pub struct FnHandler {
    name: &'static str,
    transactional: bool,
    run: HandlerFn,
}

impl FnHandler {
    /// Handler whose writes the router wraps in one transaction.
    pub fn transactional(name: &'static str, run: HandlerFn) -> Self {
        Self {
            name,
            transactional: true,
            run,
        }
    }

    /// Read-only or single-statement handler.
    pub fn direct(name: &'static str, run: HandlerFn) -> Self {
        Self {
            name,
            transactional: false,
            run,
        }
    }
}

impl CommandHandler for FnHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn transactional(&self) -> bool {
        self.transactional
    }

    fn execute(&self, conn: &Connection, params: &Params) -> CommandResult<Reply> {
        (self.run)(conn, params)
    }
}

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidCommandName(String),
    DuplicateCommandName(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCommandName(name) => write!(f, "command name is invalid: `{name}`"),
            Self::DuplicateCommandName(name) => {
                write!(f, "command already registered: `{name}`")
            }
        }
    }
}

impl Error for RegistryError {}

/// Name-to-handler lookup table.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_default_handlers() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for handler in default_handlers() {
            registry.register(Box::new(handler))?;
        }
        Ok(registry)
    }

    /// Registers one handler.
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) -> Result<(), RegistryError> {
        let name = handler.name();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidCommandName(name.to_string()));
        }
        if self.handlers.contains_key(name) {
            return Err(RegistryError::DuplicateCommandName(name.to_string()));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Looks up a handler by exact command name.
    pub fn get(&self, name: &str) -> Option<&dyn CommandHandler> {
        self.handlers.get(name.trim()).map(|handler| handler.as_ref())
    }

    /// Sorted command names.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
