//! One-shot command dispatch for a single process invocation.
//!
//! # Responsibility
//! - Resolve the command name through the registry.
//! - Wrap transactional handlers in one IMMEDIATE transaction.
//! - Turn every outcome into exactly one encoded response line.
//!
//! # Invariants
//! - An invocation moves `Pending -> Committed` or `Pending -> RolledBack`
//!   exactly once.
//! - No handler failure escapes as a panic or a process exit status; it is
//!   logged and answered in-band.
//! - The response line is written with a single `write_all`.

use super::error::{CommandError, CommandResult, ErrorClass};
use super::params::Params;
use super::registry::{CommandHandler, CommandRegistry};
use super::reply::Reply;
use crate::encode::encode;
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::io::Write;
use std::time::Instant;
use uuid::Uuid;

/// Response for a command name with no registered handler.
pub const UNKNOWN_COMMAND_RESPONSE: &str = "#-1 UNKNOWN COMMAND";

/// Lifecycle of one invocation's writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    Committed,
    RolledBack,
}

/// Outcome of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Response text before encoding.
    pub response: String,
    pub state: InvocationState,
}

/// Routes one command to its handler.
pub struct CommandRouter {
    registry: CommandRegistry,
    invocation_id: Uuid,
}

impl CommandRouter {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry,
            invocation_id: Uuid::new_v4(),
        }
    }

    /// Correlates this invocation's log lines across concurrent processes.
    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Runs `command` and returns its unencoded response.
    pub fn dispatch(&self, conn: &mut Connection, command: &str, params: &Params) -> Dispatch {
        let started_at = Instant::now();
        let Some(handler) = self.registry.get(command) else {
            warn!(
                "event=command_dispatch module=command status=error invocation_id={} error_code=unknown_command",
                self.invocation_id
            );
            return Dispatch {
                response: UNKNOWN_COMMAND_RESPONSE.to_string(),
                state: InvocationState::RolledBack,
            };
        };

        let command_name = handler.name();
        info!(
            "event=command_dispatch module=command status=start invocation_id={} command={} transactional={}",
            self.invocation_id,
            command_name,
            handler.transactional()
        );

        let mut state = InvocationState::Pending;
        let result = if handler.transactional() {
            run_in_transaction(conn, handler, params, &mut state)
        } else {
            let result = handler.execute(conn, params);
            state = if result.is_ok() {
                InvocationState::Committed
            } else {
                InvocationState::RolledBack
            };
            result
        };

        let response = match result {
            Ok(reply) => {
                info!(
                    "event=command_dispatch module=command status=ok invocation_id={} command={} duration_ms={}",
                    self.invocation_id,
                    command_name,
                    started_at.elapsed().as_millis()
                );
                reply.to_wire_text()
            }
            Err(err) => {
                self.log_failure(command_name, &err, started_at);
                err.response_text()
            }
        };

        Dispatch { response, state }
    }

    /// Runs `command` and writes its encoded response line to `out`.
    pub fn route(
        &self,
        conn: &mut Connection,
        command: &str,
        params: &Params,
        out: &mut impl Write,
    ) -> std::io::Result<Dispatch> {
        let dispatch = self.dispatch(conn, command, params);
        write_response(out, &dispatch.response)?;
        Ok(dispatch)
    }

    fn log_failure(&self, command_name: &str, err: &CommandError, started_at: Instant) {
        match err.class() {
            ErrorClass::Internal => error!(
                "event=command_dispatch module=command status=error invocation_id={} command={} duration_ms={} error_code={} error={}",
                self.invocation_id,
                command_name,
                started_at.elapsed().as_millis(),
                err.error_code(),
                err
            ),
            ErrorClass::Constraint | ErrorClass::Precondition => warn!(
                "event=command_dispatch module=command status=rejected invocation_id={} command={} duration_ms={} error_code={}",
                self.invocation_id,
                command_name,
                started_at.elapsed().as_millis(),
                err.error_code()
            ),
        }
    }
}

/// Encodes `response` and writes it as one newline-terminated line.
pub fn write_response(out: &mut impl Write, response: &str) -> std::io::Result<()> {
    let mut line = encode(response);
    line.push('\n');
    out.write_all(line.as_bytes())?;
    out.flush()
}

fn run_in_transaction(
    conn: &mut Connection,
    handler: &dyn CommandHandler,
    params: &Params,
    state: &mut InvocationState,
) -> CommandResult<Reply> {
    *state = InvocationState::RolledBack;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    match handler.execute(&tx, params) {
        Ok(reply) => {
            tx.commit()?;
            *state = InvocationState::Committed;
            Ok(reply)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                error!(
                    "event=command_rollback module=command status=error command={} error={}",
                    handler.name(),
                    rollback_err
                );
            }
            Err(err)
        }
    }
}
