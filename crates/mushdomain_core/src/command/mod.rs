//! Command surface exposed to the game host.
//!
//! # Responsibility
//! - Map a command name plus parameters onto one store operation.
//! - Own transaction scope and the in-band error protocol.
//!
//! # Invariants
//! - One command per process; nothing here outlives the invocation.

pub mod error;
pub mod handlers;
pub mod params;
pub mod registry;
pub mod reply;
pub mod router;

pub use error::{CommandError, CommandResult, ErrorClass, INTERNAL_ERROR_RESPONSE};
pub use params::{parse_register_spec, Params};
pub use registry::{CommandHandler, CommandRegistry, FnHandler, HandlerFn, RegistryError};
pub use reply::Reply;
pub use router::{
    write_response, CommandRouter, Dispatch, InvocationState, UNKNOWN_COMMAND_RESPONSE,
};
