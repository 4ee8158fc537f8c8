//! Error types for the module runner
//!
//! Only fatal dispatch and construction failures live here. Assertion
//! failures are ordinary values (`AssertionError`) returned by expect
//! handlers and never travel through this type.

use thiserror::Error;

use crate::module::AssertionError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque error raised inside a user-supplied run handler
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the module runner
#[derive(Error, Debug)]
pub enum Error {
    // === Construction Errors ===
    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error("Module '{module}' JSON schema(s) are not valid: {detail}")]
    SchemaCompile { module: String, detail: String },

    // === Dispatch Errors ===
    #[error("Command '{command}' is not defined")]
    UnknownCommand { command: String },

    #[error("Command '{command}' has no expect handler")]
    MissingExpectHandler { command: String },

    // === Argument Validation Errors ===
    /// Carries every schema and supplementary violation for one call,
    /// so a host can report all problems at once.
    #[error("Failed to validate command arguments")]
    InvalidArguments { errors: Vec<AssertionError> },

    // === Handler Errors ===
    /// Failure raised by a user-supplied run handler, passed through
    /// without interpretation.
    #[error("{0}")]
    Handler(HandlerError),
}

impl Error {
    /// Create an unknown-command error
    pub fn unknown_command(command: &str) -> Self {
        Self::UnknownCommand {
            command: command.to_string(),
        }
    }

    /// The full violation list of an argument-validation error, if any
    pub fn argument_errors(&self) -> Option<&[AssertionError]> {
        match self {
            Self::InvalidArguments { errors } => Some(errors),
            _ => None,
        }
    }
}

/// Structural contract violations detected before any schema is compiled
///
/// Each variant names the exact rule (and command) a module definition
/// broke; construction stops at the first one found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("Module definition must have a non-empty 'name'")]
    MissingName,

    #[error("Module definition must have a non-empty 'description'")]
    MissingDescription,

    #[error("Module definition must have a 'defaults_schema'")]
    MissingDefaultsSchema,

    #[error("Module command '{command}' must have a non-empty 'description'")]
    CommandMissingDescription { command: String },

    #[error("Module command '{command}' must have a 'run' handler")]
    CommandMissingRun { command: String },

    #[error("Module command '{command}' must have an 'args_schema'")]
    CommandMissingArgsSchema { command: String },

    #[error("Module command '{command}' declares an 'expect' handler but no 'expect_schema'")]
    CommandMissingExpectSchema { command: String },

    #[error("Module command '{command}' uses reserved metadata key '{key}'")]
    CommandReservedKey { command: String, key: &'static str },
}
