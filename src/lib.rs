//! Schema-validated command runner for pluggable test modules
//!
//! A test module declares named commands, each with JSON schemas for
//! its arguments and an async `run` handler plus an optional `expect`
//! handler. This crate enforces the module's structural contract,
//! compiles the declared schemas once, and drives the two-phase
//! run/expect lifecycle used to execute a test step and assert on its
//! result.

pub mod common;
pub mod module;
pub mod runner;
pub mod schema;

// Re-export commonly used types for hosts and tests
pub use common::{ContractViolation, Error, HandlerError, Result};
pub use module::{
    AssertionError, AssertionMessage, CommandSpec, DocumentRef, ExpectHandler, ModuleSpec, RunEnv,
    RunHandler,
};
pub use runner::{CommandRunner, ReadySignal};
pub use schema::{DraftEngine, EngineOptions, SchemaEngine};
