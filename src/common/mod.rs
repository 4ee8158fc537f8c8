//! Shared error and result types

pub mod error;

pub use error::{ContractViolation, Error, HandlerError, Result};
