//! Test module definitions and their structural contract
//!
//! A module author builds a [`ModuleSpec`]; the contract validator in
//! [`contract`] turns it into the typed [`Module`](contract::Module)
//! form the command runner operates on.

pub mod contract;
pub mod handlers;
pub mod types;

pub use contract::RESERVED_METADATA_KEYS;
pub use handlers::{
    check_fn, expect_fn, label_fn, run_fn, ExpectHandler, HandlerResult, LabelFn, RunHandler,
    ValueCheck,
};
pub use types::{
    AssertionError, AssertionMessage, CommandSpec, DocumentRef, ModuleSpec, RunEnv,
};
