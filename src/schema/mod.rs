//! Schema compilation seam
//!
//! The runner consumes schema validation as an opaque capability:
//! compile a schema object once, then sanitize-and-validate instances
//! against it. Keeping this behind a trait lets the core's tests use a
//! deterministic engine instead of a real JSON Schema implementation.

pub mod engine;

pub use engine::{DraftEngine, EngineOptions};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Error produced when a declared schema itself fails to compile
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CompileError(pub String);

/// One rule violation reported by a compiled validator
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending part of the instance
    pub instance_path: String,
    /// JSON pointer to the violated schema rule
    pub schema_path: String,
    /// Human-readable description of the violation
    pub message: String,
}

/// Compiles schema objects into validators
pub trait SchemaEngine: Send + Sync {
    /// Compile one schema; fails when the schema itself is malformed
    fn compile(&self, schema: &Value) -> Result<Box<dyn CompiledSchema>, CompileError>;
}

/// A compiled validator for one schema
pub trait CompiledSchema: Send + Sync {
    /// Sanitize `data` in place, then validate it
    ///
    /// Sanitization fills schema-declared defaults and strips
    /// undeclared properties before the handler ever sees the value.
    /// Validation reports every violation in one pass, not just the
    /// first.
    fn apply(&self, data: &mut Value) -> Vec<SchemaViolation>;
}
