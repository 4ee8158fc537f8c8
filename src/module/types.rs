//! Module definition types and shared value types
//!
//! Mirrors what a module author supplies. The definition types are
//! loosely typed on purpose: the structural contract must be able to
//! observe a missing schema or handler and name the broken rule, so
//! those fields stay `Option` until validation converts the definition
//! into the typed form the runner operates on.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::handlers::{ExpectHandler, LabelFn, RunHandler, ValueCheck};
use crate::schema::SchemaViolation;

/// Identity of the source document a test case came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Document name
    pub name: String,
    /// File name without path
    pub filename: String,
    /// Absolute path to the file
    pub full_path: String,
}

/// Task run environment, passed through to handlers unmodified
///
/// Supplied by the host per test case; the runner never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEnv {
    /// Source document identity
    pub document: DocumentRef,
    /// Path of the task within the document
    pub task_path: String,
    /// Whether debug mode is enabled for this run
    pub debug: bool,
}

/// One expectation violation, as opposed to a fatal dispatch error
#[derive(Debug, Clone, Serialize)]
pub struct AssertionError {
    /// What went wrong
    pub message: AssertionMessage,
    /// Expected value, when the producer can name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Actual value, when the producer can name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl AssertionError {
    /// Assertion error with a plain text message
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: AssertionMessage::Text(message.into()),
            expected: None,
            actual: None,
        }
    }

    /// Assertion error wrapping the record list of a failed schema validation
    pub fn schema(violations: Vec<SchemaViolation>) -> Self {
        Self {
            message: AssertionMessage::Schema(violations),
            expected: None,
            actual: None,
        }
    }

    /// Attach expected/actual detail
    pub fn with_detail(mut self, expected: Value, actual: Value) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }
}

/// Message payload of an assertion error
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AssertionMessage {
    /// Free-form text from an expect handler or supplementary validator
    Text(String),
    /// Structured records from a failed schema validation
    Schema(Vec<SchemaViolation>),
}

/// A pluggable test module definition, as supplied by its author
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    /// Module name
    pub name: String,
    /// Human-readable module description
    pub description: String,
    /// JSON schema for the module's task defaults
    pub defaults_schema: Option<Value>,
    /// Commands provided by the module, keyed by command name
    pub commands: BTreeMap<String, CommandSpec>,
}

/// One command a module exposes
#[derive(Clone, Default)]
pub struct CommandSpec {
    /// Command description
    pub description: String,
    /// JSON schema for run arguments
    pub args_schema: Option<Value>,
    /// JSON schema for expect arguments; mandatory when `expect` is set
    pub expect_schema: Option<Value>,
    /// Run handler: performs or observes the test step
    pub run: Option<Arc<dyn RunHandler>>,
    /// Expect handler: asserts on the run result
    pub expect: Option<Arc<dyn ExpectHandler>>,
    /// Produces a user-friendly task label from arguments
    pub get_label: Option<LabelFn>,
    /// Supplementary run-argument validation beyond the schema
    pub validate_args: Option<ValueCheck>,
    /// Supplementary expect-argument validation beyond the schema
    pub validate_expect: Option<ValueCheck>,
    /// Free-form extension data for the host; a small set of keys is
    /// reserved for the runner's bookkeeping
    pub metadata: BTreeMap<String, Value>,
}

impl CommandSpec {
    /// Command definition with the mandatory pieces
    pub fn new(
        description: impl Into<String>,
        args_schema: Value,
        run: Arc<dyn RunHandler>,
    ) -> Self {
        Self {
            description: description.into(),
            args_schema: Some(args_schema),
            run: Some(run),
            ..Self::default()
        }
    }

    /// Add an expect phase (handler plus its mandatory schema)
    pub fn with_expect(mut self, expect_schema: Value, expect: Arc<dyn ExpectHandler>) -> Self {
        self.expect_schema = Some(expect_schema);
        self.expect = Some(expect);
        self
    }

    /// Add a label producer
    pub fn with_label(mut self, get_label: LabelFn) -> Self {
        self.get_label = Some(get_label);
        self
    }

    /// Add supplementary run-argument validation
    pub fn with_validate_args(mut self, check: ValueCheck) -> Self {
        self.validate_args = Some(check);
        self
    }

    /// Add supplementary expect-argument validation
    pub fn with_validate_expect(mut self, check: ValueCheck) -> Self {
        self.validate_expect = Some(check);
        self
    }

    /// Attach one host-visible metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("description", &self.description)
            .field("args_schema", &self.args_schema)
            .field("expect_schema", &self.expect_schema)
            .field("run", &self.run.is_some())
            .field("expect", &self.expect.is_some())
            .field("get_label", &self.get_label.is_some())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
