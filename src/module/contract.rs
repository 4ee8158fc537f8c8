//! Structural contract enforcement for module definitions
//!
//! An untrusted [`ModuleSpec`] is either rejected with the exact broken
//! rule or converted into the typed [`Module`] form. The runner only
//! ever sees the typed form, so invariants like "an expect handler
//! always has its schema" hold structurally after this point.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::handlers::{ExpectHandler, LabelFn, RunHandler, ValueCheck};
use super::types::{CommandSpec, ModuleSpec};
use crate::common::ContractViolation;

/// Metadata keys reserved for the runner's own bookkeeping
pub const RESERVED_METADATA_KEYS: [&str; 2] = ["_args_validator", "_expect_validator"];

/// A module definition that passed the structural contract
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    description: String,
    defaults_schema: Value,
    commands: BTreeMap<String, Command>,
}

impl Module {
    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module description
    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn defaults_schema(&self) -> &Value {
        &self.defaults_schema
    }

    pub(crate) fn commands(&self) -> &BTreeMap<String, Command> {
        &self.commands
    }

    pub(crate) fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }
}

/// A command definition that passed the structural contract
#[derive(Clone)]
pub struct Command {
    description: String,
    args_schema: Value,
    run: Arc<dyn RunHandler>,
    expect: Option<ExpectPhase>,
    get_label: Option<LabelFn>,
    validate_args: Option<ValueCheck>,
    validate_expect: Option<ValueCheck>,
    metadata: BTreeMap<String, Value>,
}

impl Command {
    /// Command description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Host-visible extension data
    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub(crate) fn args_schema(&self) -> &Value {
        &self.args_schema
    }

    pub(crate) fn run(&self) -> &dyn RunHandler {
        self.run.as_ref()
    }

    pub(crate) fn expect(&self) -> Option<&ExpectPhase> {
        self.expect.as_ref()
    }

    pub(crate) fn get_label(&self) -> Option<&LabelFn> {
        self.get_label.as_ref()
    }

    pub(crate) fn validate_args(&self) -> Option<&ValueCheck> {
        self.validate_args.as_ref()
    }

    pub(crate) fn validate_expect(&self) -> Option<&ValueCheck> {
        self.validate_expect.as_ref()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("description", &self.description)
            .field("args_schema", &self.args_schema)
            .field("expect", &self.expect.is_some())
            .field("get_label", &self.get_label.is_some())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Expect phase of a command; exists only together with its schema
#[derive(Clone)]
pub(crate) struct ExpectPhase {
    schema: Value,
    handler: Arc<dyn ExpectHandler>,
}

impl ExpectPhase {
    pub(crate) fn schema(&self) -> &Value {
        &self.schema
    }

    pub(crate) fn handler(&self) -> &dyn ExpectHandler {
        self.handler.as_ref()
    }
}

/// Validate a module definition and convert it into the typed form
///
/// Stops at the first broken rule; the error names the rule and, for
/// command-level rules, the offending command.
pub fn validate_module(spec: ModuleSpec) -> Result<Module, ContractViolation> {
    if spec.name.is_empty() {
        return Err(ContractViolation::MissingName);
    }
    if spec.description.trim().is_empty() {
        return Err(ContractViolation::MissingDescription);
    }
    let defaults_schema = spec
        .defaults_schema
        .ok_or(ContractViolation::MissingDefaultsSchema)?;

    let mut commands = BTreeMap::new();
    for (name, command) in spec.commands {
        let validated = validate_command(&name, command)?;
        commands.insert(name, validated);
    }

    Ok(Module {
        name: spec.name,
        description: spec.description,
        defaults_schema,
        commands,
    })
}

fn validate_command(name: &str, spec: CommandSpec) -> Result<Command, ContractViolation> {
    if spec.description.trim().is_empty() {
        return Err(ContractViolation::CommandMissingDescription {
            command: name.to_string(),
        });
    }
    let run = spec.run.ok_or_else(|| ContractViolation::CommandMissingRun {
        command: name.to_string(),
    })?;
    let args_schema = spec
        .args_schema
        .ok_or_else(|| ContractViolation::CommandMissingArgsSchema {
            command: name.to_string(),
        })?;

    let expect = match spec.expect {
        Some(handler) => {
            let schema =
                spec.expect_schema
                    .ok_or_else(|| ContractViolation::CommandMissingExpectSchema {
                        command: name.to_string(),
                    })?;
            Some(ExpectPhase { schema, handler })
        }
        None => None,
    };

    for key in RESERVED_METADATA_KEYS {
        if spec.metadata.contains_key(key) {
            return Err(ContractViolation::CommandReservedKey {
                command: name.to_string(),
                key,
            });
        }
    }

    Ok(Command {
        description: spec.description,
        args_schema,
        run,
        expect,
        get_label: spec.get_label,
        validate_args: spec.validate_args,
        validate_expect: spec.validate_expect,
        metadata: spec.metadata,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::module::handlers::{expect_fn, run_fn};

    fn noop_run() -> Arc<dyn RunHandler> {
        run_fn(|args, ready, _env| async move {
            ready.notify();
            Ok(args)
        })
    }

    fn sample_spec() -> ModuleSpec {
        let mut commands = BTreeMap::new();
        commands.insert(
            "test".to_string(),
            CommandSpec::new("Does something", json!({"type": "object"}), noop_run())
                .with_expect(json!({"type": "object"}), expect_fn(|_, _, _| Vec::new())),
        );
        ModuleSpec {
            name: "sample".to_string(),
            description: "A sample module".to_string(),
            defaults_schema: Some(json!({"type": "object"})),
            commands,
        }
    }

    #[test]
    fn valid_module_passes() {
        let module = validate_module(sample_spec()).expect("valid module");
        assert_eq!(module.name(), "sample");
        assert_eq!(module.description(), "A sample module");
        assert!(module.command("test").is_some());
        assert!(module.command("test").and_then(Command::expect).is_some());
    }

    #[test]
    fn empty_name_is_rejected() {
        let spec = ModuleSpec {
            name: String::new(),
            ..sample_spec()
        };
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::MissingName
        );
    }

    #[test]
    fn blank_description_is_rejected() {
        let spec = ModuleSpec {
            description: "   ".to_string(),
            ..sample_spec()
        };
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::MissingDescription
        );
    }

    #[test]
    fn missing_defaults_schema_is_rejected() {
        let spec = ModuleSpec {
            defaults_schema: None,
            ..sample_spec()
        };
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::MissingDefaultsSchema
        );
    }

    #[test]
    fn command_without_description_is_rejected() {
        let mut spec = sample_spec();
        spec.commands.get_mut("test").unwrap().description = String::new();
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::CommandMissingDescription {
                command: "test".to_string()
            }
        );
    }

    #[test]
    fn command_without_run_is_rejected() {
        let mut spec = sample_spec();
        spec.commands.get_mut("test").unwrap().run = None;
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::CommandMissingRun {
                command: "test".to_string()
            }
        );
    }

    #[test]
    fn command_without_args_schema_is_rejected() {
        let mut spec = sample_spec();
        spec.commands.get_mut("test").unwrap().args_schema = None;
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::CommandMissingArgsSchema {
                command: "test".to_string()
            }
        );
    }

    #[test]
    fn expect_without_expect_schema_is_rejected() {
        let mut spec = sample_spec();
        spec.commands.get_mut("test").unwrap().expect_schema = None;
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::CommandMissingExpectSchema {
                command: "test".to_string()
            }
        );
    }

    #[test]
    fn reserved_metadata_key_is_rejected() {
        let mut spec = sample_spec();
        spec.commands
            .get_mut("test")
            .unwrap()
            .metadata
            .insert("_args_validator".to_string(), json!(true));
        assert_eq!(
            validate_module(spec).unwrap_err(),
            ContractViolation::CommandReservedKey {
                command: "test".to_string(),
                key: "_args_validator",
            }
        );
    }

    #[test]
    fn plain_metadata_keys_are_kept() {
        let mut spec = sample_spec();
        spec.commands
            .get_mut("test")
            .unwrap()
            .metadata
            .insert("category".to_string(), json!("http"));
        let module = validate_module(spec).expect("valid module");
        let command = module.command("test").unwrap();
        assert_eq!(command.metadata().get("category"), Some(&json!("http")));
    }
}
