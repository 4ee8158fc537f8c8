//! Command runner: schema-validated dispatch of module commands
//!
//! Built on a module that passed the structural contract. Construction
//! compiles every declared schema once; each `run`/`expect` call then
//! validates its arguments against the compiled set before the
//! user-supplied handler executes.

pub mod ready;

pub use ready::ReadySignal;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, trace};

use crate::common::{Error, Result};
use crate::module::contract::{validate_module, Module};
use crate::module::types::{AssertionError, ModuleSpec, RunEnv};
use crate::schema::{CompiledSchema, DraftEngine, SchemaEngine};

/// Drives the run/expect lifecycle of a validated test module
///
/// Immutable after construction: the compiled validator set and the
/// module itself are never mutated again, so a single instance can
/// serve any number of `run`/`expect` calls.
pub struct CommandRunner {
    module: Module,
    defaults_validator: Box<dyn CompiledSchema>,
    args_validators: HashMap<String, Box<dyn CompiledSchema>>,
    expect_validators: HashMap<String, Box<dyn CompiledSchema>>,
}

impl fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("module", &self.module)
            .field("args_validators", &self.args_validators.keys())
            .field("expect_validators", &self.expect_validators.keys())
            .finish_non_exhaustive()
    }
}

impl CommandRunner {
    /// Build a runner for a module definition using the default engine
    ///
    /// Validates the structural contract, then compiles the defaults
    /// schema, every command's args schema, and every declared expect
    /// schema. Fails fast on the first broken rule or malformed schema;
    /// no partially constructed runner is observable.
    pub fn new(spec: ModuleSpec) -> Result<Self> {
        Self::with_engine(spec, &DraftEngine::default())
    }

    /// Build a runner with a specific schema engine
    pub fn with_engine(spec: ModuleSpec, engine: &dyn SchemaEngine) -> Result<Self> {
        let module = validate_module(spec)?;

        let defaults_validator = compile_schema(engine, &module, module.defaults_schema())?;

        let mut args_validators = HashMap::new();
        let mut expect_validators = HashMap::new();
        for (name, command) in module.commands() {
            args_validators.insert(
                name.clone(),
                compile_schema(engine, &module, command.args_schema())?,
            );
            if let Some(expect) = command.expect() {
                expect_validators.insert(
                    name.clone(),
                    compile_schema(engine, &module, expect.schema())?,
                );
            }
        }

        debug!(
            module = module.name(),
            commands = module.commands().len(),
            "module validators compiled"
        );

        Ok(Self {
            module,
            defaults_validator,
            args_validators,
            expect_validators,
        })
    }

    /// Module name
    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    /// Module description
    pub fn module_description(&self) -> &str {
        self.module.description()
    }

    /// Names of the commands the module exposes
    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.module.commands().keys().map(String::as_str)
    }

    /// Execute a command's run handler
    ///
    /// Arguments are sanitized and validated first; every schema
    /// violation plus everything the command's supplementary validator
    /// reports is collected into one [`Error::InvalidArguments`] before
    /// the handler would execute. On success the call resolves only
    /// after the handler has fired its [`ReadySignal`] and its future
    /// has settled, in either order. A handler that never signals
    /// leaves the call pending; hosts that cannot trust a module must
    /// wrap this call in their own timeout.
    pub async fn run(&self, command: &str, run_args: Value, env: &RunEnv) -> Result<Value> {
        let cmd = self
            .module
            .command(command)
            .ok_or_else(|| Error::unknown_command(command))?;

        let mut args = run_args;
        let mut errors = Vec::new();
        // Contract guarantees an args schema per command, so the map
        // always has an entry here.
        if let Some(validator) = self.args_validators.get(command) {
            let violations = validator.apply(&mut args);
            if !violations.is_empty() {
                errors.push(AssertionError::schema(violations));
            }
        }
        if let Some(check) = cmd.validate_args() {
            errors.extend(check(&args));
        }
        if !errors.is_empty() {
            trace!(command, errors = errors.len(), "run arguments rejected");
            return Err(Error::InvalidArguments { errors });
        }

        debug!(command, task = %env.task_path, "running command");

        let (ready, ready_rx) = ReadySignal::new();
        let run_fut = cmd.run().run(args, ready, env.clone());
        let ready_fut = async {
            if ready_rx.await.is_err() {
                // Signal dropped without firing: the readiness half of
                // the contract can no longer be met, so stay pending.
                std::future::pending::<()>().await;
            }
        };

        let (result, ()) = tokio::join!(run_fut, ready_fut);
        result.map_err(Error::Handler)
    }

    /// Execute a command's expect handler and return its assertion errors
    ///
    /// An empty list means the assertion passed. Argument validation
    /// follows the same collect-everything policy as [`run`](Self::run)
    /// and fails before the handler is invoked. Never suspends.
    pub fn expect(
        &self,
        command: &str,
        expect_args: Value,
        result: &Value,
        env: &RunEnv,
    ) -> Result<Vec<AssertionError>> {
        let cmd = self
            .module
            .command(command)
            .ok_or_else(|| Error::unknown_command(command))?;
        let expect = cmd
            .expect()
            .ok_or_else(|| Error::MissingExpectHandler {
                command: command.to_string(),
            })?;

        let mut args = expect_args;
        let mut errors = Vec::new();
        if let Some(validator) = self.expect_validators.get(command) {
            let violations = validator.apply(&mut args);
            if !violations.is_empty() {
                errors.push(AssertionError::schema(violations));
            }
        }
        if let Some(check) = cmd.validate_expect() {
            errors.extend(check(&args));
        }
        if !errors.is_empty() {
            trace!(command, errors = errors.len(), "expect arguments rejected");
            return Err(Error::InvalidArguments { errors });
        }

        debug!(command, task = %env.task_path, "checking expectation");
        Ok(expect.handler().expect(&args, result, env))
    }

    /// Sanitize and validate host-supplied task defaults against the
    /// module's defaults schema
    pub fn apply_defaults(&self, defaults: &mut Value) -> Result<()> {
        let violations = self.defaults_validator.apply(defaults);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidArguments {
                errors: vec![AssertionError::schema(violations)],
            })
        }
    }

    /// User-friendly label for a task, when the command declares one
    pub fn label(
        &self,
        command: &str,
        run_args: &Value,
        expect_args: Option<&Value>,
    ) -> Result<Option<String>> {
        let cmd = self
            .module
            .command(command)
            .ok_or_else(|| Error::unknown_command(command))?;
        Ok(cmd.get_label().map(|label| label(run_args, expect_args)))
    }
}

fn compile_schema(
    engine: &dyn SchemaEngine,
    module: &Module,
    schema: &Value,
) -> Result<Box<dyn CompiledSchema>> {
    engine.compile(schema).map_err(|err| Error::SchemaCompile {
        module: module.name().to_string(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use crate::module::handlers::{check_fn, run_fn};
    use crate::module::types::{CommandSpec, DocumentRef, ModuleSpec};
    use crate::schema::{CompileError, CompiledSchema, SchemaEngine, SchemaViolation};

    /// Deterministic engine: validators flag any instance carrying a
    /// `bad` key, and schemas marked `broken` refuse to compile.
    struct ScriptedEngine;

    impl SchemaEngine for ScriptedEngine {
        fn compile(
            &self,
            schema: &Value,
        ) -> std::result::Result<Box<dyn CompiledSchema>, CompileError> {
            if schema.get("broken").is_some() {
                return Err(CompileError("scripted compile failure".to_string()));
            }
            Ok(Box::new(ScriptedValidator))
        }
    }

    struct ScriptedValidator;

    impl CompiledSchema for ScriptedValidator {
        fn apply(&self, data: &mut Value) -> Vec<SchemaViolation> {
            if data.get("bad").is_some() {
                vec![
                    SchemaViolation {
                        instance_path: "/bad".to_string(),
                        schema_path: "/properties/bad/type".to_string(),
                        message: "scripted type violation".to_string(),
                    },
                    SchemaViolation {
                        instance_path: "".to_string(),
                        schema_path: "/required".to_string(),
                        message: "scripted required violation".to_string(),
                    },
                ]
            } else {
                Vec::new()
            }
        }
    }

    fn env() -> RunEnv {
        RunEnv {
            document: DocumentRef {
                name: "doc".to_string(),
                filename: "doc.yaml".to_string(),
                full_path: "/tmp/doc.yaml".to_string(),
            },
            task_path: "suite/case".to_string(),
            debug: false,
        }
    }

    fn spec_with_command(command: CommandSpec) -> ModuleSpec {
        let mut commands = BTreeMap::new();
        commands.insert("probe".to_string(), command);
        ModuleSpec {
            name: "scripted".to_string(),
            description: "Scripted module".to_string(),
            defaults_schema: Some(json!({})),
            commands,
        }
    }

    #[test]
    fn schema_compile_failure_names_the_module() {
        let spec = ModuleSpec {
            defaults_schema: Some(json!({"broken": true})),
            ..spec_with_command(CommandSpec::new(
                "Probe",
                json!({}),
                run_fn(|args, ready, _env| async move {
                    ready.notify();
                    Ok(args)
                }),
            ))
        };

        let err = CommandRunner::with_engine(spec, &ScriptedEngine).unwrap_err();
        match err {
            Error::SchemaCompile { module, detail } => {
                assert_eq!(module, "scripted");
                assert!(detail.contains("scripted compile failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_arguments_collect_schema_and_supplementary_errors() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_flag = ran.clone();

        let command = CommandSpec::new(
            "Probe",
            json!({}),
            run_fn(move |args, ready, _env| {
                let ran_flag = ran_flag.clone();
                async move {
                    ran_flag.store(true, Ordering::SeqCst);
                    ready.notify();
                    Ok(args)
                }
            }),
        )
        .with_validate_args(check_fn(|_args| {
            vec![crate::module::types::AssertionError::text(
                "supplementary rejection",
            )]
        }));

        let runner =
            CommandRunner::with_engine(spec_with_command(command), &ScriptedEngine).expect("runner");

        let err = runner
            .run("probe", json!({"bad": 1}), &env())
            .await
            .unwrap_err();
        let errors = err.argument_errors().expect("argument errors");
        // One schema entry carrying both violations, plus the
        // supplementary entry.
        assert_eq!(errors.len(), 2);
        assert!(!ran.load(Ordering::SeqCst), "handler must not run");
    }

    #[tokio::test]
    async fn valid_arguments_reach_the_handler() {
        let command = CommandSpec::new(
            "Probe",
            json!({}),
            run_fn(|args, ready, env| async move {
                ready.notify();
                Ok(json!({"args": args, "task": env.task_path}))
            }),
        );

        let runner =
            CommandRunner::with_engine(spec_with_command(command), &ScriptedEngine).expect("runner");

        let result = runner
            .run("probe", json!({"ok": true}), &env())
            .await
            .expect("run");
        assert_eq!(
            result,
            json!({"args": {"ok": true}, "task": "suite/case"})
        );
    }

    #[tokio::test]
    async fn handler_failure_is_passed_through() {
        let command = CommandSpec::new(
            "Probe",
            json!({}),
            run_fn(|_args, ready, _env| async move {
                ready.notify();
                Err("connection refused".into())
            }),
        );

        let runner =
            CommandRunner::with_engine(spec_with_command(command), &ScriptedEngine).expect("runner");

        let err = runner.run("probe", json!({}), &env()).await.unwrap_err();
        match err {
            Error::Handler(inner) => assert_eq!(inner.to_string(), "connection refused"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
