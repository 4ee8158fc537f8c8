//! Default schema engine backed by the `jsonschema` crate
//!
//! Draft is auto-detected per schema. Sanitization reproduces the
//! validation mode the runner was designed around: fill declared
//! defaults, drop properties the schema forbids, report all errors.

use serde::Deserialize;
use serde_json::Value;

use super::{CompileError, CompiledSchema, SchemaEngine, SchemaViolation};

/// Sanitization behavior of the default engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineOptions {
    /// Fill in `default` values declared for missing properties
    #[serde(default = "default_use_defaults")]
    pub use_defaults: bool,
    /// Strip object properties where the schema says `additionalProperties: false`
    #[serde(default = "default_remove_additional")]
    pub remove_additional: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            use_defaults: default_use_defaults(),
            remove_additional: default_remove_additional(),
        }
    }
}

fn default_use_defaults() -> bool {
    true
}
fn default_remove_additional() -> bool {
    true
}

/// Schema engine backed by `jsonschema`
#[derive(Debug, Clone, Default)]
pub struct DraftEngine {
    options: EngineOptions,
}

impl DraftEngine {
    /// Engine with explicit sanitization options
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }
}

impl SchemaEngine for DraftEngine {
    fn compile(&self, schema: &Value) -> Result<Box<dyn CompiledSchema>, CompileError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|err| CompileError(err.to_string()))?;
        Ok(Box::new(DraftValidator {
            schema: schema.clone(),
            validator,
            options: self.options,
        }))
    }
}

struct DraftValidator {
    schema: Value,
    validator: jsonschema::Validator,
    options: EngineOptions,
}

impl CompiledSchema for DraftValidator {
    fn apply(&self, data: &mut Value) -> Vec<SchemaViolation> {
        sanitize(&self.schema, data, self.options);
        self.validator
            .iter_errors(data)
            .map(|err| SchemaViolation {
                instance_path: err.instance_path().to_string(),
                schema_path: err.schema_path().to_string(),
                message: err.to_string(),
            })
            .collect()
    }
}

/// Fill declared defaults and strip forbidden properties, recursing
/// through object properties and array items.
fn sanitize(schema: &Value, data: &mut Value, options: EngineOptions) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    match data {
        Value::Object(map) => {
            let properties = schema.get("properties").and_then(Value::as_object);

            if options.remove_additional
                && schema.get("additionalProperties") == Some(&Value::Bool(false))
            {
                map.retain(|key, _| properties.is_some_and(|props| props.contains_key(key)));
            }

            let Some(properties) = properties else {
                return;
            };

            if options.use_defaults {
                for (key, prop_schema) in properties {
                    if !map.contains_key(key) {
                        if let Some(default) = prop_schema.get("default") {
                            map.insert(key.clone(), default.clone());
                        }
                    }
                }
            }

            for (key, value) in map.iter_mut() {
                if let Some(prop_schema) = properties.get(key) {
                    sanitize(prop_schema, value, options);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for item in items {
                    sanitize(item_schema, item, options);
                }
            }
        }
        _ => {}
    }
}
