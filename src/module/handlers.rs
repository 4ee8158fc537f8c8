//! Handler capability interfaces for module commands
//!
//! Handlers are trait objects with explicit result and error channels.
//! Closure adapters keep module definitions about as terse as writing
//! the handlers inline.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::types::{AssertionError, RunEnv};
use crate::common::HandlerError;
use crate::runner::ReadySignal;

/// Value produced by a run handler, or its opaque failure
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Performs or observes one test step
///
/// The handler must fire the [`ReadySignal`] once its operation has
/// started or attached; the runner resolves a `run` call only after
/// both the signal has fired and the returned future has settled. A
/// handler that never signals leaves the call pending.
#[async_trait]
pub trait RunHandler: Send + Sync {
    /// Execute the command with validated, defaulted arguments
    async fn run(&self, args: Value, ready: ReadySignal, env: RunEnv) -> HandlerResult;
}

/// Asserts on the outcome of a previously executed run phase
///
/// Performs no asynchronous suspension; assertion failures are values,
/// not errors.
pub trait ExpectHandler: Send + Sync {
    /// Return one assertion error per violated expectation; empty means pass
    fn expect(&self, args: &Value, result: &Value, env: &RunEnv) -> Vec<AssertionError>;
}

/// Produces a user-friendly task label from run and expect arguments
pub type LabelFn = Arc<dyn Fn(&Value, Option<&Value>) -> String + Send + Sync>;

/// Supplementary validator returning assertion errors for bad arguments
pub type ValueCheck = Arc<dyn Fn(&Value) -> Vec<AssertionError> + Send + Sync>;

struct FnRun<F>(F);

#[async_trait]
impl<F, Fut> RunHandler for FnRun<F>
where
    F: Fn(Value, ReadySignal, RunEnv) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn run(&self, args: Value, ready: ReadySignal, env: RunEnv) -> HandlerResult {
        (self.0)(args, ready, env).await
    }
}

struct FnExpect<F>(F);

impl<F> ExpectHandler for FnExpect<F>
where
    F: Fn(&Value, &Value, &RunEnv) -> Vec<AssertionError> + Send + Sync,
{
    fn expect(&self, args: &Value, result: &Value, env: &RunEnv) -> Vec<AssertionError> {
        (self.0)(args, result, env)
    }
}

/// Wrap an async closure as a run handler
pub fn run_fn<F, Fut>(f: F) -> Arc<dyn RunHandler>
where
    F: Fn(Value, ReadySignal, RunEnv) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnRun(f))
}

/// Wrap a closure as an expect handler
pub fn expect_fn<F>(f: F) -> Arc<dyn ExpectHandler>
where
    F: Fn(&Value, &Value, &RunEnv) -> Vec<AssertionError> + Send + Sync + 'static,
{
    Arc::new(FnExpect(f))
}

/// Wrap a closure as a label producer
pub fn label_fn<F>(f: F) -> LabelFn
where
    F: Fn(&Value, Option<&Value>) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a supplementary argument validator
pub fn check_fn<F>(f: F) -> ValueCheck
where
    F: Fn(&Value) -> Vec<AssertionError> + Send + Sync + 'static,
{
    Arc::new(f)
}
