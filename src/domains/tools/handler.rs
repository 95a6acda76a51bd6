//! Tool callables.
//!
//! Anything implementing [`ToolHandler`] can be registered as a tool. Plain
//! functions and async closures are adapted with [`SyncHandler`] and
//! [`AsyncHandler`]; the dispatcher treats all of them the same way, as
//! something that eventually produces a value.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::context::InvocationContext;

/// Validated, defaulted arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    pub fn new(arguments: Map<String, Value>) -> Self {
        Self(arguments)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Deserialize the arguments into a typed parameter struct.
    pub fn parse<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .context("arguments do not match the tool's parameter type")
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(arguments: Map<String, Value>) -> Self {
        Self(arguments)
    }
}

/// Trait implemented by every registered tool.
///
/// Returning an error reports "the tool ran and failed" to the client; it
/// never takes the server down.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    /// Execute the tool with validated arguments.
    async fn call(&self, arguments: ToolArguments, ctx: InvocationContext) -> anyhow::Result<Value>;
}

// ============================================================================
// Adapters
// ============================================================================

/// Adapts a plain function. It runs on the blocking pool so a slow body
/// does not stall other sessions.
pub struct SyncHandler<F, T> {
    func: Arc<F>,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> SyncHandler<F, T>
where
    F: Fn(ToolArguments) -> anyhow::Result<T> + Send + Sync + 'static,
    T: Serialize + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
            _output: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<F, T> ToolHandler for SyncHandler<F, T>
where
    F: Fn(ToolArguments) -> anyhow::Result<T> + Send + Sync + 'static,
    T: Serialize + Send + 'static,
{
    async fn call(
        &self,
        arguments: ToolArguments,
        _ctx: InvocationContext,
    ) -> anyhow::Result<Value> {
        let func = self.func.clone();
        let output = tokio::task::spawn_blocking(move || func(arguments))
            .await
            .map_err(|e| anyhow!("tool task did not complete: {}", e))??;
        Ok(serde_json::to_value(output)?)
    }
}

/// Adapts an async closure that receives the invocation context.
pub struct AsyncHandler<F, T> {
    func: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, Fut, T> AsyncHandler<F, T>
where
    F: Fn(ToolArguments, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _output: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<F, Fut, T> ToolHandler for AsyncHandler<F, T>
where
    F: Fn(ToolArguments, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    async fn call(
        &self,
        arguments: ToolArguments,
        ctx: InvocationContext,
    ) -> anyhow::Result<Value> {
        let output = (self.func)(arguments, ctx).await?;
        Ok(serde_json::to_value(output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::RequestId;
    use serde::Deserialize;
    use serde_json::json;

    fn args(value: Value) -> ToolArguments {
        match value {
            Value::Object(map) => ToolArguments::new(map),
            _ => ToolArguments::default(),
        }
    }

    #[derive(Deserialize)]
    struct Pair {
        a: f64,
        b: f64,
    }

    #[tokio::test]
    async fn test_sync_handler() {
        let handler = SyncHandler::new(|args: ToolArguments| {
            let pair: Pair = args.parse()?;
            Ok(pair.a * pair.b)
        });
        let ctx = InvocationContext::detached(RequestId::new("1"));
        let value = handler.call(args(json!({ "a": 3, "b": 4 })), ctx).await.unwrap();
        assert_eq!(value, json!(12.0));
    }

    #[tokio::test]
    async fn test_sync_handler_panic_is_an_error() {
        let handler = SyncHandler::new(|_args: ToolArguments| -> anyhow::Result<i64> {
            panic!("boom")
        });
        let ctx = InvocationContext::detached(RequestId::new("1"));
        assert!(handler.call(ToolArguments::default(), ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_async_handler_sees_request_id() {
        let handler = AsyncHandler::new(|_args: ToolArguments, ctx: InvocationContext| async move {
            Ok::<_, anyhow::Error>(ctx.request_id().to_string())
        });
        let ctx = InvocationContext::detached(RequestId::new("abc"));
        let value = handler.call(ToolArguments::default(), ctx).await.unwrap();
        assert_eq!(value, json!("abc"));
    }

    #[test]
    fn test_parse_mismatch_is_an_error() {
        let result: anyhow::Result<Pair> = args(json!({ "a": "x" })).parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_accessors() {
        let args = args(json!({ "city": "London", "n": 2.5 }));
        assert_eq!(args.get_str("city"), Some("London"));
        assert_eq!(args.get_f64("n"), Some(2.5));
        assert!(args.get("missing").is_none());
    }
}
