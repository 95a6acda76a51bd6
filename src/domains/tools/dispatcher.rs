//! Tool dispatcher.
//!
//! Turns an [`InvocationRequest`] into exactly one terminal result event:
//!
//! 1. resolve the tool (miss → `NotFound` result)
//! 2. validate arguments (failure → `Validation` result, tool never runs)
//! 3. bind an [`InvocationContext`] to the session
//! 4. run the tool on its own task, optionally under a deadline
//! 5. shape the return value with the declared output type
//! 6. tool failures become `ExecutionFailed` results
//! 7. publish the result on the session, then close the context
//!
//! Only a broken internal invariant escapes as an error ([`Error::Fatal`]);
//! everything caused by the client or the tool is data in the result.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::context::InvocationContext;
use super::error::ToolError;
use super::events::{Event, EventKind, InvocationResult, RequestId};
use super::handler::ToolArguments;
use super::registry::ToolRegistry;
use crate::core::error::{Error, Result};
use crate::core::transport::{Delivery, Session};

/// One decoded tool invocation.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub tool_name: String,
    /// Raw, untyped arguments as sent by the client.
    pub arguments: Option<Value>,
    pub request_id: RequestId,
}

impl InvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value, request_id: RequestId) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: Some(arguments),
            request_id,
        }
    }
}

/// Resolves, validates and invokes tools.
#[derive(Clone)]
pub struct Dispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: None,
        }
    }

    /// Set a per-invocation deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Dispatch one invocation and publish its result on `session`.
    ///
    /// The result event is returned as well, so callers that do not drain
    /// the session (or whose consumer went away) still see the outcome.
    #[instrument(skip_all, fields(tool = %request.tool_name, request_id = %request.request_id))]
    pub async fn dispatch(
        &self,
        request: InvocationRequest,
        session: &Arc<Session>,
    ) -> Result<Event> {
        let InvocationRequest {
            tool_name,
            arguments,
            request_id,
        } = request;

        let ctx = InvocationContext::new(request_id.clone(), session);
        let outcome = match self.invoke(&tool_name, arguments.as_ref(), &ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                ctx.close();
                return Err(e);
            }
        };

        match &outcome {
            Ok(_) => info!("Tool {} completed", tool_name),
            Err(e) if e.is_request_error() => {
                info!("Tool {} rejected ({}): {}", tool_name, e.kind(), e)
            }
            Err(e) => warn!("Tool {} failed ({}): {}", tool_name, e.kind(), e),
        }

        let delivery = session.publish(&request_id, EventKind::Result(outcome.clone()));
        ctx.close();

        let seq = match delivery? {
            Delivery::Queued(seq) | Delivery::QueuedDroppedOldest(seq) => seq,
            Delivery::Rejected => {
                debug!(
                    "Result for {} not delivered: session closed or client gone",
                    request_id
                );
                ctx.emitted_events() + 1
            }
        };

        Ok(Event {
            request_id,
            seq,
            kind: EventKind::Result(outcome),
        })
    }

    async fn invoke(
        &self,
        tool_name: &str,
        arguments: Option<&Value>,
        ctx: &InvocationContext,
    ) -> Result<InvocationResult> {
        let entry = match self.tools.resolve(tool_name) {
            Ok(entry) => entry,
            Err(e) => return Ok(Err(e)),
        };
        if entry.name() != tool_name {
            return Err(Error::fatal(format!(
                "registry resolved '{}' to entry '{}'",
                tool_name,
                entry.name()
            )));
        }

        let arguments = match entry.schema().validate(arguments) {
            Ok(arguments) => ToolArguments::new(arguments),
            Err(e) => {
                warn!("Rejected arguments for {}: {}", tool_name, e);
                return Ok(Err(e.into()));
            }
        };

        let handler = entry.handler();
        let task_ctx = ctx.clone();
        let task = tokio::spawn(async move { handler.call(arguments, task_ctx).await });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // The task keeps running in the background; its output
                    // and any further events are discarded.
                    ctx.close();
                    warn!("Tool {} exceeded its {:?} deadline", tool_name, limit);
                    return Ok(Err(ToolError::Timeout(limit)));
                }
            },
            None => task.await,
        };

        let value = match joined {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Ok(Err(ToolError::execution_failed(format!("{:#}", e)))),
            Err(e) if e.is_panic() => {
                return Ok(Err(ToolError::execution_failed("tool panicked")));
            }
            Err(_) => return Ok(Err(ToolError::execution_failed("tool task was cancelled"))),
        };

        Ok(entry.output().package(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{DeliveryMode, EventQueue};
    use crate::domains::schema::ParamType;
    use crate::domains::tools::{OutputKind, ToolEntry};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    fn dispatcher_with(entries: Vec<ToolEntry>) -> Dispatcher {
        let mut registry = ToolRegistry::with_builtin_tools().unwrap();
        for entry in entries {
            registry.register(entry).unwrap();
        }
        Dispatcher::new(Arc::new(registry))
    }

    fn request(tool: &str, arguments: Value, id: &str) -> InvocationRequest {
        InvocationRequest::new(tool, arguments, RequestId::new(id))
    }

    async fn drain(queue: &EventQueue) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = queue.recv().await {
            let done = event.is_result();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    async fn run(
        dispatcher: &Dispatcher,
        tool: &str,
        arguments: Value,
    ) -> (InvocationResult, Vec<Event>) {
        let session = Session::new(DeliveryMode::Streaming, 16);
        let req = request(tool, arguments, "1");
        let queue = session.open_invocation(req.request_id.clone()).unwrap();
        let event = dispatcher.dispatch(req, &session).await.unwrap();
        let events = drain(&queue).await;
        match event.kind {
            EventKind::Result(outcome) => (outcome, events),
            _ => panic!("dispatch must return the result event"),
        }
    }

    #[tokio::test]
    async fn test_sum_numbers() {
        let dispatcher = dispatcher_with(vec![]);
        for (a, b, expected) in [(2.0, 3.0, 5.0), (-1.0, 1.0, 0.0), (2.5, 3.7, 6.2)] {
            let (outcome, _) = run(&dispatcher, "sum_numbers", json!({ "a": a, "b": b })).await;
            let output = outcome.unwrap();
            let result = output.structured.unwrap()["result"].as_f64().unwrap();
            assert!((result - expected).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_sum_overflow_is_an_execution_failure() {
        let dispatcher = dispatcher_with(vec![]);
        let (outcome, _) = run(
            &dispatcher,
            "sum_numbers",
            json!({ "a": f64::MAX, "b": f64::MAX }),
        )
        .await;
        match outcome {
            Err(ToolError::ExecutionFailed(msg)) => assert!(msg.contains("out of range")),
            other => panic!("expected execution failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_city_yields_default_payload() {
        let dispatcher = dispatcher_with(vec![]);
        let (outcome, _) = run(&dispatcher, "get_weather", json!({ "city": "Atlantis" })).await;
        let structured = outcome.unwrap().structured.unwrap();
        assert_eq!(structured["condition"], "unknown");
        assert_eq!(structured["humidity"], 50);
        assert_eq!(structured["city"], "Atlantis");
    }

    #[tokio::test]
    async fn test_weather_default_city() {
        let dispatcher = dispatcher_with(vec![]);
        let (outcome, _) = run(&dispatcher, "get_weather", json!({})).await;
        assert_eq!(outcome.unwrap().structured.unwrap()["city"], "San Francisco");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_result_not_a_fault() {
        let dispatcher = dispatcher_with(vec![]);
        let (outcome, events) = run(&dispatcher, "nope", json!({})).await;
        assert!(matches!(outcome, Err(ToolError::NotFound(_))));
        assert_eq!(events.len(), 1);
        assert!(events[0].is_result());
    }

    #[tokio::test]
    async fn test_validation_failure_never_invokes_tool() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();
        let entry = ToolEntry::builder("guarded")
            .required("x", ParamType::Integer, "x")
            .required("y", ParamType::Integer, "y")
            .sync(move |_args: ToolArguments| {
                flag.store(true, Ordering::SeqCst);
                Ok(0)
            });
        let dispatcher = dispatcher_with(vec![entry]);

        let (outcome, _) = run(&dispatcher, "guarded", json!({ "x": "nope" })).await;
        match outcome {
            Err(ToolError::Validation(e)) => {
                assert!(e.mentions("x"));
                assert!(e.mentions("y"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tool_failure_is_captured() {
        let entry = ToolEntry::builder("broken")
            .sync(|_args: ToolArguments| -> anyhow::Result<i64> { anyhow::bail!("disk on fire") });
        let dispatcher = dispatcher_with(vec![entry]);

        let (outcome, _) = run(&dispatcher, "broken", json!({})).await;
        match outcome {
            Err(ToolError::ExecutionFailed(msg)) => assert!(msg.contains("disk on fire")),
            other => panic!("expected execution failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_async_tool_is_captured() {
        let entry = ToolEntry::builder("panics").asynchronous(
            |_args: ToolArguments, _ctx: InvocationContext| async move {
                if true {
                    panic!("unexpected");
                }
                Ok::<_, anyhow::Error>(0)
            },
        );
        let dispatcher = dispatcher_with(vec![entry]);
        let (outcome, _) = run(&dispatcher, "panics", json!({})).await;
        assert!(matches!(outcome, Err(ToolError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_exactly_one_result_and_it_is_last() {
        let dispatcher = dispatcher_with(vec![]);
        let (outcome, events) = run(&dispatcher, "context_info", json!({ "message": "hi" })).await;

        assert!(outcome.unwrap().text.contains("Request ID: 1"));
        assert_eq!(events.iter().filter(|e| e.is_result()).count(), 1);
        assert!(events.last().unwrap().is_result());
        assert_eq!(events.len(), 5);
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_timeout_produces_timeout_result() {
        let entry = ToolEntry::builder("slow").asynchronous(
            |_args: ToolArguments, _ctx: InvocationContext| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, anyhow::Error>("late")
            },
        );
        let dispatcher =
            dispatcher_with(vec![entry]).with_timeout(Some(Duration::from_millis(50)));

        let (outcome, events) = run(&dispatcher, "slow", json!({})).await;
        assert!(matches!(outcome, Err(ToolError::Timeout(_))));
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_lingering_context_is_a_no_op() {
        let stash: Arc<Mutex<Option<InvocationContext>>> = Arc::new(Mutex::new(None));
        let keep = stash.clone();
        let entry = ToolEntry::builder("leaky").asynchronous(
            move |_args: ToolArguments, ctx: InvocationContext| {
                let keep = keep.clone();
                async move {
                    *keep.lock().unwrap() = Some(ctx);
                    Ok::<_, anyhow::Error>("ok")
                }
            },
        );
        let dispatcher = dispatcher_with(vec![entry]);
        let (outcome, _) = run(&dispatcher, "leaky", json!({})).await;
        assert!(outcome.is_ok());

        let ctx = stash.lock().unwrap().take().unwrap();
        assert!(ctx.is_closed());
        assert!(!ctx.info("too late"));
    }

    #[tokio::test]
    async fn test_second_result_is_fatal_and_closes_context() {
        let stash: Arc<Mutex<Option<InvocationContext>>> = Arc::new(Mutex::new(None));
        let keep = stash.clone();
        let entry = ToolEntry::builder("twice").asynchronous(
            move |_args: ToolArguments, ctx: InvocationContext| {
                let keep = keep.clone();
                async move {
                    *keep.lock().unwrap() = Some(ctx);
                    Ok::<_, anyhow::Error>("ok")
                }
            },
        );
        let dispatcher = dispatcher_with(vec![entry]);

        let session = Session::new(DeliveryMode::Streaming, 16);
        let req = request("twice", json!({}), "3");
        session.open_invocation(req.request_id.clone()).unwrap();
        session
            .publish(
                &req.request_id,
                EventKind::Result(Err(ToolError::not_found("x"))),
            )
            .unwrap();

        let err = dispatcher.dispatch(req, &session).await.unwrap_err();
        assert!(err.is_fatal());

        let ctx = stash.lock().unwrap().take().unwrap();
        assert!(ctx.is_closed());
        assert!(!ctx.info("after fatal"));
    }

    #[tokio::test]
    async fn test_session_teardown_mid_invocation() {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let emitted = Arc::new(AtomicBool::new(true));

        let (s, g, e) = (started.clone(), gate.clone(), emitted.clone());
        let entry = ToolEntry::builder("waiter").asynchronous(
            move |_args: ToolArguments, ctx: InvocationContext| {
                let (s, g, e) = (s.clone(), g.clone(), e.clone());
                async move {
                    s.notify_one();
                    g.notified().await;
                    e.store(ctx.info("after teardown"), Ordering::SeqCst);
                    Ok::<_, anyhow::Error>("finished")
                }
            },
        );
        let dispatcher = dispatcher_with(vec![entry]);

        let session = Session::new(DeliveryMode::Streaming, 16);
        let req = request("waiter", json!({}), "9");
        session.open_invocation(req.request_id.clone()).unwrap();

        let handle = {
            let dispatcher = dispatcher.clone();
            let session = session.clone();
            tokio::spawn(async move { dispatcher.dispatch(req, &session).await })
        };

        started.notified().await;
        session.close();
        gate.notify_one();

        let event = handle.await.unwrap().unwrap();
        assert!(matches!(event.kind, EventKind::Result(Ok(_))));
        assert!(!emitted.load(Ordering::SeqCst));

        // Other sessions are unaffected.
        let (outcome, _) = run(&dispatcher, "sum_numbers", json!({ "a": 1, "b": 1 })).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_invocations_on_one_session_stay_ordered() {
        let dispatcher = dispatcher_with(vec![]);
        let session = Session::new(DeliveryMode::Streaming, 64);

        let mut queues = Vec::new();
        let mut handles = Vec::new();
        for i in 0..4 {
            let id = i.to_string();
            let req = request("context_info", json!({ "message": id }), &id);
            queues.push(session.open_invocation(req.request_id.clone()).unwrap());
            let dispatcher = dispatcher.clone();
            let session = session.clone();
            let handle = tokio::spawn(async move { dispatcher.dispatch(req, &session).await });
            handles.push(handle);
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for queue in &queues {
            let events = drain(queue).await;
            assert!(events.iter().all(|e| &e.request_id == queue.request_id()));
            assert_eq!(events.iter().filter(|e| e.is_result()).count(), 1);
            assert!(events.last().unwrap().is_result());
            assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
        }
    }

    #[tokio::test]
    async fn test_wrong_return_type_is_execution_failure() {
        let entry = ToolEntry::builder("liar")
            .returns(OutputKind::Scalar(ParamType::Number))
            .sync(|_args: ToolArguments| Ok("not a number"));
        let dispatcher = dispatcher_with(vec![entry]);
        let (outcome, _) = run(&dispatcher, "liar", json!({})).await;
        assert!(matches!(outcome, Err(ToolError::ExecutionFailed(_))));
    }
}
