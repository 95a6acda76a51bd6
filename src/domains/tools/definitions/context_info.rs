//! Context info tool definition.
//!
//! Exercises the invocation context: emits log and progress events while it
//! runs and reports the request id it was invoked with.

use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::domains::schema::ParamType;
use crate::domains::tools::{InvocationContext, OutputKind, ToolArguments, ToolEntry, ToolHandler};

#[derive(Debug, Clone, Deserialize)]
pub struct ContextInfoParams {
    pub message: String,
}

/// Context info tool - demonstrates logging, progress and metadata access.
pub struct ContextInfoTool;

impl ContextInfoTool {
    pub const NAME: &'static str = "context_info";
    pub const DESCRIPTION: &'static str =
        "Demonstrate context capabilities with logging, progress reporting, and metadata access.";

    pub fn entry() -> ToolEntry {
        ToolEntry::builder(Self::NAME)
            .description(Self::DESCRIPTION)
            .required("message", ParamType::String, "A message to process")
            .returns(OutputKind::Text)
            .handler(ContextInfoTool)
    }

    #[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
    pub async fn execute(message: &str, ctx: &InvocationContext) -> String {
        ctx.info(format!("Processing context info request: {}", message));
        ctx.debug("This is a debug message from the context tool");

        ctx.emit_progress(0.5, Some(1.0), Some("Processing message..."));
        tokio::task::yield_now().await;
        ctx.emit_progress(1.0, Some(1.0), Some("Complete"));

        format!(
            "Context Information:\n\
             - Message: {}\n\
             - Request ID: {}\n\
             - Context logging available: Yes\n\
             - Progress reporting available: Yes\n\
             - User interaction capabilities: Available through context\n",
            message,
            ctx.request_id()
        )
    }
}

#[async_trait::async_trait]
impl ToolHandler for ContextInfoTool {
    async fn call(
        &self,
        arguments: ToolArguments,
        ctx: InvocationContext,
    ) -> anyhow::Result<Value> {
        let params: ContextInfoParams = arguments.parse()?;
        Ok(Value::String(Self::execute(&params.message, &ctx).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{DeliveryMode, Session};
    use crate::domains::tools::{EventKind, LogLevel, RequestId};

    #[tokio::test]
    async fn test_context_info_reports_message_and_request_id() {
        let ctx = InvocationContext::detached(RequestId::new("test-123"));
        let text = ContextInfoTool::execute("test message", &ctx).await;
        assert!(text.contains("test message"));
        assert!(text.contains("test-123"));
    }

    #[tokio::test]
    async fn test_context_info_emits_logs_then_progress() {
        let session = Session::new(DeliveryMode::Streaming, 16);
        let id = RequestId::new("ctx-1");
        let queue = session.open_invocation(id.clone()).unwrap();
        let ctx = InvocationContext::new(id, &session);

        ContextInfoTool::execute("hello", &ctx).await;
        assert_eq!(ctx.emitted_events(), 4);

        let mut levels = Vec::new();
        let mut progress = Vec::new();
        for _ in 0..4 {
            match queue.recv().await.unwrap().kind {
                EventKind::Log { level, .. } => levels.push(level),
                EventKind::Progress { progress: p, .. } => progress.push(p),
                EventKind::Result(_) => panic!("tool must not emit results"),
            }
        }
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Debug]);
        assert_eq!(progress, vec![0.5, 1.0]);
    }
}
