//! Per-invocation context handed to running tools.
//!
//! The context lets a tool report log and progress events while it runs.
//! Emits are fire-and-forget: they never block and never fail the
//! invocation. Once the invocation has produced its result, or its session
//! is gone, further emits are silently absorbed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use super::events::{EventKind, LogLevel, RequestId};
use crate::core::transport::{Delivery, Session};

struct ContextInner {
    request_id: RequestId,
    session: Weak<Session>,
    emitted: AtomicU64,
    closed: AtomicBool,
}

/// Handle passed to a tool for the duration of one invocation.
///
/// Cheap to clone. The session is referenced weakly: a context never keeps a
/// torn-down session alive.
#[derive(Clone)]
pub struct InvocationContext {
    inner: Arc<ContextInner>,
}

impl InvocationContext {
    /// Bind a context to a session.
    pub fn new(request_id: RequestId, session: &Arc<Session>) -> Self {
        Self::with_session(request_id, Arc::downgrade(session))
    }

    /// A context with nowhere to deliver events; every emit is a no-op.
    pub fn detached(request_id: RequestId) -> Self {
        Self::with_session(request_id, Weak::new())
    }

    fn with_session(request_id: RequestId, session: Weak<Session>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id,
                session,
                emitted: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Id of the request being served.
    pub fn request_id(&self) -> &RequestId {
        &self.inner.request_id
    }

    /// Number of events this context managed to queue.
    pub fn emitted_events(&self) -> u64 {
        self.inner.emitted.load(Ordering::Relaxed)
    }

    /// Whether emits still have somewhere to go.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
            || self
                .inner
                .session
                .upgrade()
                .is_none_or(|session| session.is_closed())
    }

    /// Stop delivering events from this context.
    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Emit a log event.
    pub fn emit_log(&self, level: LogLevel, message: impl Into<String>) -> bool {
        let message = message.into();
        debug!(request_id = %self.inner.request_id, ?level, "{}", message);
        self.emit(EventKind::Log { level, message })
    }

    pub fn debug(&self, message: impl Into<String>) -> bool {
        self.emit_log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.emit_log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.emit_log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit_log(LogLevel::Error, message)
    }

    /// Emit a progress event.
    ///
    /// `progress` is either a fraction of `total` or an unbounded counter
    /// when `total` is `None`. Tools should keep it non-decreasing; nothing
    /// enforces that here.
    pub fn emit_progress(&self, progress: f64, total: Option<f64>, message: Option<&str>) -> bool {
        self.emit(EventKind::Progress {
            progress,
            total,
            message: message.map(str::to_string),
        })
    }

    /// Returns `true` if the event was queued.
    fn emit(&self, kind: EventKind) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        let Some(session) = self.inner.session.upgrade() else {
            return false;
        };

        match session.publish(&self.inner.request_id, kind) {
            Ok(Delivery::Queued(_)) | Ok(Delivery::QueuedDroppedOldest(_)) => {
                self.inner.emitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(Delivery::Rejected) => false,
            Err(e) => {
                warn!("Failed to emit event for {}: {}", self.inner.request_id, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.inner.request_id)
            .field("emitted", &self.emitted_events())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::DeliveryMode;

    #[tokio::test]
    async fn test_emits_reach_the_session_in_order() {
        let session = Session::new(DeliveryMode::Streaming, 16);
        let id = RequestId::new("req-1");
        let queue = session.open_invocation(id.clone()).unwrap();
        let ctx = InvocationContext::new(id, &session);

        assert!(ctx.info("starting"));
        assert!(ctx.emit_progress(0.5, Some(1.0), Some("halfway")));
        assert!(ctx.debug("details"));
        assert_eq!(ctx.emitted_events(), 3);

        let first = queue.recv().await.unwrap();
        let second = queue.recv().await.unwrap();
        let third = queue.recv().await.unwrap();
        assert!(first.seq < second.seq && second.seq < third.seq);
        assert!(matches!(
            first.kind,
            EventKind::Log {
                level: LogLevel::Info,
                ..
            }
        ));
        assert!(matches!(second.kind, EventKind::Progress { .. }));
    }

    #[test]
    fn test_closed_context_absorbs_emits() {
        let session = Session::new(DeliveryMode::Streaming, 16);
        let id = RequestId::new("req-2");
        let queue = session.open_invocation(id.clone()).unwrap();
        let ctx = InvocationContext::new(id, &session);

        ctx.close();
        assert!(!ctx.info("ignored"));
        assert!(ctx.is_closed());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dropped_session_absorbs_emits() {
        let session = Session::new(DeliveryMode::Streaming, 16);
        let id = RequestId::new("req-3");
        session.open_invocation(id.clone()).unwrap();
        let ctx = InvocationContext::new(id, &session);

        drop(session);
        assert!(ctx.is_closed());
        assert!(!ctx.emit_progress(1.0, None, None));
    }

    #[test]
    fn test_detached_context() {
        let ctx = InvocationContext::detached(RequestId::new("test-123"));
        assert_eq!(ctx.request_id().as_str(), "test-123");
        assert!(!ctx.warning("nobody listening"));
        assert_eq!(ctx.emitted_events(), 0);
    }
}
