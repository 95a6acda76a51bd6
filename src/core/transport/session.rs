//! Sessions and their outbound event channel.
//!
//! A [`Session`] is one logical client connection. Each in-flight invocation
//! on a session owns a bounded [`EventQueue`] keyed by request id; together
//! these queues form the session's outbound channel. Producers (invocation
//! contexts and the dispatcher) publish through the session, the transport
//! drains the queue of the request it is serving.
//!
//! Backpressure policy: when a queue is full, the oldest advisory event
//! (log/progress) is dropped to make room. The terminal result is never
//! dropped and may exceed the capacity by one.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::DeliveryMode;
use super::error::{TransportError, TransportResult};
use crate::core::error::{Error, Result};
use crate::domains::tools::{Event, EventKind, RequestId};

// ============================================================================
// Event queue
// ============================================================================

/// What happened to a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued with the given sequence number.
    Queued(u64),
    /// Queued, but the oldest advisory event was evicted to make room.
    QueuedDroppedOldest(u64),
    /// Not queued: the session is gone, the consumer detached, or the
    /// invocation already produced its result.
    Rejected,
}

#[derive(Default)]
struct QueueState {
    events: VecDeque<Event>,
    next_seq: u64,
    dropped: u64,
    result_queued: bool,
    closed: bool,
}

/// Bounded, ordered event queue for one invocation.
pub struct EventQueue {
    request_id: RequestId,
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl EventQueue {
    pub fn new(request_id: RequestId, capacity: usize) -> Self {
        Self {
            request_id,
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event. Sequence numbers are assigned under the queue lock,
    /// so they always match queue order.
    ///
    /// A second result for the same invocation is an internal invariant
    /// violation and is reported as [`Error::Fatal`].
    pub fn push(&self, kind: EventKind) -> Result<Delivery> {
        let mut state = self.lock();

        if state.closed {
            return Ok(Delivery::Rejected);
        }
        if state.result_queued {
            if kind.is_result() {
                return Err(Error::fatal(format!(
                    "second result produced for request {}",
                    self.request_id
                )));
            }
            return Ok(Delivery::Rejected);
        }

        let mut evicted = false;
        if !kind.is_result() && state.events.len() >= self.capacity {
            state.events.pop_front();
            state.dropped += 1;
            evicted = true;
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        if kind.is_result() {
            state.result_queued = true;
        }
        state.events.push_back(Event {
            request_id: self.request_id.clone(),
            seq,
            kind,
        });
        drop(state);

        self.notify.notify_one();

        if evicted {
            debug!("Event queue for {} full, dropped oldest event", self.request_id);
            Ok(Delivery::QueuedDroppedOldest(seq))
        } else {
            Ok(Delivery::Queued(seq))
        }
    }

    /// Wait for the next event. Returns `None` once the queue is closed and
    /// drained.
    pub async fn recv(&self) -> Option<Event> {
        loop {
            {
                let mut state = self.lock();
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Close the queue; pending events can still be drained.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Number of advisory events evicted so far.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Session
// ============================================================================

/// One client session.
pub struct Session {
    id: String,
    mode: DeliveryMode,
    queue_capacity: usize,
    created_at: Instant,
    last_activity: Mutex<Instant>,
    inflight: Mutex<HashMap<RequestId, Arc<EventQueue>>>,
    closed: AtomicBool,
}

impl Session {
    /// Create a session with a fresh random id.
    pub fn new(mode: DeliveryMode, queue_capacity: usize) -> Arc<Self> {
        Self::with_id(Uuid::new_v4().to_string(), mode, queue_capacity)
    }

    pub fn with_id(id: impl Into<String>, mode: DeliveryMode, queue_capacity: usize) -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            id: id.into(),
            mode,
            queue_capacity,
            created_at: now,
            last_activity: Mutex::new(now),
            inflight: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Record client activity.
    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    fn inflight(&self) -> MutexGuard<'_, HashMap<RequestId, Arc<EventQueue>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight().len()
    }

    /// Register an invocation and return the queue its events will land in.
    pub fn open_invocation(&self, request_id: RequestId) -> TransportResult<Arc<EventQueue>> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed(self.id.clone()));
        }

        let mut inflight = self.inflight();
        if inflight.contains_key(&request_id) {
            return Err(TransportError::DuplicateRequest(request_id.to_string()));
        }

        let queue = Arc::new(EventQueue::new(request_id.clone(), self.queue_capacity));
        inflight.insert(request_id, queue.clone());
        Ok(queue)
    }

    /// Publish an event for an in-flight invocation.
    ///
    /// Events for closed sessions or detached invocations are absorbed.
    pub fn publish(&self, request_id: &RequestId, kind: EventKind) -> Result<Delivery> {
        if self.is_closed() {
            return Ok(Delivery::Rejected);
        }
        let queue = self.inflight().get(request_id).cloned();
        match queue {
            Some(queue) => queue.push(kind),
            None => {
                debug!(
                    "Discarding {} event for detached request {} on session {}",
                    kind.label(),
                    request_id,
                    self.id
                );
                Ok(Delivery::Rejected)
            }
        }
    }

    /// The consumer of an invocation's events went away.
    pub fn detach(&self, request_id: &RequestId) {
        if let Some(queue) = self.inflight().remove(request_id) {
            queue.close();
        }
    }

    /// Tear the session down. In-flight invocations keep running but their
    /// further events are absorbed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let queues: Vec<_> = self.inflight().drain().map(|(_, q)| q).collect();
        for queue in &queues {
            queue.close();
        }
        debug!(
            "Session {} closed with {} invocation(s) in flight",
            self.id,
            queues.len()
        );
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Session manager
// ============================================================================

/// Owns the live sessions of the HTTP transport.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    mode: DeliveryMode,
    queue_capacity: usize,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(mode: DeliveryMode, queue_capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            mode,
            queue_capacity,
            idle_timeout,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Create and register a new session.
    pub async fn create(&self) -> Arc<Session> {
        let session = Session::new(self.mode, self.queue_capacity);
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), session.clone());
        info!("Session {} created", session.id());
        session
    }

    /// A session that lives only for one request and is never registered.
    pub fn ephemeral(&self) -> Arc<Session> {
        Session::new(self.mode, self.queue_capacity)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Look up a live session, touching it.
    pub async fn require(&self, id: &str) -> TransportResult<Arc<Session>> {
        let session = self
            .get(id)
            .await
            .filter(|s| !s.is_closed())
            .ok_or_else(|| TransportError::SessionNotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Remove and close a session.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.write().await.remove(id)?;
        session.close();
        info!("Session {} terminated after {:?}", id, session.age());
        Some(session)
    }

    /// Close and forget every session.
    pub async fn close_all(&self) {
        for (_, session) in self.sessions.write().await.drain() {
            session.close();
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close sessions that are closed already or idle past the timeout with
    /// nothing in flight. Returns how many were removed.
    pub async fn reap_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.is_closed()
                || (session.inflight_count() == 0 && session.idle_for() >= self.idle_timeout);
            if expired {
                session.close();
                info!("Session {} expired", id);
            }
            !expired
        });
        before - sessions.len()
    }

    /// Periodically reap idle sessions until the manager is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let reaped = manager.reap_idle().await;
                if reaped > 0 {
                    debug!("Reaped {} idle session(s)", reaped);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{LogLevel, ToolOutput};

    fn log(message: &str) -> EventKind {
        EventKind::Log {
            level: LogLevel::Info,
            message: message.to_string(),
        }
    }

    fn ok_result() -> EventKind {
        EventKind::Result(Ok(ToolOutput {
            text: "done".into(),
            structured: None,
        }))
    }

    #[tokio::test]
    async fn test_queue_orders_events_and_assigns_sequence() {
        let queue = EventQueue::new(RequestId::new("1"), 8);
        queue.push(log("a")).unwrap();
        queue.push(log("b")).unwrap();
        queue.push(ok_result()).unwrap();

        let seqs: Vec<u64> = [
            queue.recv().await.unwrap(),
            queue.recv().await.unwrap(),
            queue.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.seq)
        .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_queue_drops_oldest_advisory_when_full() {
        let queue = EventQueue::new(RequestId::new("1"), 2);
        assert_eq!(queue.push(log("a")).unwrap(), Delivery::Queued(1));
        assert_eq!(queue.push(log("b")).unwrap(), Delivery::Queued(2));
        assert_eq!(
            queue.push(log("c")).unwrap(),
            Delivery::QueuedDroppedOldest(3)
        );
        assert_eq!(queue.dropped(), 1);

        // Result is never dropped, even at capacity.
        assert_eq!(queue.push(ok_result()).unwrap(), Delivery::Queued(4));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_queue_rejects_after_result() {
        let queue = EventQueue::new(RequestId::new("1"), 4);
        queue.push(ok_result()).unwrap();
        assert_eq!(queue.push(log("late")).unwrap(), Delivery::Rejected);
        assert!(matches!(queue.push(ok_result()), Err(Error::Fatal(_))));
    }

    #[tokio::test]
    async fn test_queue_recv_wakes_on_push() {
        let queue = Arc::new(EventQueue::new(RequestId::new("1"), 4));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };
        tokio::task::yield_now().await;
        queue.push(log("hello")).unwrap();
        let event = consumer.await.unwrap().unwrap();
        assert_eq!(event.seq, 1);
    }

    #[tokio::test]
    async fn test_queue_close_ends_stream() {
        let queue = EventQueue::new(RequestId::new("1"), 4);
        queue.close();
        assert!(queue.recv().await.is_none());
    }

    #[test]
    fn test_session_rejects_duplicate_request() {
        let session = Session::new(DeliveryMode::Streaming, 4);
        session.open_invocation(RequestId::new("1")).unwrap();
        assert!(matches!(
            session.open_invocation(RequestId::new("1")),
            Err(TransportError::DuplicateRequest(_))
        ));
    }

    #[test]
    fn test_publish_after_detach_is_absorbed() {
        let session = Session::new(DeliveryMode::Streaming, 4);
        let id = RequestId::new("1");
        let queue = session.open_invocation(id.clone()).unwrap();
        session.detach(&id);
        assert_eq!(session.publish(&id, log("x")).unwrap(), Delivery::Rejected);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_close_absorbs_emits_and_wakes_consumers() {
        let session = Session::new(DeliveryMode::Buffered, 4);
        let id = RequestId::new("7");
        let queue = session.open_invocation(id.clone()).unwrap();

        session.close();

        assert!(session.is_closed());
        assert_eq!(session.publish(&id, log("x")).unwrap(), Delivery::Rejected);
        assert!(queue.recv().await.is_none());
        assert!(session.open_invocation(RequestId::new("8")).is_err());
    }

    #[tokio::test]
    async fn test_manager_lifecycle() {
        let manager = SessionManager::new(DeliveryMode::Streaming, 4, Duration::from_secs(60));
        let session = manager.create().await;
        assert_eq!(manager.len().await, 1);
        assert!(manager.require(session.id()).await.is_ok());

        manager.remove(session.id()).await;
        assert!(session.is_closed());
        assert!(matches!(
            manager.require(session.id()).await,
            Err(TransportError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reap_idle_skips_busy_sessions() {
        let manager = SessionManager::new(DeliveryMode::Streaming, 4, Duration::ZERO);
        let idle = manager.create().await;
        let busy = manager.create().await;
        busy.open_invocation(RequestId::new("1")).unwrap();

        assert_eq!(manager.reap_idle().await, 1);
        assert!(idle.is_closed());
        assert!(!busy.is_closed());
        assert!(manager.get(busy.id()).await.is_some());
    }

    #[test]
    fn test_ephemeral_sessions_are_not_registered() {
        let manager = SessionManager::new(DeliveryMode::Streaming, 4, Duration::from_secs(1));
        let session = manager.ephemeral();
        assert!(tokio_test::block_on(manager.get(session.id())).is_none());
    }
}
