//! Streamable HTTP transport.
//!
//! JSON-RPC 2.0 over `POST {rpc_path}`. `initialize` opens a session whose
//! id is returned in the `Mcp-Session-Id` header; later requests carrying
//! that header run on it. Requests without the header run on a throwaway
//! session that is closed once the response is complete.
//!
//! `tools/call` is answered according to the configured [`DeliveryMode`]:
//! a `text/event-stream` of log/progress notifications followed by the
//! JSON-RPC response, or a single JSON response with the advisory events
//! attached under `result._meta.events`.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post},
};
use bytes::Bytes;
use futures::stream;
use rmcp::model::{CallToolResult, Content};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

use super::config::DeliveryMode;
use super::session::{EventQueue, Session, SessionManager};
use super::{TransportConfig, TransportError, TransportResult};
use crate::core::McpServer;
use crate::domains::prompts::PromptError;
use crate::domains::tools::{
    Dispatcher, Event, EventKind, InvocationRequest, InvocationResult, RequestId, ToolError,
};

/// Header carrying the session id.
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

// ============================================================================
// JSON-RPC envelope
// ============================================================================

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// `None` only when the member is absent; an explicit `null` is kept.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Attach structured data to an error response.
    pub fn with_data(mut self, data: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.data = Some(data);
        }
        self
    }

    /// Parse error.
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::error(None, -32700, msg)
    }

    /// Method not found error.
    pub fn method_not_found(id: Option<Value>) -> Self {
        Self::error(id, -32601, "Method not found")
    }

    /// Invalid request error.
    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::error(id, -32600, "Invalid Request")
    }

    /// Invalid params error.
    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32602, msg)
    }

    /// Internal error.
    pub fn internal_error(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32603, msg)
    }
}

impl IntoResponse for JsonRpcResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            TransportError::SessionNotFound(_) | TransportError::SessionClosed(_) => {
                (StatusCode::NOT_FOUND, -32001)
            }
            TransportError::ProtocolError(_) => (StatusCode::BAD_REQUEST, -32600),
            TransportError::DuplicateRequest(_) => (StatusCode::CONFLICT, -32600),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, -32603),
        };
        warn!("Request rejected ({}): {}", status, self);
        (status, JsonRpcResponse::error(None, code, self.to_string())).into_response()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    server: McpServer,
    sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(server: McpServer, sessions: Arc<SessionManager>) -> Self {
        Self { server, sessions }
    }
}

/// HTTP transport handler.
pub struct HttpTransport {
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Build the axum router.
    pub fn router(&self, state: AppState) -> Router {
        let mut app = Router::new()
            .route(
                &self.config.rpc_path,
                post(handle_post).delete(handle_delete).get(handle_get),
            )
            .route("/health", get(health_check))
            .route("/", get(root_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([SESSION_HEADER]);
            app = app.layer(cors);
        }

        app
    }

    /// Run the HTTP transport until `shutdown` resolves.
    pub async fn run<F>(
        self,
        server: McpServer,
        sessions: Arc<SessionManager>,
        shutdown: F,
    ) -> TransportResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.address();
        let app = self.router(AppState::new(server, sessions));

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!(
            "Ready - listening on {} ({} delivery, CORS {})",
            addr,
            self.config.delivery.as_str(),
            cors_status
        );
        info!("  → JSON-RPC: POST {}", self.config.rpc_path);
        info!("  → Health:   GET /health");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP transport stopped");
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Root handler - provides server info.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.server.info())
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.server.health())
}

/// There is no standalone server-push stream.
async fn handle_get() -> impl IntoResponse {
    StatusCode::METHOD_NOT_ALLOWED
}

/// Terminate a session.
async fn handle_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let id = match session_header(&headers) {
        Ok(Some(id)) => id,
        Ok(None) => {
            return TransportError::protocol("Missing Mcp-Session-Id header").into_response();
        }
        Err(e) => return e.into_response(),
    };

    match state.sessions.remove(id).await {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => TransportError::SessionNotFound(id.to_string()).into_response(),
    }
}

/// Handle a JSON-RPC message.
async fn handle_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed JSON-RPC body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::parse_error(e.to_string()),
            )
                .into_response();
        }
    };

    match process_request(&state, &headers, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn session_header(headers: &HeaderMap) -> TransportResult<Option<&str>> {
    headers
        .get(&SESSION_HEADER)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| TransportError::protocol("Mcp-Session-Id is not valid ASCII"))
        })
        .transpose()
}

#[instrument(skip_all, fields(method = %request.method))]
async fn process_request(
    state: &AppState,
    headers: &HeaderMap,
    request: JsonRpcRequest,
) -> TransportResult<Response> {
    if request.jsonrpc != "2.0" {
        return Ok(JsonRpcResponse::invalid_request(request.id).into_response());
    }
    if request.id.as_ref().is_some_and(Value::is_null) {
        warn!("Rejected {} request with a null id", request.method);
        return Ok(JsonRpcResponse::invalid_request(request.id).into_response());
    }

    if request.method == "initialize" {
        return handle_initialize(state, request).await;
    }

    let (session, ephemeral) = match session_header(headers)? {
        Some(id) => (state.sessions.require(id).await?, false),
        None => (state.sessions.ephemeral(), true),
    };

    let Some(id) = request.id.clone() else {
        handle_notification(&request);
        if ephemeral {
            session.close();
        }
        return Ok(StatusCode::ACCEPTED.into_response());
    };

    debug!("Received JSON-RPC request: {}", request.method);
    let response = match request.method.as_str() {
        "ping" => JsonRpcResponse::success(Some(id), json!({})),
        "tools/list" => {
            JsonRpcResponse::success(Some(id), json!({ "tools": state.server.list_tools() }))
        }
        "tools/call" => {
            return handle_tools_call(state, session, ephemeral, id, request.params).await;
        }
        "prompts/list" => {
            JsonRpcResponse::success(Some(id), json!({ "prompts": state.server.list_prompts() }))
        }
        "prompts/get" => handle_prompts_get(state, id, request.params.as_ref()),
        method => {
            warn!("Unknown method: {}", method);
            JsonRpcResponse::method_not_found(Some(id))
        }
    };

    if ephemeral {
        session.close();
    }
    Ok(response.into_response())
}

/// Handle initialize request.
async fn handle_initialize(
    state: &AppState,
    request: JsonRpcRequest,
) -> TransportResult<Response> {
    let session = state.sessions.create().await;
    let header = HeaderValue::from_str(session.id())
        .map_err(|e| TransportError::http(e.to_string()))?;

    let mut response = JsonRpcResponse::success(request.id, state.server.initialize_result())
        .into_response();
    response.headers_mut().insert(SESSION_HEADER, header);
    Ok(response)
}

fn handle_notification(request: &JsonRpcRequest) {
    match request.method.as_str() {
        "notifications/initialized" => info!("Client sent initialized notification"),
        method => debug!("Received notification: {}", method),
    }
}

/// Handle prompts/get request.
fn handle_prompts_get(state: &AppState, id: Value, params: Option<&Value>) -> JsonRpcResponse {
    let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
        return JsonRpcResponse::invalid_params(Some(id), "Missing prompt name");
    };
    let arguments = params.and_then(|p| p.get("arguments"));

    match state.server.get_prompt(name, arguments) {
        Ok(result) => JsonRpcResponse::success(
            Some(id),
            json!({ "description": result.description, "messages": result.messages }),
        ),
        Err(e @ PromptError::NotFound(_)) => {
            JsonRpcResponse::invalid_params(Some(id), e.to_string())
                .with_data(json!({ "kind": e.kind() }))
        }
        Err(PromptError::Validation(v)) => {
            JsonRpcResponse::invalid_params(Some(id), format!("Invalid arguments: {}", v))
                .with_data(json!({ "kind": "validation", "violations": v.violations }))
        }
        Err(e) => JsonRpcResponse::internal_error(Some(id), e.to_string()),
    }
}

/// Handle tools/call request.
async fn handle_tools_call(
    state: &AppState,
    session: Arc<Session>,
    ephemeral: bool,
    id: Value,
    params: Option<Value>,
) -> TransportResult<Response> {
    let Some(name) = params
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        if ephemeral {
            session.close();
        }
        return Ok(
            JsonRpcResponse::invalid_params(Some(id), "Missing tool name").into_response(),
        );
    };
    let arguments = params.as_ref().and_then(|p| p.get("arguments")).cloned();
    let progress_token = params
        .as_ref()
        .and_then(|p| p.pointer("/_meta/progressToken"))
        .cloned()
        .unwrap_or_else(|| id.clone());

    let request_id = RequestId::from_json(&id);
    let queue = session.open_invocation(request_id.clone())?;
    let guard = InvocationGuard {
        session: session.clone(),
        request_id: request_id.clone(),
        ephemeral,
    };

    spawn_dispatch(
        state.server.dispatcher().clone(),
        session.clone(),
        InvocationRequest {
            tool_name: name.clone(),
            arguments,
            request_id,
        },
    );

    let reply = Reply {
        rpc_id: id,
        progress_token,
        logger: name,
    };

    Ok(match session.mode() {
        DeliveryMode::Buffered => buffered(queue, guard, reply).await,
        DeliveryMode::Streaming => streaming(queue, guard, reply),
    })
}

/// Run the invocation detached from the response, so a client that goes
/// away does not cancel the tool.
fn spawn_dispatch(dispatcher: Dispatcher, session: Arc<Session>, request: InvocationRequest) {
    tokio::spawn(async move {
        match dispatcher.dispatch(request, &session).await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => {
                error!("Fatal error on session {}, closing it: {}", session.id(), e);
                session.close();
            }
            Err(e) => warn!("Invocation on session {} failed: {}", session.id(), e),
        }
    });
}

// ============================================================================
// Delivery
// ============================================================================

/// Detaches the invocation when its response is finished or abandoned.
struct InvocationGuard {
    session: Arc<Session>,
    request_id: RequestId,
    ephemeral: bool,
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        self.session.detach(&self.request_id);
        if self.ephemeral {
            self.session.close();
        }
    }
}

/// Per-invocation wire context.
struct Reply {
    rpc_id: Value,
    progress_token: Value,
    logger: String,
}

impl Reply {
    /// One event as a JSON-RPC message.
    fn message(&self, event: &Event) -> Value {
        match &event.kind {
            EventKind::Log { level, message } => json!({
                "jsonrpc": "2.0",
                "method": "notifications/message",
                "params": { "level": level, "logger": self.logger, "data": message },
            }),
            EventKind::Progress {
                progress,
                total,
                message,
            } => {
                let mut params =
                    json!({ "progressToken": self.progress_token, "progress": progress });
                if let Some(total) = total {
                    params["total"] = json!(total);
                }
                if let Some(message) = message {
                    params["message"] = json!(message);
                }
                json!({ "jsonrpc": "2.0", "method": "notifications/progress", "params": params })
            }
            EventKind::Result(outcome) => json!(self.response(outcome, Vec::new())),
        }
    }

    fn response(&self, outcome: &InvocationResult, events: Vec<Value>) -> JsonRpcResponse {
        call_tool_response(Some(self.rpc_id.clone()), outcome, events)
    }

    fn missing_result(&self) -> JsonRpcResponse {
        JsonRpcResponse::internal_error(
            Some(self.rpc_id.clone()),
            "Invocation ended without a result",
        )
    }
}

/// Map an invocation outcome onto the `tools/call` response.
fn call_tool_response(
    id: Option<Value>,
    outcome: &InvocationResult,
    events: Vec<Value>,
) -> JsonRpcResponse {
    let (result, error_kind) = match outcome {
        Ok(output) => (CallToolResult::success(vec![Content::text(output.text.clone())]), None),
        Err(e @ (ToolError::ExecutionFailed(_) | ToolError::Timeout(_))) => {
            (CallToolResult::error(vec![Content::text(e.to_string())]), Some(e.kind()))
        }
        Err(e @ ToolError::NotFound(_)) => {
            return JsonRpcResponse::invalid_params(id, e.to_string())
                .with_data(json!({ "kind": e.kind() }));
        }
        Err(ToolError::Validation(v)) => {
            return JsonRpcResponse::invalid_params(id, format!("Invalid arguments: {}", v))
                .with_data(json!({ "kind": "validation", "violations": v.violations }));
        }
        Err(e) => return JsonRpcResponse::internal_error(id, e.to_string()),
    };

    let mut value = json!(result);
    if let Ok(Some(structured)) = outcome.as_ref().map(|o| o.structured.clone()) {
        value["structuredContent"] = structured;
    }

    let mut meta = serde_json::Map::new();
    if let Some(kind) = error_kind {
        meta.insert("errorKind".into(), json!(kind));
    }
    if !events.is_empty() {
        meta.insert("events".into(), Value::Array(events));
    }
    if !meta.is_empty() {
        value["_meta"] = Value::Object(meta);
    }

    JsonRpcResponse::success(id, value)
}

async fn buffered(queue: Arc<EventQueue>, guard: InvocationGuard, reply: Reply) -> Response {
    let mut events = Vec::new();
    let response = loop {
        match queue.recv().await {
            Some(event) => match &event.kind {
                EventKind::Result(outcome) => break reply.response(outcome, events),
                _ => events.extend(event.advisory_json()),
            },
            None => break reply.missing_result(),
        }
    };
    if queue.dropped() > 0 {
        debug!("{} advisory event(s) dropped for {}", queue.dropped(), queue.request_id());
    }
    drop(guard);
    response.into_response()
}

struct StreamState {
    queue: Arc<EventQueue>,
    reply: Reply,
    done: bool,
    _guard: InvocationGuard,
}

fn streaming(queue: Arc<EventQueue>, guard: InvocationGuard, reply: Reply) -> Response {
    let state = StreamState {
        queue,
        reply,
        done: false,
        _guard: guard,
    };

    let events = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        let message = match state.queue.recv().await {
            Some(event) => {
                state.done = event.is_result();
                state.reply.message(&event)
            }
            None => {
                state.done = true;
                json!(state.reply.missing_result())
            }
        };
        let frame = SseEvent::default()
            .event("message")
            .data(message.to_string());
        Some((Ok::<_, Infallible>(frame), state))
    });

    Sse::new(events)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text(": keep-alive"),
        )
        .into_response()
}
