//! REST API handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use tracing::{info, warn};

use super::types::{
    ErrorResponse, ExecuteRequest, ListSessionsResponse, MessageResponse, StatusResponse,
};
use crate::execution::{CommandExecutor, ExecutionConfig, Invocation};
use crate::security::ApiKeyStore;
use crate::session::SessionRegistry;
use crate::sink::{FileLineSink, LineSink, NullSink};
use crate::terminal::{TerminalBridge, TerminalConfig};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const LOG_NOT_FOUND: &str = "Log file not found.";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<CommandExecutor>,
    pub bridge: TerminalBridge,
    pub registry: SessionRegistry,
    pub auth: Arc<ApiKeyStore>,
    /// Execution log; `None` disables logging and `/logs`.
    pub log: Option<Arc<FileLineSink>>,
}

impl AppState {
    /// State with authentication disabled and no execution log.
    pub fn new(execution: ExecutionConfig, terminal: TerminalConfig, registry: SessionRegistry) -> Self {
        Self {
            executor: Arc::new(CommandExecutor::new(execution)),
            bridge: TerminalBridge::new(terminal, registry.clone()),
            registry,
            auth: Arc::new(ApiKeyStore::disabled()),
            log: None,
        }
    }

    pub fn with_auth(mut self, auth: ApiKeyStore) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    pub fn with_log(mut self, sink: FileLineSink) -> Self {
        self.log = Some(Arc::new(sink));
        self
    }

    fn line_sink(&self) -> Arc<dyn LineSink> {
        match &self.log {
            Some(log) => Arc::clone(log) as Arc<dyn LineSink>,
            None => Arc::new(NullSink),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            ExecutionConfig::default(),
            TerminalConfig::default(),
            SessionRegistry::new(),
        )
    }
}

/// Liveness and version.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse::default())
}

/// Run the configured tool once and stream its output as plain text.
///
/// Each line is appended to the execution log before it is sent, so the log
/// never lags behind what a client has seen.
pub async fn execute(State(state): State<AppState>, Json(req): Json<ExecuteRequest>) -> Response {
    let invocation: Invocation = req.into();
    info!(
        instruction_len = invocation.instruction.len(),
        args = ?invocation.args,
        "one-shot execution requested"
    );

    let mut lines = Box::pin(state.executor.execute(&invocation));
    let sink = state.line_sink();
    let body = async_stream::stream! {
        while let Some(line) = lines.next().await {
            let rendered = line.to_string();
            if let Err(e) = sink.append(&rendered).await {
                warn!("failed to append execution log: {}", e);
            }
            yield Ok::<_, std::io::Error>(rendered + "\n");
        }
    };

    ([(CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(body)).into_response()
}

/// Contents of the execution log.
pub async fn logs(State(state): State<AppState>) -> Response {
    let Some(log) = state.log.as_ref() else {
        return Json(MessageResponse::new(LOG_NOT_FOUND)).into_response();
    };

    match log.read_all().await {
        Ok(Some(contents)) => ([(CONTENT_TYPE, TEXT_PLAIN)], contents).into_response(),
        Ok(None) => Json(MessageResponse::new(LOG_NOT_FOUND)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(e.to_string())),
        )
            .into_response(),
    }
}

/// Live terminal sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<ListSessionsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let sessions = state.registry.snapshot().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(e.to_string())),
        )
    })?;

    Ok(Json(ListSessionsResponse {
        count: sessions.len(),
        sessions,
    }))
}
