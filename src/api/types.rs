//! API request and response types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::execution::Invocation;
use crate::session::SessionSnapshot;

/// Body of `POST /execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    /// Instruction handed to the tool as a single argument.
    pub prompt: String,
    /// Extra arguments. The configured default applies only when the field
    /// is absent; `null` and `""` both mean no extra arguments.
    #[serde(default, deserialize_with = "explicit_args")]
    pub args: Option<String>,
}

fn explicit_args<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let args = Option::<String>::deserialize(deserializer)?;
    Ok(Some(args.unwrap_or_default()))
}

impl From<ExecuteRequest> for Invocation {
    fn from(req: ExecuteRequest) -> Self {
        Invocation {
            instruction: req.prompt,
            args: req.args,
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for StatusResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Informational reply, e.g. when no log has been written yet.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of `GET /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionSnapshot>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "INTERNAL_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
