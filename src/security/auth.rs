//! Bearer token authentication.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Paths reachable without credentials.
const PUBLIC_PATHS: &[&str] = &["/status"];

/// Paths that may carry the token as a `token` query parameter instead of a
/// header. Browsers cannot set headers on WebSocket upgrades.
const QUERY_TOKEN_PATHS: &[&str] = &["/terminal"];

/// Authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Whether requests must carry a valid token.
    pub enabled: bool,
    /// Accepted token. Authentication rejects everything when enabled
    /// without a token.
    pub api_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_token: None,
        }
    }
}

impl AuthConfig {
    /// Authentication turned off (local development).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            api_token: None,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            enabled: true,
            api_token: Some(token.into()),
        }
    }
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No credentials at all.
    Missing,
    /// Credentials present but not of the form `Bearer <token>`.
    InvalidFormat,
    /// Well-formed credentials with an unknown token.
    InvalidCredentials,
}

impl AuthFailure {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Missing => StatusCode::UNAUTHORIZED,
            Self::InvalidFormat | Self::InvalidCredentials => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Missing => "Not authenticated",
            Self::InvalidFormat => "Invalid token format. Use 'Bearer <token>'.",
            Self::InvalidCredentials => "Could not validate credentials",
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.message() }));
        match self {
            Self::Missing => (self.status(), [(WWW_AUTHENTICATE, "Bearer")], body).into_response(),
            _ => (self.status(), body).into_response(),
        }
    }
}

/// The configured token, fixed for the life of the server.
#[derive(Debug)]
pub struct ApiKeyStore {
    token: Option<String>,
    enabled: bool,
}

impl ApiKeyStore {
    const PREFIX: &'static str = "Bearer ";

    pub fn new(config: &AuthConfig) -> Self {
        let token = config.api_token.clone().filter(|t| !t.is_empty());
        if config.enabled && token.is_none() {
            warn!("authentication enabled without an API token; all protected requests will be rejected");
        }
        Self {
            token,
            enabled: config.enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new(&AuthConfig::disabled())
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.token.as_deref() == Some(key)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Token from a `Bearer <token>` header value.
    pub fn extract_key(header_value: &str) -> Option<&str> {
        header_value
            .strip_prefix(Self::PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Check an `Authorization` header value.
    pub fn verify_header(&self, header: Option<&str>) -> Result<(), AuthFailure> {
        let header = header.ok_or(AuthFailure::Missing)?;
        let token = Self::extract_key(header).ok_or(AuthFailure::InvalidFormat)?;
        self.verify_token(token)
    }

    /// Check a bare token.
    pub fn verify_token(&self, token: &str) -> Result<(), AuthFailure> {
        if self.is_valid(token) {
            Ok(())
        } else {
            Err(AuthFailure::InvalidCredentials)
        }
    }
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new(&AuthConfig::default())
    }
}

/// Authentication middleware for axum.
pub async fn auth_middleware(
    State(store): State<Arc<ApiKeyStore>>,
    request: Request,
    next: Next,
) -> Response {
    if !store.is_enabled() || PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let verdict = match header {
        None if QUERY_TOKEN_PATHS.contains(&request.uri().path()) => {
            match Query::<HashMap<String, String>>::try_from_uri(request.uri())
                .ok()
                .and_then(|Query(params)| params.get("token").cloned())
            {
                Some(token) => store.verify_token(&token),
                None => Err(AuthFailure::Missing),
            }
        }
        header => store.verify_header(header),
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(failure) => {
            debug!(path = %request.uri().path(), ?failure, "request rejected");
            failure.into_response()
        }
    }
}
