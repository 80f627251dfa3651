//! HTTP API for shell-relay.
//!
//! ## Endpoints
//!
//! - `GET /status` - Liveness and version (never authenticated)
//! - `POST /execute` - Run the configured tool once, streaming tagged lines
//! - `GET /logs` - Execution log contents
//! - `GET /sessions` - Live terminal sessions
//! - `WS /terminal` - Interactive shell over a WebSocket
//!
//! ## Example
//!
//! ```no_run
//! use shell_relay::api::{serve, AppState, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     serve(ServerConfig::new("127.0.0.1", 3000), AppState::default()).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

pub use handlers::AppState;
pub use router::{create_router, create_router_with_state, serve, ServerConfig};
pub use types::{ErrorResponse, ExecuteRequest, ListSessionsResponse, MessageResponse, StatusResponse};
pub use websocket::WsChannel;
