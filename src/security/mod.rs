//! Request authentication for the HTTP API.
//!
//! Every route except `/status` requires `Authorization: Bearer <token>`
//! when authentication is enabled. The terminal route also accepts the token
//! as a `token` query parameter.
//!
//! ## Example
//!
//! ```rust
//! use shell_relay::security::{ApiKeyStore, AuthConfig, AuthFailure};
//!
//! let store = ApiKeyStore::new(&AuthConfig::with_token("my-secret-key"));
//! assert!(store.verify_header(Some("Bearer my-secret-key")).is_ok());
//! assert_eq!(store.verify_header(None), Err(AuthFailure::Missing));
//! ```

pub mod auth;

pub use auth::{auth_middleware, ApiKeyStore, AuthConfig, AuthFailure};
