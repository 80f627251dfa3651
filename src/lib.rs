//! # shell-relay
//!
//! Remote command execution over HTTP.
//!
//! Two surfaces are provided:
//!
//! - **One-shot execution**: runs a fixed, configured tool once per request
//!   in a fixed working directory and streams its output back as tagged
//!   lines ending in a single exit or error record.
//! - **Interactive terminals**: bridges a remote duplex channel (WebSocket)
//!   to a shell running under a pseudo-terminal until either side closes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_relay::{memory_channel, SessionRegistry, TerminalBridge, TerminalConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     shell_relay::logging::try_init().ok();
//!
//!     let registry = SessionRegistry::new();
//!     let bridge = TerminalBridge::new(TerminalConfig::default(), registry);
//!
//!     let (channel, mut peer) = memory_channel(16);
//!     let session = tokio::spawn(async move { bridge.run(channel).await });
//!
//!     peer.tx.send(b"echo hello; exit\n".to_vec()).await.ok();
//!     while let Some(chunk) = peer.rx.recv().await {
//!         print!("{}", String::from_utf8_lossy(&chunk));
//!     }
//!     if let Ok(report) = session.await {
//!         println!("shell exited with {:?}", report.exit_code);
//!     }
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod pty;
pub mod security;
pub mod session;
pub mod sink;
pub mod terminal;

pub use error::{RelayError, Result};
pub use execution::{CommandExecutor, ExecutionConfig, ExecutionLine, Invocation, OutputOrdering};
pub use pty::{NativePty, PtyProcess, PtySize};
pub use session::{BridgeState, SessionId, SessionRegistry};
pub use sink::{FileLineSink, LineSink};
pub use terminal::{
    memory_channel, DuplexChannel, PumpOutcome, SessionReport, TerminalBridge, TerminalConfig,
};
