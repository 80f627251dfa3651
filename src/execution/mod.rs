//! One-shot command execution.
//!
//! Runs a fixed, operator-configured program once per request and streams
//! its output back as tagged lines:
//! - `[STDOUT]` lines, then `[STDERR]` lines (or both in arrival order when
//!   [`OutputOrdering::Interleaved`] is configured)
//! - exactly one `[PROCESS_EXIT]` record carrying the exit code
//! - or a single `[ERROR]` record when the process cannot be started or its
//!   output cannot be read
//!
//! Output is decoded as lossy UTF-8. Each line loses its terminator and any
//! trailing whitespace, but leading whitespace is kept so indented output
//! (diffs, code, tables) arrives intact.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use shell_relay::execution::{CommandExecutor, ExecutionConfig, Invocation};
//!
//! # async fn demo() {
//! let executor = CommandExecutor::new(ExecutionConfig::default());
//! let mut lines = Box::pin(executor.execute(&Invocation::new("list files")));
//! while let Some(line) = lines.next().await {
//!     println!("{line}");
//! }
//! # }
//! ```

mod command;
mod executor;
mod result;

pub use command::{CommandLine, ExecutionConfig, Invocation, OutputOrdering};
pub use executor::CommandExecutor;
pub use result::ExecutionLine;
