//! Terminal session bookkeeping.
//!
//! This module provides session identification, the bridge lifecycle state
//! machine, and the registry the hosting process uses to track live
//! interactive sessions.

mod id;
mod registry;
mod state;

pub use id::SessionId;
pub use registry::{SessionRecord, SessionRegistry, SessionSnapshot};
pub use state::BridgeState;
