//! Interactive terminal sessions.
//!
//! A [`TerminalBridge`] spawns one shell under a PTY per accepted remote
//! channel and runs two pumps until either side closes:
//! - outbound: PTY output to the peer, chunks in order
//! - inbound: peer input to the PTY, bytes written unmodified
//!
//! When one pump finishes the other is cancelled and awaited before the
//! shell is killed and reaped.

mod bridge;
mod channel;

pub use bridge::{
    inbound_pump, outbound_pump, Pump, PumpOutcome, SessionReport, TerminalBridge, TerminalConfig,
};
pub use channel::{
    memory_channel, ChannelReceiver, ChannelSender, DuplexChannel, MemoryChannel, MemoryPeer,
    MemoryReceiver, MemorySender,
};
