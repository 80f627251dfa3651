//! Duplex channel boundary between a terminal session and its remote peer.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::Result;

/// Sending half of a remote channel.
#[async_trait]
pub trait ChannelSender: Send + 'static {
    /// Deliver one chunk to the peer. Returns only once the chunk has been
    /// handed to the transport, or with an error.
    async fn send(&mut self, data: Vec<u8>) -> Result<()>;

    /// Close the channel toward the peer.
    async fn close(&mut self) -> Result<()>;
}

/// Receiving half of a remote channel.
#[async_trait]
pub trait ChannelReceiver: Send + 'static {
    /// Wait for the next chunk from the peer. `Ok(None)` means the peer
    /// closed the channel.
    async fn receive(&mut self) -> Result<Option<Vec<u8>>>;
}

/// An accepted, bidirectional connection to a remote peer.
pub trait DuplexChannel: Send + 'static {
    type Sender: ChannelSender;
    type Receiver: ChannelReceiver;

    /// Split into independently owned halves.
    fn split(self) -> (Self::Sender, Self::Receiver);
}

/// In-process duplex channel, used for embedding and tests.
pub struct MemoryChannel {
    sender: MemorySender,
    receiver: MemoryReceiver,
}

/// The remote side of a [`MemoryChannel`].
///
/// Dropping `tx` is the peer disconnecting.
pub struct MemoryPeer {
    /// Bytes toward the session.
    pub tx: mpsc::Sender<Vec<u8>>,
    /// Bytes from the session; `None` once the session closed its side.
    pub rx: mpsc::Receiver<Vec<u8>>,
}

/// Create a connected channel/peer pair with bounded buffers.
pub fn memory_channel(capacity: usize) -> (MemoryChannel, MemoryPeer) {
    let (to_session, from_peer) = mpsc::channel(capacity.max(1));
    let (to_peer, from_session) = mpsc::channel(capacity.max(1));
    (
        MemoryChannel {
            sender: MemorySender { tx: Some(to_peer) },
            receiver: MemoryReceiver { rx: from_peer },
        },
        MemoryPeer {
            tx: to_session,
            rx: from_session,
        },
    )
}

impl DuplexChannel for MemoryChannel {
    type Sender = MemorySender;
    type Receiver = MemoryReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver) {
        (self.sender, self.receiver)
    }
}

pub struct MemorySender {
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

#[async_trait]
impl ChannelSender for MemorySender {
    async fn send(&mut self, data: Vec<u8>) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(RelayError::ChannelClosed)?;
        tx.send(data).await.map_err(|_| RelayError::ChannelClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

pub struct MemoryReceiver {
    rx: mpsc::Receiver<Vec<u8>>,
}

#[async_trait]
impl ChannelReceiver for MemoryReceiver {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}
