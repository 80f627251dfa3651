//! Interactive session bridge: one PTY shell relayed over one duplex channel.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::channel::{ChannelReceiver, ChannelSender, DuplexChannel};
use crate::pty::{default_shell, AsyncPtyReader, AsyncPtyWriter, NativePty, PtyProcess, PtySize, ShellSpec};
use crate::session::{BridgeState, SessionId, SessionRegistry};

/// Settings for interactive terminal sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell program; the platform default when unset.
    pub shell: Option<String>,
    /// Extra shell arguments.
    pub shell_args: Vec<String>,
    /// Shell working directory; inherited when unset.
    pub working_dir: Option<PathBuf>,
    pub rows: u16,
    pub cols: u16,
    /// Bytes per PTY read.
    pub read_buffer_size: usize,
    /// PTY output chunks buffered ahead of the remote channel.
    pub output_buffer: usize,
    /// Upper bound on waiting for the shell to exit during teardown.
    pub teardown_timeout_secs: u64,
    /// Send PTY output as binary WebSocket frames instead of text.
    pub binary_frames: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: None,
            shell_args: Vec::new(),
            working_dir: None,
            rows: 24,
            cols: 80,
            read_buffer_size: 4096,
            output_buffer: 64,
            teardown_timeout_secs: 5,
            binary_frames: false,
        }
    }
}

impl TerminalConfig {
    /// Spawn options derived from this configuration.
    pub fn shell_spec(&self) -> ShellSpec {
        ShellSpec {
            program: self.shell.clone().unwrap_or_else(default_shell),
            args: self.shell_args.clone(),
            working_dir: self.working_dir.clone(),
            size: PtySize::new(self.rows, self.cols),
        }
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }
}

/// How a pump finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PumpOutcome {
    /// Its source reached end-of-stream.
    Closed,
    /// It stopped on a failure.
    Error(String),
    /// The coordinator cancelled it because the other pump finished.
    Cancelled,
}

/// The two directions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pump {
    /// PTY output toward the remote peer.
    Outbound,
    /// Remote input toward the PTY.
    Inbound,
}

/// Summary of one finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub pid: Option<u32>,
    /// Pump whose completion ended the session; `None` if the shell never started.
    pub ended_by: Option<Pump>,
    pub outbound: Option<PumpOutcome>,
    pub inbound: Option<PumpOutcome>,
    /// Exit code collected during teardown, if the shell was reaped in time.
    pub exit_code: Option<u32>,
    /// Whether the PTY reader saw end-of-file before the session returned.
    pub reader_finished: bool,
    pub spawn_error: Option<String>,
    pub final_state: BridgeState,
}

/// Forward PTY output chunks to the remote peer, in order.
///
/// Each send is awaited before the next chunk is taken, so a chunk is
/// either delivered or the pump ends with an error.
pub async fn outbound_pump<S: ChannelSender>(
    mut output: mpsc::Receiver<io::Result<Vec<u8>>>,
    sender: Arc<Mutex<S>>,
) -> PumpOutcome {
    while let Some(chunk) = output.recv().await {
        let data = match chunk {
            Ok(data) => data,
            Err(e) => return PumpOutcome::Error(format!("PTY read failed: {e}")),
        };
        if let Err(e) = sender.lock().await.send(data).await {
            debug!("outbound pump: send failed: {}", e);
            return PumpOutcome::Error(e.to_string());
        }
    }
    debug!("outbound pump: PTY output ended");
    PumpOutcome::Closed
}

/// Write every chunk received from the remote peer to the PTY, in order.
///
/// `cancel` is only checked between chunks: a write already handed to the
/// PTY completes before the pump returns `Cancelled`. Dropping the sender
/// cancels too.
pub async fn inbound_pump<R, W>(
    mut receiver: R,
    mut writer: AsyncPtyWriter<W>,
    mut cancel: oneshot::Receiver<()>,
) -> PumpOutcome
where
    R: ChannelReceiver,
    W: Write + Send + 'static,
{
    loop {
        let received = tokio::select! {
            biased;
            _ = &mut cancel => {
                debug!("inbound pump: cancelled");
                return PumpOutcome::Cancelled;
            }
            received = receiver.receive() => received,
        };
        match received {
            Ok(Some(data)) if data.is_empty() => continue,
            Ok(Some(data)) => {
                if let Err(e) = writer.write(data).await {
                    return PumpOutcome::Error(format!("PTY write failed: {e}"));
                }
            }
            Ok(None) => {
                debug!("inbound pump: remote closed");
                return PumpOutcome::Closed;
            }
            Err(e) => {
                debug!("inbound pump: receive failed: {}", e);
                return PumpOutcome::Error(e.to_string());
            }
        }
    }
}

fn joined(result: Result<PumpOutcome, JoinError>) -> PumpOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => PumpOutcome::Cancelled,
        Err(e) => {
            error!("pump task panicked: {}", e);
            PumpOutcome::Error(format!("pump panicked: {e}"))
        }
    }
}

/// Runs interactive sessions. Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct TerminalBridge {
    config: Arc<TerminalConfig>,
    registry: SessionRegistry,
}

impl TerminalBridge {
    pub fn new(config: TerminalConfig, registry: SessionRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn advance(&self, id: &SessionId, state: &mut BridgeState, next: BridgeState) {
        if let Err(e) = state.transition_to(next) {
            warn!(session = %id, "{}", e);
            return;
        }
        debug!(session = %id, state = ?next, "session state changed");
        self.registry.set_state(id, next);
    }

    /// Bridge `channel` to a fresh shell until either side closes.
    ///
    /// Whichever pump finishes first ends the session: the other pump is
    /// stopped and awaited, then the shell and its jobs are killed and the
    /// shell reaped, and finally the channel is closed. The registry entry is
    /// removed before returning.
    ///
    /// The inbound pump is stopped through its cancel signal so an in-flight
    /// PTY write finishes first; it is only aborted if that takes longer than
    /// the teardown timeout.
    pub async fn run<C: DuplexChannel>(&self, channel: C) -> SessionReport {
        let id = self.registry.register();
        let mut state = BridgeState::Idle;
        let (sender, receiver) = channel.split();
        let sender = Arc::new(Mutex::new(sender));

        self.advance(&id, &mut state, BridgeState::Spawning);
        let spawned = NativePty::new()
            .spawn(&self.config.shell_spec())
            .and_then(|mut process| {
                let reader = process.take_reader()?;
                let writer = process.take_writer()?;
                Ok((process, reader, writer))
            });

        let (process, reader, writer) = match spawned {
            Ok(parts) => parts,
            Err(e) => {
                error!(session = %id, "failed to start shell: {}", e);
                self.advance(&id, &mut state, BridgeState::Terminated);
                let mut sender = sender.lock().await;
                let diagnostic = format!("[ERROR] Failed to start shell: {e}\r\n");
                if let Err(send_err) = sender.send(diagnostic.into_bytes()).await {
                    debug!(session = %id, "could not report spawn failure: {}", send_err);
                }
                let _ = sender.close().await;
                let _ = self.registry.remove(&id);
                return SessionReport {
                    session_id: id,
                    pid: None,
                    ended_by: None,
                    outbound: None,
                    inbound: None,
                    exit_code: None,
                    reader_finished: false,
                    spawn_error: Some(e.to_string()),
                    final_state: state,
                };
            }
        };

        let pid = process.pid();
        let _ = self.registry.update(&id, |r| r.pid = Some(pid));
        info!(session = %id, pid, "terminal session started");
        self.advance(&id, &mut state, BridgeState::Active);

        let (output_tx, output_rx) = mpsc::channel(self.config.output_buffer.max(1));
        let reader_task = tokio::spawn(
            AsyncPtyReader::new(reader, output_tx)
                .with_buffer_size(self.config.read_buffer_size)
                .run(),
        );
        let mut outbound = tokio::spawn(outbound_pump(output_rx, Arc::clone(&sender)));
        let (cancel_inbound, cancel_rx) = oneshot::channel();
        let mut inbound = tokio::spawn(inbound_pump(
            receiver,
            AsyncPtyWriter::new(writer),
            cancel_rx,
        ));

        let (ended_by, first) = tokio::select! {
            result = &mut outbound => (Pump::Outbound, joined(result)),
            result = &mut inbound => (Pump::Inbound, joined(result)),
        };
        self.advance(&id, &mut state, BridgeState::Draining);
        debug!(session = %id, ?ended_by, ?first, "pump finished, cancelling the other");

        let (outbound_outcome, inbound_outcome) = match ended_by {
            Pump::Outbound => {
                let _ = cancel_inbound.send(());
                let stopped =
                    tokio::time::timeout(self.config.teardown_timeout(), &mut inbound).await;
                let inbound_outcome = match stopped {
                    Ok(result) => joined(result),
                    Err(_) => {
                        warn!(session = %id, "inbound pump did not stop in time, aborting");
                        inbound.abort();
                        joined(inbound.await)
                    }
                };
                (first, inbound_outcome)
            }
            Pump::Inbound => {
                outbound.abort();
                (joined(outbound.await), first)
            }
        };

        let status = self.teardown(&id, process).await;

        // The reader thread ends once the PTY reports EOF, which follows the
        // session kill. Anything outside the session can still hold the slave.
        let reader_finished = tokio::time::timeout(Duration::from_secs(1), reader_task)
            .await
            .is_ok();
        if !reader_finished {
            warn!(session = %id, "PTY reader still blocked after teardown, detaching");
        }

        if let Err(e) = sender.lock().await.close().await {
            debug!(session = %id, "closing remote channel failed: {}", e);
        }

        self.advance(&id, &mut state, BridgeState::Terminated);
        let _ = self.registry.remove(&id);
        info!(
            session = %id,
            pid,
            ?ended_by,
            outbound = ?outbound_outcome,
            inbound = ?inbound_outcome,
            "terminal session ended"
        );

        SessionReport {
            session_id: id,
            pid: Some(pid),
            ended_by: Some(ended_by),
            outbound: Some(outbound_outcome),
            inbound: Some(inbound_outcome),
            exit_code: status.map(|s| s.exit_code()),
            reader_finished,
            spawn_error: None,
            final_state: state,
        }
    }

    async fn teardown(&self, id: &SessionId, process: PtyProcess) -> Option<portable_pty::ExitStatus> {
        let status = process.terminate(self.config.teardown_timeout()).await;
        if status.is_none() {
            warn!(session = %id, "shell exit could not be confirmed");
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::terminal::channel::memory_channel;
    use async_trait::async_trait;
    use std::io::Cursor;

    struct FailingSender;

    #[async_trait]
    impl ChannelSender for FailingSender {
        async fn send(&mut self, _data: Vec<u8>) -> crate::Result<()> {
            Err(RelayError::Channel("socket reset".into()))
        }

        async fn close(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    struct ErrReceiver;

    #[async_trait]
    impl ChannelReceiver for ErrReceiver {
        async fn receive(&mut self) -> crate::Result<Option<Vec<u8>>> {
            Err(RelayError::Channel("protocol violation".into()))
        }
    }

    #[test]
    fn test_terminal_config_defaults() {
        let config = TerminalConfig::default();
        assert_eq!((config.rows, config.cols), (24, 80));
        assert_eq!(config.teardown_timeout(), Duration::from_secs(5));
        assert!(!config.shell_spec().program.is_empty());
    }

    #[tokio::test]
    async fn test_outbound_pump_preserves_order() {
        let (channel, mut peer) = memory_channel(16);
        let (sender, _receiver) = channel.split();
        let (tx, rx) = mpsc::channel(16);

        for chunk in [&b"one "[..], b"two ", b"three"] {
            tx.send(Ok(chunk.to_vec())).await.unwrap();
        }
        drop(tx);

        let outcome = outbound_pump(rx, Arc::new(Mutex::new(sender))).await;
        assert_eq!(outcome, PumpOutcome::Closed);

        let mut received = Vec::new();
        while let Ok(chunk) = peer.rx.try_recv() {
            received.extend(chunk);
        }
        assert_eq!(received, b"one two three");
    }

    #[tokio::test]
    async fn test_outbound_pump_send_failure() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(b"x".to_vec())).await.unwrap();

        let outcome = outbound_pump(rx, Arc::new(Mutex::new(FailingSender))).await;
        assert!(matches!(outcome, PumpOutcome::Error(reason) if reason.contains("socket reset")));
    }

    #[tokio::test]
    async fn test_outbound_pump_read_failure() {
        let (channel, _peer) = memory_channel(4);
        let (sender, _receiver) = channel.split();
        let (tx, rx) = mpsc::channel(4);
        tx.send(Err(io::Error::other("bad fd"))).await.unwrap();

        let outcome = outbound_pump(rx, Arc::new(Mutex::new(sender))).await;
        assert!(matches!(outcome, PumpOutcome::Error(reason) if reason.contains("bad fd")));
    }

    #[tokio::test]
    async fn test_inbound_pump_writes_exact_bytes() {
        let (channel, peer) = memory_channel(4);
        let (_sender, receiver) = channel.split();

        peer.tx.send(b"ls".to_vec()).await.unwrap();
        peer.tx.send(Vec::new()).await.unwrap();
        peer.tx.send(b"\n".to_vec()).await.unwrap();
        drop(peer);

        let shared = SharedBuf::default();
        let (_cancel, cancel_rx) = oneshot::channel();
        let outcome = inbound_pump(receiver, AsyncPtyWriter::new(shared.clone()), cancel_rx).await;

        assert_eq!(outcome, PumpOutcome::Closed);
        assert_eq!(shared.contents(), b"ls\n");
    }

    #[tokio::test]
    async fn test_inbound_pump_receive_error() {
        let (_cancel, cancel_rx) = oneshot::channel();
        let outcome = inbound_pump(
            ErrReceiver,
            AsyncPtyWriter::new(Cursor::new(Vec::new())),
            cancel_rx,
        )
        .await;
        assert!(matches!(outcome, PumpOutcome::Error(reason) if reason.contains("protocol violation")));
    }

    #[tokio::test]
    async fn test_inbound_pump_cancel_finishes_pending_write() {
        let (channel, peer) = memory_channel(4);
        let (_sender, receiver) = channel.split();
        peer.tx.send(b"make build\n".to_vec()).await.unwrap();

        let shared = SharedBuf::default();
        let (started_tx, started_rx) = oneshot::channel();
        let writer = SlowWriter {
            buf: shared.clone(),
            started: Some(started_tx),
            delay: Duration::from_millis(200),
        };
        let (cancel, cancel_rx) = oneshot::channel();
        let pump = tokio::spawn(inbound_pump(receiver, AsyncPtyWriter::new(writer), cancel_rx));

        // Cancel while the write is blocked inside the PTY.
        started_rx.await.unwrap();
        cancel.send(()).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pump)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, PumpOutcome::Cancelled);
        assert_eq!(shared.contents(), b"make build\n");
        drop(peer);
    }

    #[tokio::test]
    async fn test_inbound_pump_cancel_while_idle() {
        let (channel, _peer) = memory_channel(4);
        let (_sender, receiver) = channel.split();
        let (cancel, cancel_rx) = oneshot::channel();
        cancel.send(()).unwrap();

        let outcome = inbound_pump(receiver, AsyncPtyWriter::new(SharedBuf::default()), cancel_rx).await;
        assert_eq!(outcome, PumpOutcome::Cancelled);
    }

    #[test]
    fn test_joined_maps_panics() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let handle = tokio::spawn(async { panic!("boom") });
            let outcome = joined(handle.await.map(|_: ()| PumpOutcome::Closed));
            assert!(matches!(outcome, PumpOutcome::Error(_)));

            let handle = tokio::spawn(std::future::pending::<PumpOutcome>());
            handle.abort();
            assert_eq!(joined(handle.await), PumpOutcome::Cancelled);
        });
    }

    #[test]
    fn test_pump_outcome_serialization() {
        let json = serde_json::to_value(PumpOutcome::Error("x".into())).unwrap();
        assert_eq!(json["outcome"], "error");
        assert_eq!(json["reason"], "x");

        let json = serde_json::to_value(PumpOutcome::Closed).unwrap();
        assert_eq!(json["outcome"], "closed");
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Blocks each write for `delay`, like a PTY whose input queue is full.
    struct SlowWriter {
        buf: SharedBuf,
        started: Option<oneshot::Sender<()>>,
        delay: Duration,
    }

    impl Write for SlowWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(started) = self.started.take() {
                let _ = started.send(());
            }
            std::thread::sleep(self.delay);
            self.buf.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
