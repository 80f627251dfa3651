//! Async adapters for PTY I/O.
//!
//! PTY reads and writes are blocking calls. These adapters run them on the
//! blocking thread pool so they never stall the tokio workers.

use std::io::{self, Read, Write};

use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// Async reader for PTY output.
///
/// Runs in a blocking thread and sends output chunks through a channel. The
/// read blocks until the kernel has data, so chunks are handed over as soon
/// as they are produced. A read failure is forwarded as the last item.
pub struct AsyncPtyReader<R: Read + Send + 'static> {
    reader: R,
    tx: mpsc::Sender<io::Result<Vec<u8>>>,
    buffer_size: usize,
}

impl<R: Read + Send + 'static> AsyncPtyReader<R> {
    /// Create a new AsyncPtyReader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The PTY reader (blocking).
    /// * `tx` - Channel sender for output data.
    pub fn new(reader: R, tx: mpsc::Sender<io::Result<Vec<u8>>>) -> Self {
        Self {
            reader,
            tx,
            buffer_size: 4096,
        }
    }

    /// Create with custom buffer size.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Start the reader loop in a blocking thread.
    ///
    /// Returns when:
    /// - The PTY is closed (read returns 0 or EIO)
    /// - The channel is closed (receiver dropped)
    /// - A read error occurs (forwarded to the receiver first)
    pub async fn run(self) {
        let buffer_size = self.buffer_size;
        let mut reader = self.reader;
        let tx = self.tx;

        let result = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; buffer_size];

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("PTY reader: EOF");
                        break;
                    }
                    Ok(n) => {
                        trace!("PTY reader: read {} bytes", n);
                        if tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                            debug!("PTY reader: channel closed");
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // EIO on Unix means every slave handle is closed: the shell is gone.
                        #[cfg(unix)]
                        if e.raw_os_error() == Some(libc::EIO) {
                            debug!("PTY reader: PTY closed (EIO)");
                            break;
                        }

                        if e.kind() == io::ErrorKind::BrokenPipe {
                            debug!("PTY reader: broken pipe");
                            break;
                        }

                        error!("PTY reader error: {}", e);
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            }
        })
        .await;

        if let Err(e) = result {
            error!("PTY reader task panicked: {}", e);
        }
    }
}

/// Async writer for PTY input.
///
/// Each write is delegated to the blocking pool; the writer is moved into
/// the worker thread and handed back with the result, so writes are applied
/// strictly in call order.
pub struct AsyncPtyWriter<W: Write + Send + 'static> {
    writer: Option<W>,
}

impl<W: Write + Send + 'static> AsyncPtyWriter<W> {
    /// Create a new AsyncPtyWriter.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    /// Write the whole chunk and flush it.
    ///
    /// After a failed write (or a cancelled one) the writer is gone and every
    /// later call fails with `BrokenPipe`.
    pub async fn write(&mut self, data: Vec<u8>) -> io::Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "PTY writer closed"))?;

        let (writer, result) = tokio::task::spawn_blocking(move || {
            trace!("PTY writer: writing {} bytes", data.len());
            let result = writer.write_all(&data).and_then(|_| writer.flush());
            (writer, result)
        })
        .await
        .map_err(|e| io::Error::other(format!("PTY writer task failed: {e}")))?;

        if result.is_ok() {
            self.writer = Some(writer);
        }
        result
    }

    /// Give the underlying writer back, if it is still usable.
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope"))
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_async_reader_preserves_bytes() {
        let data = b"Hello, World!\nTest line 2\n";
        let (tx, mut rx) = mpsc::channel(32);
        let reader = AsyncPtyReader::new(Cursor::new(data.to_vec()), tx).with_buffer_size(5);

        let handle = tokio::spawn(reader.run());

        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend(chunk.unwrap());
        }
        handle.await.unwrap();

        assert_eq!(received, data);
    }

    #[tokio::test]
    async fn test_async_reader_empty() {
        let (tx, mut rx) = mpsc::channel(32);
        let handle = tokio::spawn(AsyncPtyReader::new(Cursor::new(Vec::new()), tx).run());

        let result = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(result.unwrap().is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_async_reader_forwards_error() {
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(AsyncPtyReader::new(FailingReader, tx).run());

        let item = rx.recv().await.expect("error item");
        assert_eq!(item.unwrap_err().kind(), io::ErrorKind::PermissionDenied);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_channel_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let reader = AsyncPtyReader::new(Cursor::new(vec![7u8; 64]), tx).with_buffer_size(8);
        let handle = tokio::spawn(reader.run());
        let result = tokio::time::timeout(Duration::from_millis(500), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_async_writer_in_order() {
        let mut writer = AsyncPtyWriter::new(Vec::new());
        writer.write(b"ls".to_vec()).await.unwrap();
        writer.write(b"\n".to_vec()).await.unwrap();

        assert_eq!(writer.into_inner().unwrap(), b"ls\n");
    }

    #[tokio::test]
    async fn test_async_writer_failure_is_sticky() {
        let mut writer = AsyncPtyWriter::new(FailingWriter);
        assert!(writer.write(b"x".to_vec()).await.is_err());

        let err = writer.write(b"y".to_vec()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(writer.into_inner().is_none());
    }
}
