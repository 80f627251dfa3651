//! One-shot command execution engine.

use std::io;
use std::process::ExitStatus;

use futures_util::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error, info};

use super::command::{CommandLine, ExecutionConfig, Invocation, OutputOrdering};
use super::result::ExecutionLine;
use crate::error::RelayError;

/// Line-oriented reader over a child output pipe.
///
/// Partial lines survive a cancelled `next_line`, so it can be raced in
/// `select!`.
struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.inner.read_until(b'\n', &mut self.buf).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }
        // Only the right edge: indentation is part of the line.
        let line = String::from_utf8_lossy(&self.buf).trim_end().to_string();
        self.buf.clear();
        Ok(Some(line))
    }

    async fn collect(mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }
}

/// Exit code as data. A child ended by a signal reports the negated signal
/// number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

enum Next {
    Stdout(io::Result<Option<String>>),
    Stderr(io::Result<Option<String>>),
}

/// Runs the configured tool once per invocation and streams its output.
///
/// The executor holds only immutable configuration; every call to
/// [`execute`](Self::execute) spawns an independent process.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    config: ExecutionConfig,
}

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Fixed configuration used for every invocation.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute an invocation, yielding tagged lines as they become available.
    ///
    /// The stream is lazy: nothing is spawned until it is first polled. It
    /// owns the child process, and dropping it early kills the child.
    /// Failures are reported in-band as a final [`ExecutionLine::Error`].
    pub fn execute(
        &self,
        invocation: &Invocation,
    ) -> impl Stream<Item = ExecutionLine> + Send + 'static {
        let config = self.config.clone();
        let invocation = invocation.clone();

        async_stream::stream! {
            let working_dir = config.working_dir.clone();
            let dir_exists = tokio::fs::metadata(&working_dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !dir_exists {
                let message = format!(
                    "The target repository path does not exist: {}",
                    working_dir.display()
                );
                error!("{}", message);
                yield ExecutionLine::Error(message);
                return;
            }

            let spawned = CommandLine::build(&config, &invocation).and_then(|line| {
                info!(dir = %working_dir.display(), "executing: {}", line);
                line.to_command(&working_dir)
                    .spawn()
                    .map_err(|e| RelayError::Spawn(format!("{}: {}", line.program, e)))
            });
            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    error!("failed to start command: {}", e);
                    yield ExecutionLine::Error(format!("An unexpected error occurred: {e}"));
                    return;
                }
            };
            debug!(pid = ?child.id(), "command spawned");

            let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
                yield ExecutionLine::Error("An unexpected error occurred: output pipes unavailable".into());
                return;
            };

            let mut stdout = LineReader::new(stdout);
            match config.ordering {
                OutputOrdering::Sequential => {
                    // Collected in the background so a chatty stderr cannot
                    // fill its pipe and stall the child while stdout drains.
                    let stderr_task = tokio::spawn(LineReader::new(stderr).collect());

                    loop {
                        match stdout.next_line().await {
                            Ok(Some(line)) => yield ExecutionLine::Stdout(line),
                            Ok(None) => break,
                            Err(e) => {
                                error!("failed reading stdout: {}", e);
                                stderr_task.abort();
                                yield ExecutionLine::Error(format!("An unexpected error occurred: {e}"));
                                return;
                            }
                        }
                    }

                    let stderr_lines = match stderr_task.await {
                        Ok(Ok(lines)) => lines,
                        Ok(Err(e)) => {
                            error!("failed reading stderr: {}", e);
                            yield ExecutionLine::Error(format!("An unexpected error occurred: {e}"));
                            return;
                        }
                        Err(e) => {
                            error!("stderr reader task failed: {}", e);
                            yield ExecutionLine::Error(format!("An unexpected error occurred: {e}"));
                            return;
                        }
                    };
                    for line in stderr_lines {
                        yield ExecutionLine::Stderr(line);
                    }
                }
                OutputOrdering::Interleaved => {
                    let mut stderr = LineReader::new(stderr);
                    let (mut stdout_done, mut stderr_done) = (false, false);

                    while !(stdout_done && stderr_done) {
                        let next = tokio::select! {
                            line = stdout.next_line(), if !stdout_done => Next::Stdout(line),
                            line = stderr.next_line(), if !stderr_done => Next::Stderr(line),
                        };
                        match next {
                            Next::Stdout(Ok(Some(line))) => yield ExecutionLine::Stdout(line),
                            Next::Stderr(Ok(Some(line))) => yield ExecutionLine::Stderr(line),
                            Next::Stdout(Ok(None)) => stdout_done = true,
                            Next::Stderr(Ok(None)) => stderr_done = true,
                            Next::Stdout(Err(e)) | Next::Stderr(Err(e)) => {
                                error!("failed reading command output: {}", e);
                                yield ExecutionLine::Error(format!("An unexpected error occurred: {e}"));
                                return;
                            }
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) => {
                    let code = exit_code(status);
                    info!("Command finished with exit code: {}", code);
                    yield ExecutionLine::Exit(code);
                }
                Err(e) => {
                    error!("failed waiting for command: {}", e);
                    yield ExecutionLine::Error(format!("An unexpected error occurred: {e}"));
                }
            }
        }
    }
}
