//! Execution output types.

use std::fmt;

/// One record of a one-shot execution's output sequence.
///
/// A sequence is zero or more `Stdout`/`Stderr` lines followed by exactly
/// one `Exit`, or it ends with a single `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionLine {
    /// A line written to standard output.
    Stdout(String),
    /// A line written to standard error.
    Stderr(String),
    /// The process finished with this exit code.
    Exit(i32),
    /// Spawning or streaming failed; nothing follows.
    Error(String),
}

impl ExecutionLine {
    /// Tag used when the line is rendered.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "STDOUT",
            Self::Stderr(_) => "STDERR",
            Self::Exit(_) => "PROCESS_EXIT",
            Self::Error(_) => "ERROR",
        }
    }

    /// Whether this record ends the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exit(_) | Self::Error(_))
    }

    /// Exit code, for the terminal status record.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout(line) | Self::Stderr(line) | Self::Error(line) => {
                write!(f, "[{}] {}", self.tag(), line)
            }
            Self::Exit(code) => write!(
                f,
                "[{}] Command finished with exit code: {}",
                self.tag(),
                code
            ),
        }
    }
}
