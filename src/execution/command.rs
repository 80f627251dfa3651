//! Invocation and command-line construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::Result;

/// How the two output streams of a one-shot process are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrdering {
    /// All stdout lines first, then all stderr lines.
    #[default]
    Sequential,
    /// Lines from both streams in arrival order.
    Interleaved,
}

/// Fixed, operator-controlled part of every one-shot invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Program to run.
    pub program: String,
    /// Flag placed before the instruction, if any.
    pub instruction_flag: Option<String>,
    /// Argument string used when the request carries none.
    pub default_args: Option<String>,
    /// Directory every invocation runs in.
    pub working_dir: PathBuf,
    /// Stream emission order.
    pub ordering: OutputOrdering,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            instruction_flag: Some("--prompt".to_string()),
            default_args: Some("--yes".to_string()),
            working_dir: PathBuf::from("/app/user_repo"),
            ordering: OutputOrdering::Sequential,
        }
    }
}

/// A single request to run the configured tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Free-form instruction, passed as one opaque argument.
    pub instruction: String,
    /// Extra arguments; `None` selects the configured default.
    pub args: Option<String>,
}

impl Invocation {
    /// Create an invocation with the configured default arguments.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            args: None,
        }
    }

    /// Set the argument string.
    pub fn args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }
}

/// Fully resolved program and argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Resolve an invocation against the fixed configuration.
    ///
    /// The instruction is never parsed. The argument string is split into
    /// words with shell quoting rules but is never handed to a shell.
    pub fn build(config: &ExecutionConfig, invocation: &Invocation) -> Result<Self> {
        let mut args = Vec::new();
        if let Some(flag) = config.instruction_flag.as_deref().filter(|f| !f.is_empty()) {
            args.push(flag.to_string());
        }
        args.push(invocation.instruction.clone());

        let extra = invocation
            .args
            .as_deref()
            .or(config.default_args.as_deref())
            .unwrap_or("");
        let words = shlex::split(extra)
            .ok_or_else(|| RelayError::InvalidArguments(format!("unbalanced quoting in {extra:?}")))?;
        args.extend(words);

        Ok(Self {
            program: config.program.clone(),
            args,
        })
    }

    /// Build the process command, pinned to `working_dir`.
    ///
    /// Both output streams are piped, stdin is closed, and the child is
    /// killed if the handle is dropped before it exits.
    pub fn to_command(&self, working_dir: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(words) {
            Ok(joined) => f.write_str(&joined),
            Err(_) => write!(f, "{} {:?}", self.program, self.args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExecutionConfig {
        ExecutionConfig {
            working_dir: PathBuf::from("/tmp"),
            ..ExecutionConfig::default()
        }
    }

    #[test]
    fn test_default_args_used_when_absent() {
        let line = CommandLine::build(&config(), &Invocation::new("list files")).unwrap();
        assert_eq!(line.program, "claude");
        assert_eq!(line.args, vec!["--prompt", "list files", "--yes"]);
    }

    #[test]
    fn test_instruction_stays_one_argument() {
        let invocation = Invocation::new("a; rm -rf / && echo \"x\"").args("");
        let line = CommandLine::build(&config(), &invocation).unwrap();
        assert_eq!(line.args, vec!["--prompt", "a; rm -rf / && echo \"x\""]);
    }

    #[test]
    fn test_args_split_into_words() {
        let invocation = Invocation::new("fix").args("--yes --model 'big one'");
        let line = CommandLine::build(&config(), &invocation).unwrap();
        assert_eq!(line.args, vec!["--prompt", "fix", "--yes", "--model", "big one"]);
    }

    #[test]
    fn test_unbalanced_args_rejected() {
        let invocation = Invocation::new("fix").args("--model 'oops");
        let result = CommandLine::build(&config(), &invocation);
        assert!(matches!(result, Err(RelayError::InvalidArguments(_))));
    }

    #[test]
    fn test_without_instruction_flag() {
        let config = ExecutionConfig {
            program: "sh".into(),
            instruction_flag: None,
            default_args: None,
            ..config()
        };
        let line = CommandLine::build(&config, &Invocation::new("echo hi")).unwrap();
        assert_eq!(line.args, vec!["echo hi"]);
    }

    #[test]
    fn test_display_quotes_words() {
        let line = CommandLine::build(&config(), &Invocation::new("list files")).unwrap();
        let rendered = line.to_string();
        assert!(rendered.starts_with("claude --prompt "));
        assert_eq!(
            shlex::split(&rendered).unwrap(),
            vec!["claude", "--prompt", "list files", "--yes"]
        );
    }

    #[test]
    fn test_ordering_serde() {
        let ordering: OutputOrdering = serde_json::from_str("\"interleaved\"").unwrap();
        assert_eq!(ordering, OutputOrdering::Interleaved);
        assert_eq!(OutputOrdering::default(), OutputOrdering::Sequential);
    }
}
