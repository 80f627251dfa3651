//! Command-line interface for shell-relay.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Command-line arguments. Unset options leave lower-priority sources alone.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Bearer token required on protected routes.
    pub api_token: Option<String>,
    /// Working directory for one-shot executions.
    pub workdir: Option<PathBuf>,
    /// Disable authentication.
    pub no_auth: bool,
    /// Log level or filter directives.
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator whose first item is the program name.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("api-token") => {
                result.api_token = Some(parser.value()?.parse()?);
            }
            Short('w') | Long("workdir") => {
                result.workdir = Some(parser.value()?.parse()?);
            }
            Long("no-auth") => {
                result.no_auth = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-relay {version}
Remote command execution and interactive terminals over HTTP

USAGE:
    shell-relay [OPTIONS]

OPTIONS:
    -H, --host <ADDR>        Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>        Port to listen on [default: 3000]
    -c, --config <FILE>      Path to configuration file (JSON)
    -k, --api-token <TOKEN>  Bearer token required by protected routes
    -w, --workdir <DIR>      Working directory for /execute [default: /app/user_repo]
    -l, --log-level <LVL>    Log level (error, warn, info, debug, trace)
        --no-auth            Disable authentication
    -h, --help               Print help
    -V, --version            Print version

ENVIRONMENT VARIABLES:
    SHELL_RELAY_HOST         Host address (overrides config)
    SHELL_RELAY_PORT         Port number (overrides config)
    SHELL_RELAY_API_TOKEN    Bearer token (overrides config)
    SHELL_RELAY_WORKDIR      Execution working directory (overrides config)
    SHELL_RELAY_LOG_LEVEL    Log level (overrides config)
    RUST_LOG                 Alternative log level setting

EXAMPLES:
    # Serve a checked-out repository on all interfaces
    shell-relay -H 0.0.0.0 -k my-secret-token -w /srv/repo

    # Start with config file
    shell-relay -c /etc/shell-relay/config.json

    # Local development without authentication
    shell-relay --no-auth
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-relay {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("{0}")]
    Lexopt(#[from] lexopt::Error),

    #[error("invalid value for --{0}: '{1}'")]
    InvalidValue(&'static str, String),

    #[error("unexpected argument: '{0}'")]
    UnexpectedArgument(String),
}
