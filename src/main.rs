//! shell-relay binary entry point.

use std::process::ExitCode;

use shell_relay::{api, cli, config::Config, logging, SessionRegistry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_with_level(config.log_filter()) {
        eprintln!("warning: logging already initialized: {e}");
    }

    info!("shell-relay v{}", env!("CARGO_PKG_VERSION"));
    info!(
        program = %config.execution.program,
        workdir = %config.execution.working_dir.display(),
        auth = config.security.enabled,
        "configuration loaded"
    );

    let server = match config.to_server_config() {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = SessionRegistry::new();
    let state = config.app_state(registry);

    match api::serve(server, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
