//! `complete_logger`: log every event visible to the configured accounts.
//!
//! Reads `.env` and the environment, brings up the log sink, then runs one
//! client per token until they stop or Ctrl-C.

use std::process::ExitCode;

use complete_logger::{bot, config, Config, LogContext};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let log = match config::log_config_from_env().and_then(|c| LogContext::init(&c)) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("failed to initialise logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = bot::run(config, &log).await;
    if let Err(e) = &result {
        error!(error = %e, "client stopped");
    }

    // Flushes the file writer before exit.
    drop(log);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
