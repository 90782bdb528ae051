//! CLI entry point.
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli.rs (argument parsing, config, output)
//!     ↓
//! contract / ownership / pools / detect (core operations)
//!     ↓
//! scanner + retry → rpc (JSON-RPC boundary)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use chain_lens::{cli, observability};
use tracing::error;

/// Logging is controlled by the environment:
/// - `RUST_LOG`: filter directive (e.g. `debug`, `chain_lens=trace`)
/// - `LOG_JSON`: JSON console output (`true`/`false`)
/// - `LOG_FILE`: also write JSON logs to a daily-rotated file
#[tokio::main]
async fn main() -> ExitCode {
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // Dropping the guard flushes the file writer, so it lives until exit
    let _guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
