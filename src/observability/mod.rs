//! Structured logging setup.
//!
//! # Usage
//!
//! Initialize tracing once at startup and keep the returned guard alive for
//! as long as logs should reach the file:
//!
//! ```no_run
//! use chain_lens::observability;
//!
//! # fn main() -> chain_lens::error::LensResult<()> {
//! let _guard = observability::init_tracing(None, None, false)?;
//! // Run application...
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Configuration
//!
//! ```bash
//! # Set log level for all modules
//! RUST_LOG=debug chain-lens ownership
//!
//! # Component-specific levels
//! RUST_LOG=chain_lens::scanner=trace,warn chain-lens events
//!
//! # JSON console output
//! LOG_JSON=true chain-lens pools
//!
//! # Also write JSON logs to a daily-rotated file
//! LOG_FILE=./logs/chain-lens.log chain-lens ownership
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{LensError, LensResult};

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "chain_lens=info,warn";

/// Initialize the global tracing subscriber.
///
/// * `log_level` - filter directive used when `RUST_LOG` is unset.
/// * `log_file` - enables an additional JSON file layer with daily rotation.
/// * `json_output` - JSON console output instead of the pretty format.
///
/// Console output goes to stderr so that `--json` command output on stdout
/// stays machine-readable.
///
/// Returns the file writer's guard when `log_file` is set. Buffered lines
/// are flushed when it is dropped, so hold it until the program exits.
///
/// # Errors
///
/// Returns a configuration error if the filter is invalid, the log
/// directory can't be created, or a global subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> LensResult<Option<WorkerGuard>> {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .or(log_level)
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());
    let env_filter = EnvFilter::try_new(&directive).map_err(|e| {
        LensError::config(format!("invalid log filter '{directive}'"), Some(Box::new(e)))
    })?;

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let (file_sink, guard) = match log_file.as_deref() {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // Files always get JSON for later analysis
    let file_layer = file_sink.map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LensError::config("tracing already initialized", Some(Box::new(e))))?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}

fn file_writer(path: &Path) -> LensResult<(NonBlocking, WorkerGuard)> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory).map_err(|e| {
        LensError::config(
            format!("cannot create log directory {}", directory.display()),
            Some(Box::new(e)),
        )
    })?;

    let appender = tracing_appender::rolling::daily(
        directory,
        path.file_name().unwrap_or_else(|| OsStr::new("chain-lens.log")),
    );
    Ok(tracing_appender::non_blocking(appender))
}

/// Route logs to the test harness. Safe to call from every test.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = std::env::temp_dir().join(format!("chain-lens-log-{}", std::process::id()));
        let result = file_writer(&dir.join("test.log"));
        assert!(result.is_ok());
        assert!(dir.is_dir());
        drop(result);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        init_test_tracing();
        let result = init_tracing(Some("info".to_string()), None, true);
        assert!(result.is_err());
    }
}
