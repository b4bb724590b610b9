//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr so it never interleaves with event output
//! on stdout; file output rotates daily and can be JSON.

use std::path::Path;

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{SwError, SwResult};

/// Log file name prefix inside the log directory.
const LOG_FILE_PREFIX: &str = "steemwatch.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(writer: NonBlocking, json_output: bool) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    if json_output {
        layer.json().boxed()
    } else {
        layer.with_ansi(false).boxed()
    }
}

/// Initialize the global tracing subscriber.
///
/// `level` is either a plain level or a full `EnvFilter` expression such as
/// `sw_socket=debug,info`; `RUST_LOG` takes precedence over it. Keep the
/// returned guard alive for as long as logs should reach the file.
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> SwResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, LOG_FILE_PREFIX));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .boxed();

    tracing_subscriber::registry()
        .with(vec![console_layer, file_layer(writer, json_output)])
        .with(env_filter(level))
        .try_init()
        .map_err(|e| SwError::Internal(format!("failed to install logger: {e}")))?;

    tracing::info!("logging initialized at level={level}, dir={}", log_dir.display());

    Ok(LogGuard { _guard: guard })
}

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize a minimal console-only logger for testing or simple CLI usage.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .try_init();
}

/// `RUST_LOG` wins over the configured level when set.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
