use hdr_gamma_fix_core::config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "hdr_gamma_fix.log";

/// Initialise logging. The default level is `info`; `debug` is enabled from
/// the config file, and only then may `RUST_LOG` override the level.
///
/// The runner has no console, so output goes to `hdr_gamma_fix.log` in the
/// data directory. Keep the returned guard alive until exit or buffered lines
/// are lost. Falls back to stderr if the data directory is unavailable.
pub fn init(debug: bool) -> Option<WorkerGuard> {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    match config::get_data_directory() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}
