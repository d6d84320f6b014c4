use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "worklog_metrics=info";

/// Initializes console logging on stderr so stdout stays free for JSON output.
///
/// `RUST_LOG` overrides the default directive. Calling this twice is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
