use std::env;

use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Set
/// `LOG_FORMAT=json` for line-delimited JSON output. Logs go to stderr so
/// commands that print to stdout (like `openapi`) stay pipeable.
pub fn configure_logging() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let result = if env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second init (tests, embedding) is harmless
    if let Err(e) = result {
        tracing::warn!("logging already initialized: {e}");
    }

    Ok(())
}
