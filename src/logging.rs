//! Diagnostics go to stderr; stdout carries the IPC stream.

use tracing_subscriber::EnvFilter;

pub const FILTER_ENV: &str = "STUDENTD_LOG";
const DEFAULT_FILTER: &str = "studentd=info";

pub fn init(json: bool) {
    let filter =
        EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
