use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Console output for operators plus a daily-rotated JSON file under
/// `logs/` for inspecting an ingest run after the fact.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "ingest.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins when set; otherwise verbose for this crate only
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wci_ingest=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    // The guard flushes buffered lines on drop; the subscriber lives for the
    // whole process, so leak it
    std::mem::forget(guard);
}
