use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for a component.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies
/// (`error`, `warn`, `info`, `debug`, `trace`).
pub fn init(default_level: &str) {
    let level = match default_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init: tests and embedders may call this more than once.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
