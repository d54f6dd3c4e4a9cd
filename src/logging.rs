/// Install a compact fmt subscriber for test output.
///
/// The level comes from `RUST_LOG` (trace/debug/info/warn/error, default info).
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_max_level(level_from_env())
        .compact()
        .try_init();
}

fn level_from_env() -> tracing::Level {
    parse_level(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
}

/// Map a `RUST_LOG` value to a max level
pub fn parse_level(value: &str) -> tracing::Level {
    match value.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
