use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Initialise structured JSON logging on stdout. `RUST_LOG` controls the
/// level and defaults to `info`. Records from the `log` facade (actix's
/// `Logger`, `LoggerMiddleware`) are forwarded into tracing.
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(formatting_layer)
        .init();
}

/// Like `init_telemetry`, but safe to call from every test: only the first
/// call installs a subscriber, and output only appears with `TEST_LOG` set.
pub fn init_test_telemetry() {
    if std::env::var("TEST_LOG").is_err() {
        return;
    }
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
