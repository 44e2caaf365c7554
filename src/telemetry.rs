use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. Filtering comes from `RUST_LOG`,
/// falling back to `citykit=info`. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("citykit=info"))
        .unwrap_or_default();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
