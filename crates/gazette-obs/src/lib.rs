use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,gazette=debug";

/// Initialize logging.
/// - RUST_LOG respected; default to "info,gazette=debug"
/// - Human-readable lines unless GAZETTE_LOG_JSON is set, then JSON
pub fn init(service_name: &str) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let json = json_requested(std::env::var("GAZETTE_LOG_JSON").ok().as_deref());

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    // try_init so a second call (tests, embedding) is a no-op
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(json_layer)
        .with(text_layer)
        .try_init();

    tracing::info!(service = %service_name, json, "Logging initialized");
}

fn json_requested(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no"),
    }
}
