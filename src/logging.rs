//! Tracing initialisation for the supervisor binary

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with the given base log level.
///
/// `RUST_LOG` takes precedence when set, so operators can still narrow
/// output per module without recompiling.
pub fn init_tracing(log_level: Option<&str>) {
    let base_level = log_level.unwrap_or("info");
    let filter = format!("supervisor={base_level},reqwest=warn,hyper=warn");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}
