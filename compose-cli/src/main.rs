//! # Compose
//!
//! Command-line entry point for rendering and exporting compositions.

use clap::Parser;
use compose_cli::CliArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing on stderr, keeping stdout for rendered HTML.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,compose_core=debug,compose_renderer=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    // Use JSON format in production (RUST_LOG_FORMAT=json)
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    tracing::debug!(?args, "parsed arguments");

    compose_cli::run(&args).await
}
