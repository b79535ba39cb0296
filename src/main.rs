//! docextract - resumable field extraction from document directories.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docextract::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Per-document progress is logged at info
    let default_filter = if cli::is_verbose() {
        "docextract=debug"
    } else {
        "docextract=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli::run().await
}
