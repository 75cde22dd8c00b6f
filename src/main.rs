mod app;
mod http;
mod settings;
mod templates;
mod upstream;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,course_catalog=debug,catalog_search=debug";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    app::run().await
}
