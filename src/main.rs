//! tubetap server binary
//!
//! Reads configuration from the JSON file named by `TUBETAP_CONFIG`
//! (defaults apply when unset) and serves the REST API until SIGTERM/SIGINT.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubetap::{Config, TubeTap, run_with_shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubetap=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var_os("TUBETAP_CONFIG") {
        Some(path) => {
            tracing::info!(path = %std::path::Path::new(&path).display(), "loading configuration");
            Config::from_file(path)?
        }
        None => Config::default(),
    };

    let tubetap = Arc::new(TubeTap::new(config).await?);
    run_with_shutdown(tubetap).await?;

    Ok(())
}
