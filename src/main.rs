//! Clipper server binary entry point

use omniclip::{start_server, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omniclip=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("OMNICLIP_ADDR").unwrap_or_else(|_| "127.0.0.1:18000".to_string());

    let state = AppState::new();
    start_server(&addr, state).await?;

    Ok(())
}
