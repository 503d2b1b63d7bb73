//! Gateway core binary entry point.

use clap::Parser;
use tracing::info;

use proxy_gateway::settings::{self, Settings};
use proxy_gateway::{http, Gateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    settings::init_tracing();

    let gateway = Gateway::bootstrap(&settings).await?;
    let _background = gateway.spawn_background_tasks(&settings);

    let router = http::router(gateway.state.clone());
    let listener = tokio::net::TcpListener::bind(settings.listen_addr).await?;
    info!(addr = %settings.listen_addr, "gateway-core listening");

    let shutdown = gateway.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
