use clap::Parser;
use fiesta_box::config::ServerConfig;
use fiesta_box::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    tracing::info!(addr = %config.bind_addr(), ping_interval = ?config.ping_interval(), "starting fiesta-box");

    server::serve(config).await?;
    Ok(())
}
