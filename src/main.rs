use std::net::TcpListener;

use tracing_subscriber::EnvFilter;

use hubd::config;
use hubd::startup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = config::settings();
    let listener = TcpListener::bind(settings.application.address())?;

    tracing::info!(addr = %settings.application.address(), "starting hubd");

    let server = startup::run(listener)?;
    server.await?;

    Ok(())
}
