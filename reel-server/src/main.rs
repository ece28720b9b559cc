use anyhow::Result;
use reel_server::{Settings, DEFAULT_LOG_FILTER};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let settings = Settings::from_env()?;
    let addr = settings.addr();
    let app = reel_server::build(&settings).await?;

    app.listen(addr).await?;

    Ok(())
}
