use clap::Parser;
use tracing_subscriber::EnvFilter;

use postboard::config::{Cli, Config};
use postboard::state::Container;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Open the store; this applies the configured migration strategy
    let container = Container::open(&config).await?;

    let stats = container.database().stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    container.close();
    Ok(())
}
