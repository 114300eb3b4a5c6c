//! music-db - inspect the local music library store

use std::path::PathBuf;

use anyhow::Context;
use music_db::services::Services;
use music_db::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let mut settings = Settings::load();
    if let Some(path) = std::env::args_os().nth(1) {
        settings.database.path = Some(PathBuf::from(path));
    }

    let services = Services::start(&settings)
        .await
        .context("failed to open the music database")?;

    let summary = services
        .library
        .summary()
        .await
        .context("failed to read the music library")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    services.shutdown().await;
    Ok(())
}
