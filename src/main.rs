use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;

use shared_counter::config::Config;
use shared_counter::{App, JsonFileStorage, MemoryStorage, PersistedCell, ReducerView, SimpleView, Storage, telemetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(&config.log_level, config.log_format)?;
    info!("Starting shared counter");

    let storage: Arc<dyn Storage> = match config.store_path() {
        Some(path) => {
            info!(path = %path.display(), "using file storage");
            Arc::new(JsonFileStorage::new(path))
        }
        None => {
            info!("using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    };

    let cell = PersistedCell::new(config.key.clone(), config.initial, storage);
    let app = App::new(cell.clone())
        .with_view(SimpleView::new(cell.clone()))
        .with_view(ReducerView::new(cell.clone()));

    let mut stdout = tokio::io::stdout();
    stdout.write_all(app.frame().as_bytes()).await?;
    stdout.flush().await?;

    let value = cell.hydrate().await.context("loading persisted counter")?;
    info!(key = %config.key, value, "counter loaded");

    app.run(BufReader::new(tokio::io::stdin()), stdout).await?;

    cell.flush().await;
    if cell.persist_failures() > 0 {
        tracing::warn!(failures = cell.persist_failures(), "some counter updates were not persisted");
    }
    Ok(())
}
