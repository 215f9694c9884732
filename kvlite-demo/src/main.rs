// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use kvlite_db::ConnectionManager;
use kvlite_demo::{config, session};
use kvlite_demo::error::DemoError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting kvlite-demo");
    info!("Store: {}", config.store_uri);
    info!("Storage directory: {}", config.storage_dir.display());

    let manager = ConnectionManager::sqlite(
        config.engine(),
        config.store_uri.clone(),
        config.open_mode,
    );

    let result = session::run(&manager, config.runs, &mut std::io::stdout().lock()).await;
    if let Err(e) = &result {
        error!("{e}");
    }

    // Teardown
    session::teardown(result, manager.close_db())
}
