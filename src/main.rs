use anyhow::Result;
use log::{error, info};
use std::thread;
use std::time::Instant;
use tokio::sync::broadcast;

use image_resizer::api::build_rocket;
use image_resizer::bootstrap::service::start_service;
use image_resizer::bootstrap::setup::{initialize_folder, initialize_logger};
use image_resizer::common::ROCKET_RUNTIME;
use image_resizer::common::errors::handle_error;
use image_resizer::config::load_config;
use image_resizer::database::open_database;

fn main() -> Result<()> {
    initialize_logger();
    let config = load_config().map_err(handle_error)?;
    initialize_folder(&config).map_err(handle_error)?;

    let start_time = Instant::now();
    let db = open_database(&config.database_path).map_err(handle_error)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (state, worker) = start_service(&config, db, &shutdown_tx).map_err(handle_error)?;
    info!(duration = &*format!("{:?}", start_time.elapsed()); "Service started");

    let rocket_handle = thread::spawn({
        let shutdown_tx = shutdown_tx.clone();
        let config = config.clone();
        move || {
            let result = ROCKET_RUNTIME.block_on(async {
                let rocket_instance = build_rocket(state, &config).ignite().await?;
                let shutdown_handle = rocket_instance.shutdown();
                let shutdown_tx_clone = shutdown_tx.clone();
                ROCKET_RUNTIME.spawn(async move {
                    let mut shutdown_rx = shutdown_tx_clone.subscribe();
                    if shutdown_rx.recv().await.is_ok() {
                        shutdown_handle.notify();
                    }
                });
                rocket_instance.launch().await
            });
            if let Err(e) = result {
                error!("Rocket server failed: {}", e);
                let _ = shutdown_tx.send(());
                return Err(anyhow::Error::from(e));
            }
            Ok(())
        }
    });

    ROCKET_RUNTIME.block_on(async {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let is_ctrl_c = tokio::select! {
            _ = tokio::signal::ctrl_c() => true,
            _ = shutdown_rx.recv() => false,
        };
        if is_ctrl_c {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    worker.stop();
    worker.join().map_err(handle_error)?;
    match rocket_handle.join() {
        Ok(result) => result.map_err(handle_error)?,
        Err(_) => error!("Rocket thread panicked"),
    }

    Ok(())
}
