use std::sync::Arc;

use cadence_app::render::LogRenderer;
use cadence_app::source::JsonFileSource;
use cadence_core::clock::SystemClock;
use cadence_core::config::load_config;
use cadence_service::refresh::DualCadenceScheduler;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting cadence countdown engine");

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    if config.sources.is_empty() {
        tracing::warn!("No sources configured, the countdown will stay empty");
    }

    let source = JsonFileSource::new(&config.sources);
    let scheduler = DualCadenceScheduler::from_settings(&config, source, Arc::new(SystemClock))?;
    let handle = scheduler.spawn();

    let mut snapshots = handle.snapshots();
    let mut renderer = LogRenderer::new();
    renderer.render(&snapshots.borrow_and_update());

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Failed to listen for shutdown signal");
                }
                tracing::info!("Shutdown requested");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&snapshots.borrow_and_update());
                renderer.render(&snapshot);
            }
        }
    }

    handle.stop().await;

    Ok(())
}
