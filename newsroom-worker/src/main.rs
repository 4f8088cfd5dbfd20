use std::sync::Arc;

use newsroom_core::{
    spawn_purger, spawn_sweeper, Clock, JsonArticleStore, SweepEvent, SystemClock, WorkflowConfig,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = WorkflowConfig::load();
    let zone = match config.sweep.zone() {
        Ok(zone) => zone,
        Err(e) => {
            error!(error = %e, "invalid sweep time zone");
            std::process::exit(2);
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(zone));

    let store_path = match config.store_path() {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "no location for the article store");
            std::process::exit(2);
        }
    };
    let store = Arc::new(JsonArticleStore::load_from(&store_path).await.with_clock(clock.clone()));
    info!(path = %store_path.display(), zone = %zone, "newsroom worker starting");

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let sweeper = spawn_sweeper(
        store.clone(),
        clock.clone(),
        config.sweep.clone(),
        Some(event_tx),
    );
    let purger = config
        .purge
        .enabled
        .then(|| spawn_purger(store.clone(), clock.clone(), config.purge.clone()));

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
            Some(event) = event_rx.recv() => log_event(&event),
        }
    }

    info!("shutting down");
    for handle in std::iter::once(sweeper).chain(purger) {
        let name = handle.name();
        if let Err(e) = handle.stop().await {
            warn!(job = name, error = %e, "job did not stop cleanly");
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn log_event(event: &SweepEvent) {
    match event {
        SweepEvent::Posted {
            article_id,
            platforms,
            status,
        } => info!(
            article_id,
            platforms = %platforms.join(","),
            status = %status,
            "article posted"
        ),
    }
}
