//! Service wiring: listener, vision loader, idle-session sweep, shutdown

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::{AppContext, router};
use crate::clock::{Clock, MonotonicClock};
use crate::config::Config;
use crate::session::SessionRegistry;
use crate::state::{ServiceState, SharedState};
use crate::stats;
use crate::vision::Vision;

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let composer_config = config
        .composer
        .to_composer_config()
        .context("invalid [composer] settings")?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let state = ServiceState::new();
    let stats = stats::new_shared();
    let sessions = SessionRegistry::new(composer_config, clock, &config.sessions);
    let ctx = AppContext::new(Arc::clone(&state), sessions, stats);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(
        addr = %listener.local_addr()?,
        prediction_interval = ?composer_config.prediction_interval(),
        letter_add_interval = ?composer_config.letter_add_interval(),
        confidence_threshold = composer_config.confidence_threshold(),
        "listening"
    );

    let (stop_tx, stop_rx) = watch::channel(false);

    // Health reports 503 until this finishes
    let loader = {
        let ctx = Arc::clone(&ctx);
        let stop_tx = stop_tx.clone();
        let vision = config.vision.clone();
        let detector = config.detector;
        let classifier = config.classifier.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            match Vision::from_config(&vision, &detector, &classifier) {
                Ok(built) => {
                    ctx.install_vision(built);
                    Ok(())
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "vision init failed");
                    let _ = stop_tx.send(true);
                    Err(e.context("initializing vision"))
                }
            }
        })
    };

    let pruner = spawn_pruner(
        Arc::clone(&ctx),
        config.sessions.prune_interval(),
        stop_rx.clone(),
    );

    axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state), stop_rx))
        .await
        .context("server error")?;

    // set only by the loader until now
    let stop_requested = *stop_tx.borrow();
    let _ = stop_tx.send(true);
    if let Err(e) = pruner.await {
        warn!(error = %e, "session pruner panicked");
    }

    info!(
        sessions = ctx.sessions().len().await,
        uptime_secs = (chrono::Utc::now() - state.started_at()).num_seconds(),
        "server stopped"
    );
    let summary = match ctx.stats().lock() {
        Ok(s) => s.summary(),
        Err(poisoned) => poisoned.into_inner().summary(),
    };
    info!("inference stats:\n{}", summary.trim_end());

    finish_loader(loader, stop_requested).await
}

/// Surface the loader's result once it has finished or asked for the stop.
/// A load still running at Ctrl-C is left behind.
async fn finish_loader(
    loader: JoinHandle<anyhow::Result<()>>,
    stop_requested: bool,
) -> anyhow::Result<()> {
    if stop_requested || loader.is_finished() {
        loader.await.context("vision loader panicked")??;
    }
    Ok(())
}

/// Resolves on Ctrl-C or an internal stop request; flips readiness first so
/// health checks fail while connections drain
async fn shutdown_signal(state: SharedState, mut stop: watch::Receiver<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("ctrl-c received, shutting down"),
        _ = stop.wait_for(|stopped| *stopped) => info!("stop requested, shutting down"),
    }
    state.begin_shutdown();
}

fn spawn_pruner(
    ctx: Arc<AppContext>,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    ctx.sessions().prune_idle().await;
                }
            }
        }
    })
}
