// src/main.rs

//! # Asteroid Main Entry Point
//!
//! Loads configuration, initializes logging, builds the first site and
//! launches the long-running tasks: the web server, the filesystem watcher
//! with its reload loop, and the `SIGUSR1` reload listener.
//!
//! A fatal condition in any task (a failed reload under the default policy,
//! a server that cannot bind) stops the process with a non-zero status.

use anyhow::Result;
use asteroid::config::AppConfig;
use asteroid::event::ChangeEvent;
use asteroid::reload::{self, ReloadController};
use asteroid::{watcher, web};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Spawns `task`, reporting its error (if any) on `fatal_tx`.
fn spawn_fatal<F>(name: &'static str, fatal_tx: mpsc::Sender<anyhow::Error>, task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            tracing::error!("{} exited with error: {:#}", name, e);
            let _ = fatal_tx.send(e.context(format!("{name} failed"))).await;
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let app_config = match AppConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing subscriber for logging with environment filter and max level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&app_config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default tracing subscriber failed");

    tracing::info!("Asteroid starting with configuration: {:?}", app_config);

    let controller = match ReloadController::start(app_config.site_config(), app_config.reload_failure) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("Can not serve {}: {}", app_config.asteroid_dir.display(), e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Serving {} on http://{}",
        app_config.asteroid_dir.display(),
        app_config.bind_addr
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (fatal_tx, mut fatal_rx) = mpsc::channel::<anyhow::Error>(4);
    let mut tasks = Vec::new();

    tasks.push(spawn_fatal(
        "Web server",
        fatal_tx.clone(),
        web::start_server(app_config.bind_addr, Arc::clone(&controller), shutdown_rx.clone()),
    ));

    if app_config.watch {
        let (change_tx, change_rx) = mpsc::channel::<ChangeEvent>(100);
        let roots = app_config.watch_roots();
        tracing::info!("Watching {:?} for changes", roots);
        watcher::run_watcher(roots, app_config.debounce, change_tx).await?;
        tasks.push(spawn_fatal(
            "Reload loop",
            fatal_tx.clone(),
            reload::run_reload_loop(Arc::clone(&controller), change_rx, shutdown_rx.clone()),
        ));
    } else {
        tracing::info!("Filesystem watching disabled.");
    }

    tasks.push(spawn_fatal(
        "Signal listener",
        fatal_tx.clone(),
        reload::run_signal_listener(Arc::clone(&controller), shutdown_rx.clone()),
    ));
    drop(fatal_tx);

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Ctrl-C received, initiating shutdown..."),
                Err(err) => tracing::error!("Failed to listen for Ctrl-C signal: {}", err),
            }
            Ok(())
        }
        Some(fatal) = fatal_rx.recv() => Err(fatal),
    };

    if shutdown_tx.send(true).is_err() {
        tracing::error!("Failed to send shutdown signal");
    }
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("A task panicked or exited with error: {}", e);
        }
    }

    match &outcome {
        Ok(()) => tracing::info!("Asteroid shut down gracefully."),
        Err(e) => tracing::error!("Asteroid stopping: {:#}", e),
    }
    outcome
}
