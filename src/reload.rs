// src/reload.rs

//! Live reload of the serving state.
//!
//! The controller owns the only shared mutable value of the process: the
//! active [`HandlerSnapshot`], held in an [`ArcSwap`]. Requests load it
//! without locking and keep serving from the snapshot they loaded, even if a
//! newer one is published meanwhile. A reload builds a complete new snapshot
//! and publishes it with a single atomic store, so concurrent reloads never
//! expose a mix of two builds; whichever finishes last stays active.

use crate::config::{ReloadFailurePolicy, SiteConfig};
use crate::event::ChangeEvent;
use crate::snapshot::{BuildError, HandlerSnapshot};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{debug, error, info, warn};

/// Why a reload was requested.
#[derive(Debug, Clone)]
pub enum ReloadTrigger {
    /// Something changed under a watched root.
    FileChanged(ChangeEvent),
    /// The operator sent the reload signal.
    Signal,
}

/// Result of a reload that did not fail fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot with this generation is now active.
    Published(u64),
    /// The rebuild failed and the previous snapshot (this generation) was kept.
    Kept(u64),
}

/// Holds the active snapshot and republishes it on demand.
pub struct ReloadController {
    config: SiteConfig,
    policy: ReloadFailurePolicy,
    active: ArcSwap<HandlerSnapshot>,
    next_generation: AtomicU64,
}

impl ReloadController {
    /// Builds the first snapshot. Fails exactly when startup must abort.
    pub fn start(config: SiteConfig, policy: ReloadFailurePolicy) -> Result<Self, BuildError> {
        let first = HandlerSnapshot::build(&config, 0)?;
        Ok(Self {
            config,
            policy,
            active: ArcSwap::from_pointee(first),
            next_generation: AtomicU64::new(1),
        })
    }

    /// The snapshot new requests should use.
    pub fn current(&self) -> Arc<HandlerSnapshot> {
        self.active.load_full()
    }

    pub fn policy(&self) -> ReloadFailurePolicy {
        self.policy
    }

    /// Rebuilds the whole site and publishes it.
    ///
    /// Runs synchronously on the calling task. Under
    /// [`ReloadFailurePolicy::Exit`] a failed rebuild is returned as an error
    /// and nothing is published; under [`ReloadFailurePolicy::KeepServing`]
    /// it is logged and the previous snapshot stays active.
    pub fn reload(&self, trigger: &ReloadTrigger) -> Result<ReloadOutcome, BuildError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        match trigger {
            ReloadTrigger::FileChanged(event) => {
                info!(generation, "Reloading, {}: {}", event.op, event.path.display())
            }
            ReloadTrigger::Signal => info!(generation, "Reloading, received reload signal"),
        }

        match HandlerSnapshot::build(&self.config, generation) {
            Ok(snapshot) => {
                self.active.store(Arc::new(snapshot));
                Ok(ReloadOutcome::Published(generation))
            }
            Err(e) => match self.policy {
                ReloadFailurePolicy::Exit => {
                    error!(generation, "Reload failed: {}", e);
                    Err(e)
                }
                ReloadFailurePolicy::KeepServing => {
                    let kept = self.current().generation();
                    error!(generation, kept, "Reload failed, still serving previous site: {}", e);
                    Ok(ReloadOutcome::Kept(kept))
                }
            },
        }
    }
}

/// Reloads on every filesystem change event until shutdown.
///
/// Events already queued behind the first one are drained first so a burst
/// of changes costs a single rebuild.
///
/// # Errors
/// Returns the build error when a reload fails fatally.
pub async fn run_reload_loop(
    controller: Arc<ReloadController>,
    mut event_rx: Receiver<ChangeEvent>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let mut shutdown = shutdown_signal.clone();
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    info!("Change event channel closed. Reload loop exiting.");
                    break;
                };
                let mut coalesced = 0usize;
                while event_rx.try_recv().is_ok() {
                    coalesced += 1;
                }
                if coalesced > 0 {
                    debug!("{} more change(s) folded into this reload", coalesced);
                }
                controller.reload(&ReloadTrigger::FileChanged(event))?;
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Reload loop shutting down.");
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Reloads whenever the process receives `SIGUSR1`, until shutdown.
///
/// # Errors
/// Returns an error if the signal handler cannot be installed or a reload
/// fails fatally.
#[cfg(unix)]
pub async fn run_signal_listener(
    controller: Arc<ReloadController>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut shutdown = shutdown_signal.clone();
    info!("Listening for SIGUSR1 to reload.");
    loop {
        tokio::select! {
            received = usr1.recv() => {
                if received.is_none() {
                    warn!("SIGUSR1 stream closed. Signal listener exiting.");
                    break;
                }
                info!("received SIGUSR1.");
                controller.reload(&ReloadTrigger::Signal)?;
            }
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Signal listener shutting down.");
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Without Unix signals there is nothing to listen for; waits for shutdown.
#[cfg(not(unix))]
pub async fn run_signal_listener(
    _controller: Arc<ReloadController>,
    shutdown_signal: WatchReceiver<bool>,
) -> Result<()> {
    let mut shutdown = shutdown_signal.clone();
    warn!("Reload signal is not supported on this platform.");
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            break;
        }
    }
    Ok(())
}
