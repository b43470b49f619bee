// src/watcher.rs
use crate::event::{ChangeEvent, ChangeKind};
use anyhow::Result;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::Watcher as NotifyWatcherTrait; // To use .watcher() and .cache()
use notify_debouncer_full::{new_debouncer, DebouncedEvent};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

/// Runs the recursive file system watcher in a background thread.
///
/// Every root in `roots` is watched recursively. Events are debounced over
/// `debounce` and forwarded as [`ChangeEvent`]s through `event_tx`. The
/// thread ends when the receiving side of `event_tx` is dropped.
///
/// # Returns
///
/// Returns `Ok(())` immediately after spawning the watcher thread.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub async fn run_watcher(
    roots: Vec<PathBuf>,
    debounce: Duration,
    event_tx: Sender<ChangeEvent>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("asteroid-watcher".to_string())
        .spawn(move || watch_blocking(roots, debounce, event_tx))?;
    Ok(())
}

fn watch_blocking(roots: Vec<PathBuf>, debounce: Duration, event_tx: Sender<ChangeEvent>) {
    // The debouncer reports to this std channel; it lives as long as this thread.
    let (debouncer_internal_tx, debouncer_internal_rx) = std::sync::mpsc::channel();

    let mut debouncer = match new_debouncer(debounce, None, debouncer_internal_tx) {
        Ok(d) => d,
        Err(e) => {
            error!("[WatcherThread] Failed to create debouncer: {}", e);
            return;
        }
    };

    for root in &roots {
        if !root.is_dir() {
            warn!(
                "[WatcherThread] Not a directory, skipping: {}",
                root.display()
            );
            continue;
        }
        match debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)
        {
            Ok(_) => info!("[WatcherThread] Watching folder: {}", root.display()),
            Err(e) => error!(
                "[WatcherThread] Failed to watch folder {}: {}",
                root.display(),
                e
            ),
        }
        debouncer
            .cache()
            .add_root(root, notify::RecursiveMode::Recursive);
    }

    loop {
        match debouncer_internal_rx.recv() {
            Ok(Ok(events)) => {
                for debounced_event in events {
                    if !forward_event(&debounced_event, &event_tx) {
                        info!("[WatcherThread] Event receiver gone. Watcher thread exiting.");
                        return;
                    }
                }
            }
            Ok(Err(errors)) => {
                for error in errors {
                    error!("[WatcherThread] Debouncer reported error: {:?}", error);
                }
            }
            Err(e) => {
                error!(
                    "[WatcherThread] Debouncer internal channel error: {:?}. Watcher thread exiting.",
                    e
                );
                return;
            }
        }
    }
}

/// Classifies a notify event. Access and other metadata-free events are ignored.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Remove),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(_) => Some(ChangeKind::Write),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        _ => None,
    }
}

/// Sends one debounced event on. Returns `false` once the receiver is gone.
fn forward_event(debounced_event: &DebouncedEvent, event_tx: &Sender<ChangeEvent>) -> bool {
    let Some(path) = debounced_event.paths.first() else {
        debug!("Received debounced event with no paths: {:?}", debounced_event);
        return true;
    };
    let Some(op) = change_kind(&debounced_event.kind) else {
        debug!(
            "[WatcherThread] Ignored event kind {:?} for {}",
            debounced_event.kind,
            path.display()
        );
        return true;
    };

    let event = ChangeEvent {
        path: path.clone(),
        op,
    };
    debug!("[WatcherThread] Produced event: {:?}", event);
    // Blocking send: this is a plain thread feeding the async side.
    event_tx.blocking_send(event).is_ok()
}
