//! Driver spawns and manages the synchronization tasks

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::adapters::primary::log_play_result;
use crate::adapters::sync_once;
use crate::engine::{EngineEvent, EngineHandle, EngineKind};
use crate::overlay::{MarkerOverlay, OverlayEvent};

/// Result of spawning driver tasks
pub struct DriverChannels {
    /// Overlay events; subscribe for a receiver
    pub events: broadcast::Sender<OverlayEvent>,
    /// Latest primary playback position
    pub positions: watch::Receiver<Option<f64>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Engine handles the driver tasks follow.
pub struct DriverInputs {
    pub primary: watch::Receiver<Option<EngineHandle>>,
    pub secondary: watch::Receiver<Option<EngineHandle>>,
    pub overlay: Arc<Mutex<MarkerOverlay>>,
    pub drift_threshold: f64,
    pub event_capacity: usize,
}

pub(crate) fn lock_overlay(overlay: &Mutex<MarkerOverlay>) -> MutexGuard<'_, MarkerOverlay> {
    overlay.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Driver spawns and manages synchronization tasks
///
/// The sync task mirrors the primary onto the secondary engine; the overlay
/// task feeds primary events through the [`MarkerOverlay`] and publishes the
/// resulting [`OverlayEvent`]s. Both follow engine handles as adapters remount.
pub struct Driver;

impl Driver {
    /// Spawn driver tasks; must be called from within a tokio runtime.
    pub fn spawn(inputs: DriverInputs) -> DriverChannels {
        let (events, _) = broadcast::channel(inputs.event_capacity.max(1));
        let (position_tx, positions) = watch::channel(None);
        let cancel = CancellationToken::new();

        tokio::spawn(Self::sync_task(
            inputs.primary.clone(),
            inputs.secondary,
            inputs.drift_threshold,
            cancel.clone(),
        ));
        tokio::spawn(Self::overlay_task(
            inputs.primary,
            inputs.overlay,
            events.clone(),
            position_tx,
            cancel.clone(),
        ));

        DriverChannels { events, positions, cancel }
    }

    /// Sync task - keeps the secondary engine in step with the primary
    async fn sync_task(
        mut primary_rx: watch::Receiver<Option<EngineHandle>>,
        mut secondary_rx: watch::Receiver<Option<EngineHandle>>,
        threshold: f64,
        cancel: CancellationToken,
    ) {
        info!("Sync task started");
        let mut corrections = 0u64;

        'mounts: loop {
            let primary = primary_rx.borrow_and_update().clone();
            let secondary = secondary_rx.borrow_and_update().clone();

            let (Some(primary), Some(secondary)) = (primary, secondary) else {
                tokio::select! {
                    _ = cancel.cancelled() => break 'mounts,
                    changed = primary_rx.changed() => if changed.is_err() { break 'mounts },
                    changed = secondary_rx.changed() => if changed.is_err() { break 'mounts },
                }
                continue;
            };

            debug!("Both engines mounted, synchronizing");
            let mut events = primary.subscribe();
            if sync_once(primary.as_ref(), secondary.as_ref(), threshold).await.corrected_drift.is_some() {
                corrections += 1;
            }

            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break 'mounts,
                    changed = primary_rx.changed() => {
                        if changed.is_err() { break 'mounts }
                        continue 'mounts;
                    }
                    changed = secondary_rx.changed() => {
                        if changed.is_err() { break 'mounts }
                        continue 'mounts;
                    }
                    event = events.recv() => event,
                };

                match event {
                    Ok(EngineEvent::Play) => {
                        log_play_result(EngineKind::Presentation, secondary.play().await);
                    }
                    Ok(EngineEvent::Pause) => secondary.pause(),
                    Ok(EngineEvent::Seeked { .. } | EngineEvent::TimeUpdate { .. }) | Err(RecvError::Lagged(_)) => {
                        let outcome = sync_once(primary.as_ref(), secondary.as_ref(), threshold).await;
                        if let Some(drift) = outcome.corrected_drift {
                            corrections += 1;
                            trace!(drift, corrections, "Drift corrected");
                        }
                    }
                    Ok(EngineEvent::Disposed) | Err(RecvError::Closed) => {
                        debug!("Primary engine gone, waiting for remount");
                        tokio::select! {
                            _ = cancel.cancelled() => break 'mounts,
                            changed = primary_rx.changed() => if changed.is_err() { break 'mounts },
                        }
                        continue 'mounts;
                    }
                    Ok(_) => {}
                }
            }
        }

        info!("Sync task ended ({} drift corrections)", corrections);
    }

    /// Overlay task - resolves markers from primary events
    async fn overlay_task(
        mut primary_rx: watch::Receiver<Option<EngineHandle>>,
        overlay: Arc<Mutex<MarkerOverlay>>,
        events_tx: broadcast::Sender<OverlayEvent>,
        position_tx: watch::Sender<Option<f64>>,
        cancel: CancellationToken,
    ) {
        info!("Overlay task started");
        let mut update_count = 0u64;
        let publish = |events: Vec<OverlayEvent>| {
            for event in events {
                trace!(?event, "Overlay event");
                // Nobody listening is fine
                let _ = events_tx.send(event);
            }
        };

        let mut mounted: Option<EngineHandle> = None;

        'mounts: loop {
            let current = primary_rx.borrow_and_update().clone();
            let Some(engine) = current else {
                tokio::select! {
                    _ = cancel.cancelled() => break 'mounts,
                    changed = primary_rx.changed() => if changed.is_err() { break 'mounts },
                }
                continue;
            };

            if !mounted.as_ref().is_some_and(|m| Arc::ptr_eq(m, &engine)) {
                lock_overlay(&overlay).on_remount();
                mounted = Some(Arc::clone(&engine));
            }
            let mut events = engine.subscribe();
            // Metadata may have arrived before we subscribed
            if let Some(duration) = engine.duration() {
                let seek = lock_overlay(&overlay).on_loaded_metadata(duration);
                if let Some(t) = seek {
                    engine.set_current_time(t);
                }
            }

            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break 'mounts,
                    changed = primary_rx.changed() => {
                        if changed.is_err() { break 'mounts }
                        continue 'mounts;
                    }
                    event = events.recv() => event,
                };

                match event {
                    Ok(EngineEvent::LoadedMetadata { duration }) => {
                        let seek = lock_overlay(&overlay).on_loaded_metadata(duration);
                        if let Some(t) = seek {
                            debug!(timestamp = t, "Seeking to requested start position");
                            engine.set_current_time(t);
                        }
                    }
                    Ok(EngineEvent::TimeUpdate { time }) => {
                        update_count += 1;
                        position_tx.send_replace(Some(time));
                        publish(lock_overlay(&overlay).on_time_update(time));
                    }
                    Ok(EngineEvent::Seeking { .. }) => lock_overlay(&overlay).on_seeking(),
                    Ok(EngineEvent::Seeked { time }) => {
                        position_tx.send_replace(Some(time));
                        publish(lock_overlay(&overlay).on_seeked(time));
                    }
                    Ok(EngineEvent::Pause) => {
                        let time = engine.current_time();
                        publish(lock_overlay(&overlay).on_pause(time));
                    }
                    Ok(EngineEvent::Disposed) | Err(RecvError::Closed) => {
                        position_tx.send_replace(None);
                        tokio::select! {
                            _ = cancel.cancelled() => break 'mounts,
                            changed = primary_rx.changed() => if changed.is_err() { break 'mounts },
                        }
                        continue 'mounts;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Overlay fell behind primary events, resolving current position");
                        let time = engine.current_time();
                        publish(lock_overlay(&overlay).on_time_update(time));
                    }
                    Ok(_) => {}
                }
            }
        }

        info!("Overlay task ended ({} time updates)", update_count);
    }
}
