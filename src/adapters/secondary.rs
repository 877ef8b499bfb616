//! Secondary player: the presentation recording kept in step with the primary
//!
//! Visibility is derived from [`SecondaryInputs`]; [`SecondaryPlayer::reconcile`]
//! moves the adapter through [`SecondaryState`] whenever those inputs change.
//! Continuous drift correction is [`sync_once`], driven by the sync task.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::primary::log_play_result;
use crate::config::SyncConfig;
use crate::engine::{
    ElementSlot, EngineFactory, EngineHandle, EngineKind, EngineOptions, MediaEngine,
    dispose_quietly,
};
use crate::{PlaybackError, Result};

/// Everything the secondary player's visibility depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondaryInputs {
    pub presentation_url: Option<String>,
    pub has_slides: bool,
    pub has_slide_at_current_time: bool,
    /// Explicit user toggle
    pub show_presentation: bool,
    pub audio_only: bool,
}

impl SecondaryInputs {
    /// Whether the presentation recording should be on screen.
    pub fn should_show(&self) -> bool {
        self.presentation_url.as_deref().is_some_and(|u| !u.is_empty())
            && (!self.has_slides || !self.has_slide_at_current_time || self.show_presentation)
    }

    fn wants_engine(&self) -> bool {
        self.should_show() && !self.audio_only
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryState {
    /// No engine exists
    Hidden,
    /// Waiting for the element slot to attach
    Initializing { attempts: u32 },
    Active { source: String },
    /// Reloading and re-copying time and play state from the primary
    Resyncing { source: String },
}

impl SecondaryState {
    pub fn name(&self) -> &'static str {
        match self {
            SecondaryState::Hidden => "hidden",
            SecondaryState::Initializing { .. } => "initializing",
            SecondaryState::Active { .. } => "active",
            SecondaryState::Resyncing { .. } => "resyncing",
        }
    }
}

/// What a [`sync_once`] step changed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncOutcome {
    /// Drift that was corrected, in seconds
    pub corrected_drift: Option<f64>,
    pub started: bool,
    pub paused: bool,
}

/// One continuous-sync step: correct drift beyond `threshold` and mirror
/// the primary's play state.
pub async fn sync_once(primary: &dyn MediaEngine, secondary: &dyn MediaEngine, threshold: f64) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();
    if primary.is_disposed() || secondary.is_disposed() {
        return outcome;
    }

    let primary_time = primary.current_time();
    let drift = secondary.current_time() - primary_time;
    if drift.abs() > threshold {
        trace!(drift, primary_time, "Correcting presentation drift");
        secondary.set_current_time(primary_time);
        outcome.corrected_drift = Some(drift);
    }

    let primary_paused = primary.paused();
    if primary_paused && !secondary.paused() {
        secondary.pause();
        outcome.paused = true;
    } else if !primary_paused && secondary.paused() {
        let result = secondary.play().await;
        outcome.started = result.is_ok();
        log_play_result(EngineKind::Presentation, result);
    }
    outcome
}

/// Copy time and play state from the primary onto a freshly (re)loaded
/// secondary engine.
async fn copy_from_primary(primary: &dyn MediaEngine, secondary: &dyn MediaEngine) {
    secondary.set_current_time(primary.current_time());
    if !primary.paused() && secondary.paused() {
        log_play_result(EngineKind::Presentation, secondary.play().await);
    } else if primary.paused() && !secondary.paused() {
        secondary.pause();
    }
}

fn current_primary(primary: &watch::Receiver<Option<EngineHandle>>) -> Option<EngineHandle> {
    primary.borrow().clone().filter(|e| !e.is_disposed())
}

/// Adapter owning the presentation engine.
pub struct SecondaryPlayer {
    factory: Arc<dyn EngineFactory>,
    slot: ElementSlot,
    config: Arc<SyncConfig>,
    primary: watch::Receiver<Option<EngineHandle>>,
    engine: Option<EngineHandle>,
    last_inputs: Option<SecondaryInputs>,
    state: Arc<watch::Sender<SecondaryState>>,
    handle: watch::Sender<Option<EngineHandle>>,
    tasks: CancellationToken,
    shutdown: CancellationToken,
}

impl SecondaryPlayer {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        slot: ElementSlot,
        config: Arc<SyncConfig>,
        primary: watch::Receiver<Option<EngineHandle>>,
    ) -> Self {
        let (state, _) = watch::channel(SecondaryState::Hidden);
        let (handle, _) = watch::channel(None);
        Self {
            factory,
            slot,
            config,
            primary,
            engine: None,
            last_inputs: None,
            state: Arc::new(state),
            handle,
            tasks: CancellationToken::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SecondaryState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SecondaryState> {
        self.state.subscribe()
    }

    /// Read-only view of the presentation engine, `None` while hidden.
    pub fn watch_engine(&self) -> watch::Receiver<Option<EngineHandle>> {
        self.handle.subscribe()
    }

    pub fn engine(&self) -> Option<EngineHandle> {
        self.engine.clone()
    }

    fn set_state(&self, state: SecondaryState) {
        if *self.state.borrow() != state {
            debug!(from = self.state.borrow().name(), to = state.name(), "Secondary state change");
        }
        self.state.send_replace(state);
    }

    /// Bring the adapter in line with `inputs`.
    ///
    /// Returns once the resulting state is entered. While the element slot is
    /// detached this waits in bounded steps of `node_retry_delay`; dropping
    /// the future or shutting the adapter down abandons the wait.
    pub async fn reconcile(&mut self, inputs: SecondaryInputs) -> Result<SecondaryState> {
        let unchanged = self.last_inputs.as_ref() == Some(&inputs)
            && self.engine.as_ref().is_some_and(|e| !e.is_disposed());
        if unchanged {
            return Ok(self.state());
        }
        self.last_inputs = Some(inputs.clone());

        if !inputs.wants_engine() {
            self.hide();
            return Ok(SecondaryState::Hidden);
        }
        // wants_engine() guarantees a non-empty url
        let Some(source) = inputs.presentation_url.clone() else {
            return Ok(self.state());
        };

        match self.engine.clone().filter(|e| !e.is_disposed()) {
            None => self.activate(&source).await,
            Some(engine) => {
                let source_changed = engine.current_src().as_deref() != Some(source.as_str());
                // Sole visible video: reload so it tracks the primary tightly
                if source_changed || !inputs.has_slides {
                    self.resync(engine, &source, source_changed);
                }
                Ok(self.state())
            }
        }
    }

    fn hide(&mut self) {
        self.tasks.cancel();
        if let Some(engine) = self.engine.take() {
            dispose_quietly(engine.as_ref());
            info!("Presentation player hidden");
        }
        self.handle.send_replace(None);
        self.set_state(SecondaryState::Hidden);
    }

    async fn wait_for_slot(&self) -> bool {
        let mut attached = self.slot.watch();
        for attempt in 1..=self.config.node_retry_attempts {
            if self.slot.is_attached() {
                return true;
            }
            self.set_state(SecondaryState::Initializing { attempts: attempt });
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(self.config.node_retry_delay()) => {}
                _ = attached.changed() => {}
            }
        }
        self.slot.is_attached()
    }

    async fn activate(&mut self, source: &str) -> Result<SecondaryState> {
        if !self.wait_for_slot().await {
            warn!(slot = self.slot.name(), "Presentation slot never attached");
            return Ok(self.state());
        }

        let engine = match self.factory.create(&self.slot, EngineOptions::presentation(source)) {
            Ok(engine) => engine,
            Err(e @ PlaybackError::NodeUnavailable { .. }) => {
                debug!("Presentation slot detached during creation: {}", e);
                self.set_state(SecondaryState::Initializing { attempts: self.config.node_retry_attempts });
                return Ok(self.state());
            }
            Err(e) => {
                warn!("Error initializing presentation video player: {}", e);
                self.last_inputs = None;
                return Err(e);
            }
        };
        engine.set_muted(true);

        self.tasks.cancel();
        self.tasks = CancellationToken::new();
        let primary = self.primary.clone();
        let retry_delay = self.config.primary_retry_delay();
        let secondary = Arc::clone(&engine);
        let cancel = self.tasks.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sync_on_ready(secondary, primary, retry_delay) => {}
            }
        });

        info!(source, "Presentation player created");
        self.handle.send_replace(Some(Arc::clone(&engine)));
        self.engine = Some(engine);
        self.set_state(SecondaryState::Active { source: source.to_string() });
        Ok(self.state())
    }

    fn resync(&mut self, engine: EngineHandle, source: &str, source_changed: bool) {
        let fallback_time = current_primary(&self.primary)
            .map(|p| p.current_time())
            .unwrap_or_else(|| engine.current_time());

        self.tasks.cancel();
        self.tasks = CancellationToken::new();
        if source_changed {
            engine.set_src(source);
        }
        engine.load();
        self.set_state(SecondaryState::Resyncing { source: source.to_string() });
        info!(source, source_changed, "Resyncing presentation player");

        let primary = self.primary.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.tasks.clone();
        let source = source.to_string();
        tokio::spawn(async move {
            let ready = tokio::select! {
                _ = cancel.cancelled() => return,
                ready = engine.ready() => ready,
            };
            if let Err(e) = ready {
                debug!("Presentation player gone before resync: {}", e);
                return;
            }
            match current_primary(&primary) {
                Some(p) => copy_from_primary(p.as_ref(), engine.as_ref()).await,
                None => engine.set_current_time(fallback_time),
            }
            state.send_replace(SecondaryState::Active { source });
        });
    }

    /// Dispose the engine and stop all pending work.
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();
        self.hide();
        self.last_inputs = None;
    }
}

impl Drop for SecondaryPlayer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.tasks.cancel();
        if let Some(engine) = self.engine.take() {
            dispose_quietly(engine.as_ref());
        }
    }
}

/// On the first ready signal copy the primary's state, retrying once after
/// `retry_delay` when the primary is not mounted yet.
async fn sync_on_ready(
    secondary: EngineHandle,
    primary: watch::Receiver<Option<EngineHandle>>,
    retry_delay: std::time::Duration,
) {
    if let Err(e) = secondary.ready().await {
        debug!("Presentation player gone before ready: {}", e);
        return;
    }

    let master = match current_primary(&primary) {
        Some(master) => Some(master),
        None => {
            debug!(?retry_delay, "Primary not mounted at presentation ready, retrying once");
            tokio::time::sleep(retry_delay).await;
            current_primary(&primary)
        }
    };

    match master {
        Some(master) if !secondary.is_disposed() => copy_from_primary(master.as_ref(), secondary.as_ref()).await,
        Some(_) => {}
        None => debug!("Primary still not mounted, presentation player starts unsynced"),
    }
}
