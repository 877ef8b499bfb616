//! Primary player: the presenter video, or a native audio element
//!
//! Owns exactly one engine at a time. Other components only read the engine
//! handle published through [`PrimaryPlayer::watch_engine`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SyncConfig;
use crate::engine::{
    ControlBarLayout, ElementSlot, EngineEvent, EngineFactory, EngineHandle, EngineKind,
    EngineOptions, dispose_quietly,
};
use crate::{PlaybackError, Result};

/// Outcome of [`PrimaryPlayer::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Configured {
    /// The video slot is not attached yet; call [`PrimaryPlayer::retry_deferred`] later
    Deferred,
    /// A fresh video engine was created
    Created,
    /// The existing engine now plays the new source
    Swapped,
    /// Nothing to do
    Unchanged,
    /// A native audio element replaced the video engine
    AudioOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MountKind {
    Video,
    Audio,
}

struct Mounted {
    kind: MountKind,
    engine: EngineHandle,
    source: String,
    /// Scope of the post-ready tasks of the current load
    tasks: CancellationToken,
}

/// Adapter owning the presenter engine.
pub struct PrimaryPlayer {
    factory: Arc<dyn EngineFactory>,
    video_slot: ElementSlot,
    audio_slot: ElementSlot,
    config: Arc<SyncConfig>,
    mounted: Option<Mounted>,
    deferred: Option<String>,
    clip_id: Option<String>,
    timestamp: Option<f64>,
    handle: watch::Sender<Option<EngineHandle>>,
}

impl PrimaryPlayer {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        video_slot: ElementSlot,
        audio_slot: ElementSlot,
        config: Arc<SyncConfig>,
    ) -> Self {
        let (handle, _) = watch::channel(None);
        Self {
            factory,
            video_slot,
            audio_slot,
            config,
            mounted: None,
            deferred: None,
            clip_id: None,
            timestamp: None,
            handle,
        }
    }

    /// Read-only view of the mounted engine, `None` while unmounted.
    pub fn watch_engine(&self) -> watch::Receiver<Option<EngineHandle>> {
        self.handle.subscribe()
    }

    pub fn engine(&self) -> Option<EngineHandle> {
        self.mounted.as_ref().map(|m| Arc::clone(&m.engine))
    }

    pub fn is_audio_only(&self) -> bool {
        self.mounted.as_ref().is_some_and(|m| m.kind == MountKind::Audio)
    }

    pub fn source(&self) -> Option<&str> {
        self.mounted.as_ref().map(|m| m.source.as_str())
    }

    fn layout(&self) -> ControlBarLayout {
        ControlBarLayout::for_clip(self.clip_id.as_deref())
    }

    /// Mount `source` as video, or as audio when `audio_only` is set.
    pub async fn configure(&mut self, source: &str, audio_only: bool) -> Result<Configured> {
        if audio_only {
            return self.configure_audio(source);
        }

        let current = self.mounted.as_ref().map(|m| (m.kind, m.source == source));
        match current {
            Some((MountKind::Video, true)) => Ok(Configured::Unchanged),
            Some((MountKind::Video, false)) => Ok(self.swap_source(source)),
            _ => {
                // Coming from audio (or nothing): always start from a fresh engine
                self.unmount();
                self.create_video(source)
            }
        }
    }

    /// Create the video engine once a deferred slot is attached.
    pub async fn retry_deferred(&mut self) -> Result<Configured> {
        match self.deferred.clone() {
            Some(source) if self.mounted.is_none() => self.create_video(&source),
            _ => Ok(Configured::Unchanged),
        }
    }

    fn create_video(&mut self, source: &str) -> Result<Configured> {
        if !self.video_slot.is_attached() {
            debug!(slot = self.video_slot.name(), "Video slot not attached, deferring engine creation");
            self.deferred = Some(source.to_string());
            return Ok(Configured::Deferred);
        }

        let options = EngineOptions::presenter(source, self.config.playback_rates.clone());
        let engine = match self.factory.create(&self.video_slot, options) {
            Ok(engine) => engine,
            Err(PlaybackError::NodeUnavailable { .. }) => {
                self.deferred = Some(source.to_string());
                return Ok(Configured::Deferred);
            }
            Err(e) => return Err(e),
        };
        self.deferred = None;

        let tasks = CancellationToken::new();
        tokio::spawn(restyle_when_ready(Arc::clone(&engine), self.layout(), tasks.clone()));

        info!(source, "Presenter engine created");
        self.mount(Mounted { kind: MountKind::Video, engine, source: source.to_string(), tasks });
        Ok(Configured::Created)
    }

    fn swap_source(&mut self, source: &str) -> Configured {
        let layout = self.layout();
        let restyle_delay = self.config.restyle_delay();
        let Some(mounted) = self.mounted.as_mut() else {
            return Configured::Unchanged;
        };

        let resume_at = mounted.engine.current_time();
        mounted.tasks.cancel();
        mounted.tasks = CancellationToken::new();
        mounted.source = source.to_string();

        mounted.engine.set_src(source);
        mounted.engine.load();
        info!(source, resume_at, "Swapped presenter source");

        let engine = Arc::clone(&mounted.engine);
        let tasks = mounted.tasks.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tasks.cancelled() => {}
                _ = resume_after_swap(engine, resume_at, layout, restyle_delay) => {}
            }
        });
        Configured::Swapped
    }

    fn configure_audio(&mut self, source: &str) -> Result<Configured> {
        if self.mounted.as_ref().is_some_and(|m| m.kind == MountKind::Audio && m.source == source) {
            return Ok(Configured::Unchanged);
        }

        self.unmount();
        self.deferred = None;

        let engine = match self.factory.create(&self.audio_slot, EngineOptions::native_audio(source)) {
            Ok(engine) => engine,
            Err(PlaybackError::NodeUnavailable { .. }) => return Ok(Configured::Deferred),
            Err(e) => return Err(e),
        };

        let tasks = CancellationToken::new();
        if let Some(timestamp) = self.timestamp {
            tokio::spawn(seek_on_metadata(Arc::clone(&engine), timestamp, tasks.clone()));
        }

        info!(source, "Mounted native audio element");
        self.mount(Mounted { kind: MountKind::Audio, engine, source: source.to_string(), tasks });
        Ok(Configured::AudioOnly)
    }

    fn mount(&mut self, mounted: Mounted) {
        self.handle.send_replace(Some(Arc::clone(&mounted.engine)));
        self.mounted = Some(mounted);
    }

    fn unmount(&mut self) {
        if let Some(m) = self.mounted.take() {
            m.tasks.cancel();
            m.engine.pause();
            dispose_quietly(m.engine.as_ref());
            debug!(kind = ?m.kind, "Unmounted primary engine");
            self.handle.send_replace(None);
        }
    }

    /// Jump to `seconds`; a no-op without a mounted engine.
    pub fn seek(&self, seconds: f64) {
        match &self.mounted {
            Some(m) => m.engine.set_current_time(seconds),
            None => trace!(seconds, "Seek ignored, no engine mounted"),
        }
    }

    /// Requested start position from the route or a section click.
    ///
    /// Applied immediately when an engine is mounted, and remembered so a
    /// later audio element can seek once its metadata is known.
    pub fn set_timestamp(&mut self, timestamp: Option<f64>) {
        self.timestamp = timestamp.filter(|t| t.is_finite());
        if let Some(t) = self.timestamp {
            self.seek(t);
        }
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    /// Update the clip the "open in new tab" control links to.
    pub fn set_clip_id(&mut self, clip_id: Option<&str>) {
        self.clip_id = clip_id.map(str::to_string);
        let layout = self.layout();
        if let Some(m) = self.mounted.as_ref().filter(|m| m.kind == MountKind::Video) {
            if m.engine.ready_state().has_current_data() {
                m.engine.apply_layout(&layout);
            }
        }
    }

    pub async fn play(&self) -> Result<()> {
        match &self.mounted {
            Some(m) => m.engine.play().await,
            None => Ok(()),
        }
    }

    pub fn pause(&self) {
        if let Some(m) = &self.mounted {
            m.engine.pause();
        }
    }

    pub fn current_time(&self) -> Option<f64> {
        self.mounted.as_ref().map(|m| m.engine.current_time())
    }

    /// Pause and dispose the mounted engine.
    pub fn dispose(&mut self) {
        self.deferred = None;
        self.unmount();
    }
}

impl Drop for PrimaryPlayer {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Apply the layout after the engine's first ready signal.
async fn restyle_when_ready(engine: EngineHandle, layout: ControlBarLayout, cancel: CancellationToken) {
    let ready = tokio::select! {
        _ = cancel.cancelled() => return,
        ready = engine.ready() => ready,
    };
    if let Err(e) = ready {
        warn!("Presenter engine never became ready: {}", e);
        return;
    }
    engine.apply_layout(&layout);
}

async fn resume_after_swap(
    engine: EngineHandle,
    resume_at: f64,
    layout: ControlBarLayout,
    restyle_delay: Duration,
) {
    if let Err(e) = engine.ready().await {
        warn!("Presenter engine failed after source swap: {}", e);
        return;
    }
    engine.set_current_time(resume_at);
    log_play_result(EngineKind::Presenter, engine.play().await);

    engine.apply_layout(&layout);
    tokio::time::sleep(restyle_delay).await;
    if !engine.is_disposed() {
        engine.apply_layout(&layout);
    }
}

async fn seek_on_metadata(engine: EngineHandle, timestamp: f64, cancel: CancellationToken) {
    let mut events = engine.subscribe();
    if engine.duration().is_none() {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => event,
            };
            match event {
                Ok(EngineEvent::LoadedMetadata { .. }) => break,
                Ok(EngineEvent::Disposed) | Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                _ => {}
            }
        }
    }
    debug!(timestamp, "Seeking audio element after metadata");
    engine.set_current_time(timestamp);
}

/// Autoplay rejections leave the engine paused until a user gesture.
pub(crate) fn log_play_result(kind: EngineKind, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(PlaybackError::AutoplayRejected { reason }) => {
            info!(engine = kind.as_str(), "Autoplay blocked, staying paused: {}", reason)
        }
        Err(e) => warn!(engine = kind.as_str(), "Play failed: {}", e),
    }
}
