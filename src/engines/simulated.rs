//! In-process media engine with an explicitly advanced clock
//!
//! Used for headless replays and for every test of the players. The engine
//! behaves like a browser media element: `load()` resets the position and
//! pauses, metadata and the ready signal follow (immediately, or when
//! [`SimulatedEngine::finish_loading`] is called in manual-ready mode), and
//! programmatic seeks fire `seeking`/`seeked`/`timeupdate`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

use crate::engine::{
    ControlBarLayout, ElementSlot, EngineEvent, EngineFactory, EngineHandle, EngineKind,
    EngineOptions, MediaEngine, ReadyState,
};
use crate::{PlaybackError, Result};

/// Duration reported for sources without a registered duration.
pub const DEFAULT_DURATION: f64 = 3600.0;

const EVENT_CAPACITY: usize = 256;

/// Host behaviour shared by a factory and every engine it creates.
#[derive(Debug, Default)]
struct HostBehavior {
    block_autoplay: AtomicBool,
    fail_dispose: AtomicBool,
    fail_creation: AtomicBool,
    manual_ready: AtomicBool,
    durations: Mutex<HashMap<String, f64>>,
}

impl HostBehavior {
    fn duration_of(&self, src: &str) -> f64 {
        lock(&self.durations).get(src).copied().unwrap_or(DEFAULT_DURATION)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct LoadStatus {
    ready: bool,
    disposed: bool,
}

#[derive(Debug)]
struct EngineState {
    src: Option<String>,
    time: f64,
    duration: Option<f64>,
    paused: bool,
    muted: bool,
    playback_rate: f64,
    ready_state: ReadyState,
    loads: u32,
    layouts: Vec<ControlBarLayout>,
}

/// A simulated media element.
#[derive(Debug)]
pub struct SimulatedEngine {
    id: u32,
    kind: EngineKind,
    slot: String,
    options: EngineOptions,
    host: Arc<HostBehavior>,
    state: Mutex<EngineState>,
    status: watch::Sender<LoadStatus>,
    events: broadcast::Sender<EngineEvent>,
}

impl SimulatedEngine {
    fn new(id: u32, slot: &ElementSlot, options: EngineOptions, host: Arc<HostBehavior>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(LoadStatus::default());
        let state = EngineState {
            src: None,
            time: 0.0,
            duration: None,
            paused: true,
            muted: options.muted,
            playback_rate: 1.0,
            ready_state: ReadyState::HaveNothing,
            loads: 0,
            layouts: Vec::new(),
        };

        Self {
            id,
            kind: options.kind,
            slot: slot.name().to_string(),
            options,
            host,
            state: Mutex::new(state),
            status,
            events,
        }
    }

    fn emit(&self, event: EngineEvent) {
        trace!(engine = self.id, ?event, "Engine event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        lock(&self.state)
    }

    /// Creation sequence number within the factory
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn slot_name(&self) -> &str {
        &self.slot
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_muted(&self) -> bool {
        self.state().muted
    }

    /// How many times a source was loaded
    pub fn load_count(&self) -> u32 {
        self.state().loads
    }

    /// Every layout applied so far, oldest first
    pub fn layouts(&self) -> Vec<ControlBarLayout> {
        self.state().layouts.clone()
    }

    pub fn set_playback_rate(&self, rate: f64) {
        self.state().playback_rate = rate.clamp(0.1, 10.0);
    }

    /// Complete a pending load: report metadata and signal ready.
    pub fn finish_loading(&self) {
        let duration = {
            let mut state = self.state();
            if self.status.borrow().disposed {
                return;
            }
            let Some(src) = state.src.clone() else { return };
            let duration = self.host.duration_of(&src);
            state.duration = Some(duration);
            state.ready_state = ReadyState::HaveEnoughData;
            duration
        };

        self.emit(EngineEvent::LoadedMetadata { duration });
        self.status.send_modify(|s| s.ready = true);
        self.emit(EngineEvent::Ready);
    }

    /// Advance the playback clock by `seconds` of wall time.
    ///
    /// Does nothing while paused. Reaching the end pauses the engine.
    pub fn advance(&self, seconds: f64) {
        let (time, ended) = {
            let mut state = self.state();
            if state.paused || self.status.borrow().disposed {
                return;
            }
            let end = state.duration.unwrap_or(f64::INFINITY);
            state.time = (state.time + seconds * state.playback_rate).min(end);
            let ended = state.time >= end;
            if ended {
                state.paused = true;
            }
            (state.time, ended)
        };

        self.emit(EngineEvent::TimeUpdate { time });
        if ended {
            self.emit(EngineEvent::Pause);
        }
    }

    /// A learner dragging the scrub bar: a seek that starts and ends later.
    pub fn begin_user_seek(&self, time: f64) {
        self.emit(EngineEvent::Seeking { time });
    }

    pub fn end_user_seek(&self, time: f64) {
        self.state().time = time.max(0.0);
        self.emit(EngineEvent::Seeked { time });
        self.emit(EngineEvent::TimeUpdate { time });
    }

    /// A learner pressing play; user gestures are never blocked.
    pub fn user_play(&self) {
        let was_paused = std::mem::replace(&mut self.state().paused, false);
        if was_paused {
            self.emit(EngineEvent::Play);
        }
    }
}

#[async_trait::async_trait]
impl MediaEngine for SimulatedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn current_src(&self) -> Option<String> {
        self.state().src.clone()
    }

    fn set_src(&self, src: &str) {
        self.state().src = Some(src.to_string());
        self.emit(EngineEvent::SourceChanged { src: src.to_string() });
    }

    fn load(&self) {
        if self.status.borrow().disposed {
            return;
        }
        let was_playing = {
            let mut state = self.state();
            state.loads += 1;
            state.time = 0.0;
            state.duration = None;
            state.ready_state = ReadyState::HaveNothing;
            !std::mem::replace(&mut state.paused, true)
        };
        self.status.send_modify(|s| s.ready = false);
        debug!(engine = self.id, kind = self.kind.as_str(), src = ?self.current_src(), "Loading source");

        if was_playing {
            self.emit(EngineEvent::Pause);
        }
        if !self.host.manual_ready.load(Ordering::SeqCst) {
            self.finish_loading();
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.state().ready_state
    }

    async fn ready(&self) -> Result<()> {
        let mut rx = self.status.subscribe();
        let status = *rx
            .wait_for(|s| s.ready || s.disposed)
            .await
            .map_err(|_| PlaybackError::engine_failed("engine dropped before ready"))?;

        if status.disposed {
            return Err(PlaybackError::engine_failed("engine disposed before ready"));
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state().time
    }

    fn set_current_time(&self, seconds: f64) {
        if self.status.borrow().disposed || !seconds.is_finite() {
            return;
        }
        let time = {
            let mut state = self.state();
            let end = state.duration.unwrap_or(f64::INFINITY);
            state.time = seconds.clamp(0.0, end);
            state.time
        };
        self.emit(EngineEvent::Seeking { time });
        self.emit(EngineEvent::Seeked { time });
        self.emit(EngineEvent::TimeUpdate { time });
    }

    fn duration(&self) -> Option<f64> {
        self.state().duration
    }

    fn paused(&self) -> bool {
        self.state().paused
    }

    async fn play(&self) -> Result<()> {
        if self.status.borrow().disposed {
            return Err(PlaybackError::engine_failed("play on a disposed engine"));
        }
        let blocked = self.host.block_autoplay.load(Ordering::SeqCst);
        let was_paused = {
            let mut state = self.state();
            if blocked && !state.muted {
                return Err(PlaybackError::autoplay_rejected(
                    "play() can only be initiated by a user gesture",
                ));
            }
            std::mem::replace(&mut state.paused, false)
        };
        if was_paused {
            self.emit(EngineEvent::Play);
        }
        Ok(())
    }

    fn pause(&self) {
        let was_paused = std::mem::replace(&mut self.state().paused, true);
        if !was_paused {
            self.emit(EngineEvent::Pause);
        }
    }

    fn set_muted(&self, muted: bool) {
        self.state().muted = muted;
    }

    fn apply_layout(&self, layout: &ControlBarLayout) {
        self.state().layouts.push(layout.clone());
    }

    fn is_disposed(&self) -> bool {
        self.status.borrow().disposed
    }

    fn dispose(&self) -> Result<()> {
        if self.status.borrow().disposed {
            return Ok(());
        }
        self.state().paused = true;
        self.status.send_modify(|s| s.disposed = true);
        self.emit(EngineEvent::Disposed);

        if self.host.fail_dispose.load(Ordering::SeqCst) {
            return Err(PlaybackError::disposal_failed(
                self.kind.as_str(),
                "element was already removed",
            ));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

/// Factory producing [`SimulatedEngine`]s and remembering each one.
#[derive(Debug, Default, Clone)]
pub struct SimulatedFactory {
    host: Arc<HostBehavior>,
    created: Arc<Mutex<Vec<Arc<SimulatedEngine>>>>,
}

impl SimulatedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block unmuted `play()` calls like a browser without a user gesture.
    pub fn set_autoplay_blocked(&self, blocked: bool) {
        self.host.block_autoplay.store(blocked, Ordering::SeqCst);
    }

    /// Make every `dispose()` fail after tearing the engine down.
    pub fn set_dispose_fails(&self, fails: bool) {
        self.host.fail_dispose.store(fails, Ordering::SeqCst);
    }

    pub fn set_creation_fails(&self, fails: bool) {
        self.host.fail_creation.store(fails, Ordering::SeqCst);
    }

    /// Hold loads until [`SimulatedEngine::finish_loading`] is called.
    pub fn set_manual_ready(&self, manual: bool) {
        self.host.manual_ready.store(manual, Ordering::SeqCst);
    }

    pub fn set_duration(&self, src: &str, duration: f64) {
        lock(&self.host.durations).insert(src.to_string(), duration);
    }

    /// Every engine created so far, oldest first
    pub fn created(&self) -> Vec<Arc<SimulatedEngine>> {
        lock(&self.created).clone()
    }

    pub fn created_of(&self, kind: EngineKind) -> Vec<Arc<SimulatedEngine>> {
        lock(&self.created).iter().filter(|e| e.kind == kind).cloned().collect()
    }

    /// The most recently created engine of `kind`
    pub fn latest(&self, kind: EngineKind) -> Option<Arc<SimulatedEngine>> {
        lock(&self.created).iter().rev().find(|e| e.kind == kind).cloned()
    }
}

impl EngineFactory for SimulatedFactory {
    fn create(&self, slot: &ElementSlot, options: EngineOptions) -> Result<EngineHandle> {
        if !slot.is_attached() {
            return Err(PlaybackError::node_unavailable(slot.name()));
        }
        if self.host.fail_creation.load(Ordering::SeqCst) {
            return Err(PlaybackError::engine_failed(format!(
                "could not create {} engine",
                options.kind.as_str()
            )));
        }

        let source = options.source.clone();
        let mut created = lock(&self.created);
        let id = created.len() as u32;
        let engine = Arc::new(SimulatedEngine::new(id, slot, options, Arc::clone(&self.host)));
        created.push(Arc::clone(&engine));
        drop(created);

        debug!(engine = id, kind = engine.kind.as_str(), slot = slot.name(), "Created engine");
        engine.set_src(&source);
        engine.load();
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presenter(factory: &SimulatedFactory, src: &str) -> Arc<SimulatedEngine> {
        let slot = ElementSlot::attached("presenter");
        factory.create(&slot, EngineOptions::presenter(src, vec![1.0])).unwrap();
        factory.latest(EngineKind::Presenter).unwrap()
    }

    #[tokio::test]
    async fn load_signals_ready_and_metadata() {
        let factory = SimulatedFactory::new();
        factory.set_duration("a.mp4", 120.0);
        let engine = presenter(&factory, "a.mp4");

        engine.ready().await.unwrap();
        assert_eq!(engine.duration(), Some(120.0));
        assert!(engine.ready_state().has_current_data());
        assert_eq!(engine.load_count(), 1);
    }

    #[tokio::test]
    async fn clock_only_advances_while_playing() {
        let factory = SimulatedFactory::new();
        factory.set_duration("a.mp4", 10.0);
        let engine = presenter(&factory, "a.mp4");
        let mut events = engine.subscribe();

        engine.advance(5.0);
        assert_eq!(engine.current_time(), 0.0);

        engine.play().await.unwrap();
        engine.advance(4.0);
        assert_eq!(engine.current_time(), 4.0);

        engine.advance(100.0);
        assert_eq!(engine.current_time(), 10.0);
        assert!(engine.paused());

        assert_eq!(events.recv().await.unwrap(), EngineEvent::Play);
        assert_eq!(events.recv().await.unwrap(), EngineEvent::TimeUpdate { time: 4.0 });
    }

    #[tokio::test]
    async fn autoplay_blocks_only_unmuted_engines() {
        let factory = SimulatedFactory::new();
        factory.set_autoplay_blocked(true);
        let engine = presenter(&factory, "a.mp4");

        let err = engine.play().await.unwrap_err();
        assert!(matches!(err, PlaybackError::AutoplayRejected { .. }));
        assert!(engine.paused());

        engine.set_muted(true);
        engine.play().await.unwrap();
        assert!(!engine.paused());
    }

    #[tokio::test]
    async fn failing_dispose_still_tears_down() {
        let factory = SimulatedFactory::new();
        factory.set_dispose_fails(true);
        let engine = presenter(&factory, "a.mp4");

        assert!(matches!(engine.dispose(), Err(PlaybackError::Disposal { .. })));
        assert!(engine.is_disposed());
        assert!(engine.dispose().is_ok());
    }

    #[tokio::test]
    async fn manual_ready_holds_until_finished() {
        let factory = SimulatedFactory::new();
        factory.set_manual_ready(true);
        let engine = presenter(&factory, "a.mp4");
        assert_eq!(engine.ready_state(), ReadyState::HaveNothing);

        let waiter = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.ready().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        engine.finish_loading();
        waiter.await.unwrap().unwrap();
    }

    #[test]
    fn detached_slot_is_unavailable() {
        let factory = SimulatedFactory::new();
        let slot = ElementSlot::detached("presentation");
        let err = factory.create(&slot, EngineOptions::presentation("p.mp4")).err().unwrap();
        assert!(matches!(err, PlaybackError::NodeUnavailable { .. }));
        assert!(factory.created().is_empty());
    }
}
