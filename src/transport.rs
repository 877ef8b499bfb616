//! Synchronized transport over the presenter and presentation players

use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::adapters::primary::log_play_result;
use crate::adapters::{Configured, PrimaryPlayer, SecondaryInputs, SecondaryPlayer, SecondaryState};
use crate::catalog::SlidesUriToIndexMap;
use crate::config::SyncConfig;
use crate::driver::{Driver, DriverInputs, lock_overlay};
use crate::engine::{ElementSlot, EngineFactory, EngineHandle, EngineKind};
use crate::engines::TIMEUPDATE_HZ;
use crate::overlay::{MarkerJump, MarkerOverlay, OverlayEvent, Tick};
use crate::stream::ThrottleExt;
use crate::types::{Marker, SlideClipRange, UpdateRate};

/// Element slots the players bind their engines to.
#[derive(Debug, Clone)]
pub struct PlayerSlots {
    pub presenter: ElementSlot,
    pub audio: ElementSlot,
    pub presentation: ElementSlot,
}

impl PlayerSlots {
    /// All three slots already attached.
    pub fn attached() -> Self {
        Self {
            presenter: ElementSlot::attached("presenter"),
            audio: ElementSlot::attached("audio"),
            presentation: ElementSlot::attached("presentation"),
        }
    }
}

/// Both players behind one `play / pause / seek / current_time` surface.
///
/// The primary player drives; the presentation recording and the marker
/// overlay follow it through the driver tasks spawned on construction.
/// Dropping the transport stops those tasks and disposes both engines.
pub struct SynchronizedTransport {
    primary: PrimaryPlayer,
    secondary: SecondaryPlayer,
    overlay: Arc<Mutex<MarkerOverlay>>,
    events: broadcast::Sender<OverlayEvent>,
    positions: watch::Receiver<Option<f64>>,
    config: Arc<SyncConfig>,
    cancel: CancellationToken,
}

impl SynchronizedTransport {
    /// Build both players and start synchronizing; must be called from
    /// within a tokio runtime.
    pub fn new(factory: Arc<dyn EngineFactory>, slots: PlayerSlots, config: Arc<SyncConfig>) -> Self {
        let primary =
            PrimaryPlayer::new(Arc::clone(&factory), slots.presenter, slots.audio, Arc::clone(&config));
        let secondary =
            SecondaryPlayer::new(factory, slots.presentation, Arc::clone(&config), primary.watch_engine());
        let overlay = Arc::new(Mutex::new(MarkerOverlay::new(config.marker_hover_tolerance)));

        let channels = Driver::spawn(DriverInputs {
            primary: primary.watch_engine(),
            secondary: secondary.watch_engine(),
            overlay: Arc::clone(&overlay),
            drift_threshold: config.drift_threshold,
            event_capacity: config.event_capacity,
        });
        info!(drift_threshold = config.drift_threshold, "Synchronized transport started");

        Self {
            primary,
            secondary,
            overlay,
            events: channels.events,
            positions: channels.positions,
            config,
            cancel: channels.cancel,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mount `source` on the primary player.
    pub async fn configure(&mut self, source: &str, audio_only: bool) -> Result<Configured> {
        self.primary.configure(source, audio_only).await
    }

    pub async fn retry_deferred(&mut self) -> Result<Configured> {
        self.primary.retry_deferred().await
    }

    /// Show, hide or resync the presentation recording.
    pub async fn update_secondary(&mut self, inputs: SecondaryInputs) -> Result<SecondaryState> {
        self.secondary.reconcile(inputs).await
    }

    pub async fn play(&self) -> Result<()> {
        self.primary.play().await?;
        if let Some(secondary) = self.secondary.engine() {
            log_play_result(EngineKind::Presentation, secondary.play().await);
        }
        Ok(())
    }

    pub fn pause(&self) {
        self.primary.pause();
        if let Some(secondary) = self.secondary.engine() {
            secondary.pause();
        }
    }

    pub fn seek(&self, seconds: f64) {
        self.primary.seek(seconds);
        if let Some(secondary) = self.secondary.engine() {
            secondary.set_current_time(seconds);
        }
    }

    /// Primary playback position, `None` while nothing is mounted.
    pub fn current_time(&self) -> Option<f64> {
        self.primary.current_time()
    }

    pub fn is_audio_only(&self) -> bool {
        self.primary.is_audio_only()
    }

    pub fn primary_engine(&self) -> Option<EngineHandle> {
        self.primary.engine()
    }

    pub fn secondary_engine(&self) -> Option<EngineHandle> {
        self.secondary.engine()
    }

    pub fn secondary_state(&self) -> SecondaryState {
        self.secondary.state()
    }

    pub fn set_markers(&self, markers: impl Into<Arc<[Marker]>>) {
        let markers = markers.into();
        debug!(count = markers.len(), "Markers replaced");
        let mut overlay = lock_overlay(&self.overlay);
        overlay.set_markers(markers);
        // Ticks need the duration; an already loaded engine won't report it again
        if let Some(duration) = self.primary.engine().and_then(|e| e.duration()) {
            overlay.render_ticks(duration);
        }
    }

    pub fn set_slide_index(&self, slides: Arc<SlidesUriToIndexMap>) {
        lock_overlay(&self.overlay).set_slide_index(slides);
    }

    /// Enable or suppress route updates from playback.
    pub fn set_auto_sync(&self, enabled: bool) {
        lock_overlay(&self.overlay).set_auto_sync(enabled);
    }

    pub fn auto_sync(&self) -> bool {
        lock_overlay(&self.overlay).auto_sync()
    }

    /// Requested start position; seeks now and again once metadata loads.
    pub fn set_timestamp(&mut self, timestamp: Option<f64>) {
        self.primary.set_timestamp(timestamp);
        lock_overlay(&self.overlay).set_pending_timestamp(timestamp);
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.primary.timestamp()
    }

    pub fn set_clip_range(&self, range: Option<SlideClipRange>) {
        lock_overlay(&self.overlay).set_clip_range(range);
    }

    pub fn set_clip_id(&mut self, clip_id: Option<&str>) {
        self.primary.set_clip_id(clip_id);
    }

    pub fn ticks(&self) -> Vec<Tick> {
        lock_overlay(&self.overlay).ticks().to_vec()
    }

    pub fn tooltip(&self, tick: usize) -> Option<String> {
        lock_overlay(&self.overlay).tooltip(tick)
    }

    pub fn tooltip_at(&self, time: f64) -> Option<String> {
        lock_overlay(&self.overlay).tooltip_at(time)
    }

    pub fn has_slide_at_current_time(&self) -> bool {
        lock_overlay(&self.overlay).has_slide_at_current_time()
    }

    /// Jump to the marker behind tick `tick` and announce it.
    pub fn click_marker(&self, tick: usize) -> Option<MarkerJump> {
        let jump = lock_overlay(&self.overlay).click(tick)?;
        self.seek(jump.time);
        // Nobody listening is fine
        let _ = self.events.send(OverlayEvent::MarkerActivated(jump.marker.clone()));
        Some(jump)
    }

    /// Raw overlay event receiver, for coordinators that run their own task.
    pub fn subscribe_events(&self) -> broadcast::Receiver<OverlayEvent> {
        self.events.subscribe()
    }

    /// Overlay events from now on; lagged events are skipped.
    pub fn overlay_events(&self) -> impl Stream<Item = OverlayEvent> + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| async move { event.ok() })
    }

    /// Primary playback positions at no more than `rate`.
    ///
    /// Yields the current position first when one is known. Gaps while the
    /// primary remounts are skipped rather than ending the stream.
    pub fn positions(&self, rate: UpdateRate) -> impl Stream<Item = f64> + 'static {
        let positions = WatchStream::new(self.positions.clone()).filter_map(|opt| async move { opt });
        match rate.throttle_interval(TIMEUPDATE_HZ) {
            None => positions.boxed(),
            Some(interval) => positions.throttle(interval).boxed(),
        }
    }

    pub fn secondary_states(&self) -> impl Stream<Item = SecondaryState> + 'static {
        WatchStream::new(self.secondary.watch_state())
    }

    /// Dispose both engines but keep synchronizing whatever mounts next.
    pub async fn unmount(&mut self) -> Result<()> {
        self.secondary.reconcile(SecondaryInputs::default()).await?;
        self.primary.dispose();
        Ok(())
    }

    /// Stop synchronizing and dispose both engines.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.secondary.shutdown();
        self.primary.dispose();
        info!("Synchronized transport shut down");
    }
}

impl Drop for SynchronizedTransport {
    fn drop(&mut self) {
        debug!("Dropping synchronized transport");
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MediaEngine;
    use crate::engines::SimulatedFactory;
    use crate::test_utils::{marker, slide_index};
    use std::time::Duration;

    fn transport() -> (SimulatedFactory, SynchronizedTransport) {
        let factory = SimulatedFactory::new();
        let transport = SynchronizedTransport::new(
            Arc::new(factory.clone()),
            PlayerSlots::attached(),
            Arc::new(SyncConfig::default()),
        );
        (factory, transport)
    }

    fn presentation_inputs(url: &str) -> SecondaryInputs {
        SecondaryInputs { presentation_url: Some(url.into()), ..Default::default() }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn seek_fans_out_to_both_engines() {
        let (_factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        transport.update_secondary(presentation_inputs("slides.mp4")).await.unwrap();
        settle().await;

        transport.seek(42.0);
        settle().await;

        assert_eq!(transport.current_time(), Some(42.0));
        let secondary = transport.secondary_engine().unwrap();
        assert!((secondary.current_time() - 42.0).abs() <= 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn play_and_pause_reach_the_presentation() {
        let (_factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        transport.update_secondary(presentation_inputs("slides.mp4")).await.unwrap();
        settle().await;

        transport.play().await.unwrap();
        settle().await;
        let secondary = transport.secondary_engine().unwrap();
        assert!(!secondary.paused());

        transport.pause();
        settle().await;
        assert!(secondary.paused());
        assert!(transport.primary_engine().unwrap().paused());
    }

    #[tokio::test(start_paused = true)]
    async fn clicking_a_tick_seeks_and_announces_the_marker() {
        let (_factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        transport.set_slide_index(Arc::new(slide_index("sec", &["a", "b"])));
        transport.set_markers(vec![marker(0.0, "sec", "a"), marker(30.0, "sec", "b")]);
        settle().await;
        assert_eq!(transport.ticks().len(), 2);
        assert_eq!(transport.tooltip(1).as_deref(), Some("Section sec - 0:30s"));

        let mut events = transport.subscribe_events();
        let jump = transport.click_marker(1).unwrap();
        assert_eq!(jump.time, 30.0);
        assert_eq!(transport.current_time(), Some(30.0));

        let first = events.recv().await.unwrap();
        assert!(matches!(first, OverlayEvent::MarkerActivated(m) if m.time == 30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_markers_keeps_the_requested_start() {
        let (_factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        settle().await;

        transport.set_timestamp(Some(42.0));
        transport.set_markers(vec![marker(0.0, "sec", "a"), marker(30.0, "sec", "b")]);
        assert_eq!(transport.ticks().len(), 2);

        // A reload seeks back to the requested start once metadata arrives
        transport.primary_engine().unwrap().load();
        settle().await;
        assert_eq!(transport.current_time(), Some(42.0));
    }

    #[tokio::test(start_paused = true)]
    async fn positions_follow_the_primary() {
        let (factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        let mut positions = transport.positions(UpdateRate::Native);
        settle().await;

        let presenter = factory.latest(EngineKind::Presenter).unwrap();
        presenter.set_current_time(12.0);
        let first = tokio::time::timeout(Duration::from_secs(1), positions.next()).await.unwrap();
        assert_eq!(first, Some(12.0));
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_state_stream_reports_hide() {
        let (_factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        let mut states = transport.secondary_states();
        assert_eq!(states.next().await, Some(SecondaryState::Hidden));

        transport.update_secondary(presentation_inputs("slides.mp4")).await.unwrap();
        assert_eq!(states.next().await, Some(SecondaryState::Active { source: "slides.mp4".into() }));

        let hidden = SecondaryInputs { audio_only: true, ..presentation_inputs("slides.mp4") };
        transport.update_secondary(hidden).await.unwrap();
        assert_eq!(states.next().await, Some(SecondaryState::Hidden));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disposes_both_engines() {
        let (_factory, mut transport) = transport();
        transport.configure("presenter.mp4", false).await.unwrap();
        transport.update_secondary(presentation_inputs("slides.mp4")).await.unwrap();
        let primary = transport.primary_engine().unwrap();
        let secondary = transport.secondary_engine().unwrap();

        transport.shutdown();
        assert!(primary.is_disposed());
        assert!(secondary.is_disposed());
        assert_eq!(transport.current_time(), None);
    }
}
