//! Media engine seam
//!
//! A [`MediaEngine`] is one player instance bound to one media element. The
//! adapters own engines; everything else only holds read-only `Arc` handles
//! published through watch channels.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::Result;

/// Shared handle to an engine.
pub type EngineHandle = Arc<dyn MediaEngine>;

/// Native events an engine emits.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine finished initialising (or reloading) and accepts commands
    Ready,
    /// Media metadata is known
    LoadedMetadata { duration: f64 },
    Play,
    Pause,
    /// A seek gesture started
    Seeking { time: f64 },
    /// A seek gesture completed
    Seeked { time: f64 },
    /// Periodic position report while playing, and after seeks
    TimeUpdate { time: f64 },
    /// The source url was replaced
    SourceChanged { src: String },
    Disposed,
}

/// Loading progress, ordered like the HTML media `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Enough data to show the current frame.
    pub fn has_current_data(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// What an engine is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Presenter video with controls (primary)
    Presenter,
    /// Muted presentation recording without controls (secondary)
    Presentation,
    /// Plain native audio element
    NativeAudio,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Presenter => "presenter",
            EngineKind::Presentation => "presentation",
            EngineKind::NativeAudio => "audio",
        }
    }
}

/// Creation options for an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub kind: EngineKind,
    pub source: String,
    pub controls: bool,
    pub muted: bool,
    pub preload: bool,
    pub autoplay: bool,
    pub playback_rates: Vec<f64>,
}

impl EngineOptions {
    pub fn presenter(source: impl Into<String>, playback_rates: Vec<f64>) -> Self {
        Self {
            kind: EngineKind::Presenter,
            source: source.into(),
            controls: true,
            muted: false,
            preload: true,
            autoplay: false,
            playback_rates,
        }
    }

    pub fn presentation(source: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::Presentation,
            source: source.into(),
            controls: false,
            muted: true,
            preload: true,
            autoplay: false,
            playback_rates: Vec::new(),
        }
    }

    pub fn native_audio(source: impl Into<String>) -> Self {
        Self {
            kind: EngineKind::NativeAudio,
            source: source.into(),
            controls: true,
            muted: false,
            preload: true,
            autoplay: true,
            playback_rates: Vec::new(),
        }
    }
}

/// Control bar post-processing applied after the engine is ready.
///
/// Engines reset their control bar on every reload, so the adapter reapplies
/// this after each source swap.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlBarLayout {
    pub padding_top_px: u32,
    pub padding_bottom_px: u32,
    pub progress_margin_top_px: u32,
    /// Pin the bar to the bottom edge above captions
    pub pinned: bool,
    /// Target of the "open in new tab" button; hidden when `None`
    pub open_clip_url: Option<String>,
}

impl Default for ControlBarLayout {
    fn default() -> Self {
        Self {
            padding_top_px: 10,
            padding_bottom_px: 30,
            progress_margin_top_px: 20,
            pinned: true,
            open_clip_url: None,
        }
    }
}

impl ControlBarLayout {
    pub fn for_clip(clip_id: Option<&str>) -> Self {
        Self { open_clip_url: clip_id.filter(|c| !c.is_empty()).map(clip_page_url), ..Self::default() }
    }
}

/// Public page of a clip on the video portal.
pub fn clip_page_url(clip_id: &str) -> String {
    format!("https://www.fau.tv/clip/id/{clip_id}")
}

/// One player instance bound to one media element.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    fn kind(&self) -> EngineKind;

    /// Currently loaded source url, if any
    fn current_src(&self) -> Option<String>;

    /// Replace the source url; takes effect on the next [`load`](Self::load)
    fn set_src(&self, src: &str);

    /// (Re)load the current source
    fn load(&self);

    fn ready_state(&self) -> ReadyState;

    /// Resolve once the engine has signalled ready for the current load
    async fn ready(&self) -> Result<()>;

    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    fn duration(&self) -> Option<f64>;

    fn paused(&self) -> bool;

    /// Start playback; fails with `AutoplayRejected` when the host blocks it
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn set_muted(&self, muted: bool);

    fn apply_layout(&self, layout: &ControlBarLayout);

    fn is_disposed(&self) -> bool;

    /// Tear down the engine; may fail when the element is already gone
    fn dispose(&self) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

/// Creates engines bound to element slots.
pub trait EngineFactory: Send + Sync + 'static {
    /// Fails with `NodeUnavailable` when the slot is not attached.
    fn create(&self, slot: &ElementSlot, options: EngineOptions) -> Result<EngineHandle>;
}

/// Handle to the element an engine binds to.
///
/// Clones share attachment state. A slot starts detached when the view has
/// not rendered the element yet.
#[derive(Debug, Clone)]
pub struct ElementSlot {
    name: Arc<str>,
    attached: Arc<watch::Sender<bool>>,
}

impl ElementSlot {
    pub fn new(name: &str, attached: bool) -> Self {
        let (tx, _) = watch::channel(attached);
        Self { name: Arc::from(name), attached: Arc::new(tx) }
    }

    pub fn attached(name: &str) -> Self {
        Self::new(name, true)
    }

    pub fn detached(name: &str) -> Self {
        Self::new(name, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_attached(&self) -> bool {
        *self.attached.borrow()
    }

    pub fn attach(&self) {
        self.attached.send_replace(true);
    }

    pub fn detach(&self) {
        self.attached.send_replace(false);
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.attached.subscribe()
    }
}

/// Ignore a disposal failure; disposal is best-effort cleanup.
pub(crate) fn dispose_quietly(engine: &dyn MediaEngine) {
    if engine.is_disposed() {
        return;
    }
    if let Err(e) = engine.dispose() {
        tracing::debug!(engine = engine.kind().as_str(), "Ignoring disposal error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_clones_share_attachment() {
        let slot = ElementSlot::detached("presentation");
        let clone = slot.clone();
        assert!(!clone.is_attached());

        slot.attach();
        assert!(clone.is_attached());
        assert_eq!(clone.name(), "presentation");
    }

    #[test]
    fn layout_links_clip_page() {
        let layout = ControlBarLayout::for_clip(Some("42"));
        assert_eq!(layout.open_clip_url.as_deref(), Some("https://www.fau.tv/clip/id/42"));
        assert_eq!(ControlBarLayout::for_clip(Some("")).open_clip_url, None);
    }

    #[test]
    fn ready_state_ordering() {
        assert!(ReadyState::HaveEnoughData.has_current_data());
        assert!(!ReadyState::HaveMetadata.has_current_data());
    }
}
