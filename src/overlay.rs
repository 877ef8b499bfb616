//! Marker overlay controller
//!
//! Bridges the [`MarkerIndex`] to scrub-bar ticks and to "slide changed"
//! events. The controller is a plain state machine fed with primary engine
//! events; it never touches an engine itself. Seeks it wants applied are
//! returned to the caller.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::catalog::SlidesUriToIndexMap;
use crate::markers::{MarkerCache, MarkerIndex};
use crate::types::{Marker, SlideClipRange, format_time};

/// Events the overlay reports to the rest of the course view.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    /// Whether any marker is active at the current position
    SlidePresenceChanged(bool),
    /// Playback reached a new slide; `slide_num` is 1-based
    SlideChanged { section_id: String, slide_num: u32 },
    /// The current marker was (re)selected by a click, seek or pause
    MarkerActivated(Marker),
    /// Playback left (`true`) or re-entered the current slide's clip range
    AwayFromSlide(bool),
}

/// A rendered marker on the scrub bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub time: f64,
    /// Offset from the start of the bar, in percent of the duration
    pub left_percent: f64,
    pub label: String,
    /// Playback is at or past this tick
    pub passed: bool,
    marker: usize,
}

/// A requested jump to a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerJump {
    pub time: f64,
    pub marker: Marker,
}

#[derive(Debug)]
pub struct MarkerOverlay {
    markers: Arc<[Marker]>,
    cache: MarkerCache,
    index: Arc<MarkerIndex>,
    slides: Arc<SlidesUriToIndexMap>,
    ticks: Vec<Tick>,
    auto_sync: bool,
    seeking: bool,
    last_synced: Option<f64>,
    has_slide: Option<bool>,
    clip_range: Option<SlideClipRange>,
    away: Option<bool>,
    pending_timestamp: Option<f64>,
    hover_tolerance: f64,
}

impl MarkerOverlay {
    pub fn new(hover_tolerance: f64) -> Self {
        Self {
            markers: Arc::from(Vec::new()),
            cache: MarkerCache::new(),
            index: Arc::default(),
            slides: Arc::default(),
            ticks: Vec::new(),
            auto_sync: true,
            seeking: false,
            last_synced: None,
            has_slide: None,
            clip_range: None,
            away: None,
            pending_timestamp: None,
            hover_tolerance,
        }
    }

    /// Replace the marker collection. Ticks are rebuilt on the next metadata.
    pub fn set_markers(&mut self, markers: Arc<[Marker]>) {
        self.index = self.cache.index_for(&markers);
        self.markers = markers;
        self.ticks.clear();
        self.last_synced = None;
        debug!(count = self.markers.len(), "Overlay markers replaced");
    }

    pub fn markers(&self) -> &Arc<[Marker]> {
        &self.markers
    }

    pub fn set_slide_index(&mut self, slides: Arc<SlidesUriToIndexMap>) {
        self.slides = slides;
    }

    /// Disabling keeps resolution and colouring but suppresses route events.
    pub fn set_auto_sync(&mut self, enabled: bool) {
        self.auto_sync = enabled;
    }

    pub fn auto_sync(&self) -> bool {
        self.auto_sync
    }

    pub fn set_pending_timestamp(&mut self, timestamp: Option<f64>) {
        self.pending_timestamp = timestamp.filter(|t| t.is_finite());
    }

    pub fn set_clip_range(&mut self, range: Option<SlideClipRange>) {
        self.clip_range = range;
        self.away = None;
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn has_slide_at_current_time(&self) -> bool {
        self.has_slide.unwrap_or(false)
    }

    /// Render ticks for every marker inside the media and return the pending
    /// start position to seek to, if any. The start position is consumed.
    pub fn on_loaded_metadata(&mut self, duration: f64) -> Option<f64> {
        self.render_ticks(duration);
        self.pending_timestamp.take().filter(|t| *t > 0.0)
    }

    /// Rebuild ticks against a known duration, leaving the start position.
    pub fn render_ticks(&mut self, duration: f64) {
        self.ticks = if duration.is_finite() && duration > 0.0 {
            self.markers
                .iter()
                .enumerate()
                .filter(|(_, m)| m.time < duration)
                .map(|(i, m)| Tick {
                    time: m.time,
                    left_percent: m.time / duration * 100.0,
                    label: m.label.clone(),
                    passed: false,
                    marker: i,
                })
                .collect()
        } else {
            Vec::new()
        };
        debug!(ticks = self.ticks.len(), duration, "Rendered marker ticks");
    }

    pub fn on_time_update(&mut self, time: f64) -> Vec<OverlayEvent> {
        let mut events = Vec::new();
        for tick in &mut self.ticks {
            tick.passed = time >= tick.time;
        }

        let latest = self.index.latest_at_or_before(time).cloned();
        let has_slide = latest.is_some();
        if self.has_slide != Some(has_slide) {
            self.has_slide = Some(has_slide);
            events.push(OverlayEvent::SlidePresenceChanged(has_slide));
        }

        if let Some(range) = self.clip_range {
            let away = range.is_away(time);
            if self.away != Some(away) {
                self.away = Some(away);
                events.push(OverlayEvent::AwayFromSlide(away));
            }
        }

        match latest {
            Some(marker) if !self.seeking => events.extend(self.route_event(&marker)),
            Some(_) => trace!(time, "Seek in progress, route write suspended"),
            None => self.last_synced = None,
        }
        events
    }

    fn route_event(&mut self, marker: &Marker) -> Option<OverlayEvent> {
        if !self.auto_sync {
            return None;
        }
        let section_id = marker.data.section_id.as_str();
        if section_id.is_empty() {
            return None;
        }
        let slide_index = *self.slides.get(section_id)?.get(&marker.data.slide_uri)?;
        if self.last_synced == Some(marker.time) {
            return None;
        }

        self.last_synced = Some(marker.time);
        Some(OverlayEvent::SlideChanged {
            section_id: section_id.to_string(),
            slide_num: slide_index as u32 + 1,
        })
    }

    pub fn on_seeking(&mut self) {
        self.seeking = true;
    }

    /// A new primary engine mounted; a seek on the old one never completes.
    pub fn on_remount(&mut self) {
        if self.seeking {
            debug!("Seek abandoned by remount");
        }
        self.seeking = false;
        self.last_synced = None;
    }

    /// Resume route writes and apply the marker the seek landed on.
    pub fn on_seeked(&mut self, time: f64) -> Vec<OverlayEvent> {
        self.seeking = false;
        self.settle(time)
    }

    /// Re-resolve in case playback stopped exactly on a boundary.
    pub fn on_pause(&mut self, time: f64) -> Vec<OverlayEvent> {
        self.settle(time)
    }

    fn settle(&mut self, time: f64) -> Vec<OverlayEvent> {
        let mut events = self.on_time_update(time);
        if let Some(marker) = self.index.latest_at_or_before(time) {
            events.push(OverlayEvent::MarkerActivated(marker.clone()));
        }
        events
    }

    /// Tooltip text of the tick at `tick`.
    pub fn tooltip(&self, tick: usize) -> Option<String> {
        self.ticks.get(tick).map(|t| tooltip_text(&t.label, t.time))
    }

    /// Tooltip for a hover at `time` on the scrub bar.
    pub fn tooltip_at(&self, time: f64) -> Option<String> {
        self.index
            .marker_near(time, self.hover_tolerance)
            .map(|m| tooltip_text(&m.label, m.time))
    }

    /// Clicking a tick jumps to its marker.
    pub fn click(&self, tick: usize) -> Option<MarkerJump> {
        let tick = self.ticks.get(tick)?;
        let marker = self.markers.get(tick.marker)?.clone();
        Some(MarkerJump { time: marker.time, marker })
    }
}

fn tooltip_text(label: &str, time: f64) -> String {
    format!("{label} - {}s", format_time(time))
}
