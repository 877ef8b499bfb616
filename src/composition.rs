//! Slide/video composition view
//!
//! [`CourseView`] owns what the course page knows about the open course:
//! fetched metadata, the selected clip and its markers, and the display
//! mode derived from them. It drives a [`SynchronizedTransport`] and routes
//! every section change through the shared [`SlideCoordinator`].

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::adapters::{Configured, SecondaryInputs};
use crate::catalog::{
    CatalogSource, ClipDetails, ClipExtraction, ClipInfo, SlideCounts, SlidesClipInfo,
    SlidesUriToIndexMap, TocElem, clip_for_slide, collect_clip_ids, collect_slides_clip_info,
    current_slide_clip_range, find_section, first_slide_uri, section_order,
};
use crate::display::{DisplayInputs, DisplayMode, DisplayState, show_side_by_side_slides};
use crate::markers::{extraction_has_slides_for, markers_from_metadata};
use crate::navigation::{RouteState, SlideCoordinator};
use crate::overlay::OverlayEvent;
use crate::preferences::Preferences;
use crate::transport::SynchronizedTransport;
use crate::types::{Marker, Resolution, VideoMode, ViewMode};
use crate::{PlaybackError, Result};

/// What [`CourseView::select_clip_for_section`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSelection {
    /// The current clip stays; it covers the section or nothing is assigned yet
    Kept,
    /// A different clip was selected and the start position reset
    Switched(String),
    /// The section has no clip; the video is dropped
    Cleared,
}

/// An in-flight marker fetch for one clip.
///
/// Started by [`CourseView::begin_marker_load`]; a newer load or a clip
/// change cancels it, and [`CourseView::finish_marker_load`] discards its
/// result.
pub struct MarkerLoad<C> {
    catalog: Arc<C>,
    course_id: String,
    clip_id: String,
    cancel: CancellationToken,
}

impl<C: CatalogSource> MarkerLoad<C> {
    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn fetch(&self) -> Result<ClipExtraction> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(PlaybackError::cancelled(format!("marker load for clip {}", self.clip_id))),
            result = self.catalog.slide_details(&self.course_id, &self.clip_id) => result,
        }
    }
}

/// The course page.
pub struct CourseView<C> {
    catalog: Arc<C>,
    coordinator: Arc<SlideCoordinator>,
    prefs: Preferences,
    transport: SynchronizedTransport,
    course_id: String,

    slide_counts: SlideCounts,
    slides_uri_to_index: Arc<SlidesUriToIndexMap>,
    clip_ids: BTreeMap<String, String>,
    slides_clip_info: SlidesClipInfo,
    toc: Vec<TocElem>,
    course_sections: Vec<String>,

    current_clip_id: Option<String>,
    clip_details: Option<(String, ClipDetails)>,
    extraction: Option<(String, ClipExtraction)>,
    marker_load: CancellationToken,
    pending_timestamp: Option<f64>,
    current_slide_uri: Option<String>,
    current_slide_clip: Option<ClipInfo>,

    resolution: Resolution,
    video_mode: VideoMode,
    marker_present: Option<bool>,
    slide_at_current_time: bool,
    away_from_slide: bool,
    show_presentation: bool,
    display: DisplayState,
}

impl<C: CatalogSource> CourseView<C> {
    /// The route must name a course.
    pub fn new(
        catalog: Arc<C>,
        coordinator: Arc<SlideCoordinator>,
        transport: SynchronizedTransport,
        default_resolution: Resolution,
    ) -> Result<Self> {
        let route = coordinator.route();
        let Some(course_id) = route.course_id.clone() else {
            return Err(PlaybackError::MissingRouteParams { missing: vec![crate::navigation::COURSE_ID] });
        };
        let prefs = coordinator.preferences().clone();
        let resolution = prefs.default_resolution().unwrap_or(default_resolution);
        let video_mode = prefs.video_mode();

        Ok(Self {
            catalog,
            coordinator,
            prefs,
            transport,
            course_id,
            slide_counts: SlideCounts::new(),
            slides_uri_to_index: Arc::default(),
            clip_ids: BTreeMap::new(),
            slides_clip_info: SlidesClipInfo::new(),
            toc: Vec::new(),
            course_sections: Vec::new(),
            current_clip_id: None,
            clip_details: None,
            extraction: None,
            marker_load: CancellationToken::new(),
            pending_timestamp: None,
            current_slide_uri: None,
            current_slide_clip: None,
            resolution,
            video_mode,
            marker_present: None,
            slide_at_current_time: true,
            away_from_slide: false,
            show_presentation: false,
            display: DisplayState::default(),
        })
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn route(&self) -> RouteState {
        self.coordinator.route()
    }

    pub fn section_id(&self) -> Option<String> {
        self.route().section_id
    }

    pub fn coordinator(&self) -> &Arc<SlideCoordinator> {
        &self.coordinator
    }

    pub fn transport(&self) -> &SynchronizedTransport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut SynchronizedTransport {
        &mut self.transport
    }

    pub fn course_sections(&self) -> &[String] {
        &self.course_sections
    }

    pub fn slide_counts(&self) -> &SlideCounts {
        &self.slide_counts
    }

    pub fn toc(&self) -> &[TocElem] {
        &self.toc
    }

    /// Title of the current section from the table of contents.
    pub fn section_title(&self) -> Option<&str> {
        let section_id = self.route().section_id?;
        find_section(&self.toc, &section_id)?.title.as_deref()
    }

    pub fn current_clip_id(&self) -> Option<&str> {
        self.current_clip_id.as_deref()
    }

    pub fn clip_details(&self) -> Option<&ClipDetails> {
        self.clip_details
            .as_ref()
            .filter(|(id, _)| self.current_clip_id.as_deref() == Some(id.as_str()))
            .map(|(_, details)| details)
    }

    fn current_extraction(&self) -> Option<&ClipExtraction> {
        self.extraction
            .as_ref()
            .filter(|(id, _)| self.current_clip_id.as_deref() == Some(id.as_str()))
            .map(|(_, extraction)| extraction)
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.current_extraction().map(markers_from_metadata).unwrap_or_default()
    }

    pub fn current_slide_clip(&self) -> Option<&ClipInfo> {
        self.current_slide_clip.as_ref()
    }

    pub fn away_from_slide(&self) -> bool {
        self.away_from_slide
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn video_mode(&self) -> VideoMode {
        self.video_mode
    }

    /// Fetch slide counts, slide indices, section info and the table of
    /// contents concurrently. Failures are logged and leave that piece empty.
    pub async fn load_course(&mut self) {
        let course_id = self.course_id.as_str();
        let catalog = self.catalog.as_ref();
        let (counts, uri_to_index, sections, toc) = tokio::join!(
            catalog.slide_counts(course_id),
            catalog.slide_uri_to_index(course_id),
            catalog.section_info(course_id),
            catalog.table_of_contents(course_id),
        );

        self.slide_counts = counts.unwrap_or_else(|e| {
            warn!("Failed to fetch slide counts: {}", e);
            SlideCounts::new()
        });
        self.slides_uri_to_index = Arc::new(uri_to_index.unwrap_or_else(|e| {
            warn!("Failed to fetch slide index mapping: {}", e);
            SlidesUriToIndexMap::new()
        }));
        let sections = sections.unwrap_or_else(|e| {
            warn!("Failed to fetch section info: {}", e);
            Vec::new()
        });
        self.clip_ids = collect_clip_ids(&sections);
        self.slides_clip_info = collect_slides_clip_info(&sections);
        self.toc = toc.unwrap_or_else(|e| {
            warn!("Failed to fetch table of contents: {}", e);
            Vec::new()
        });
        self.course_sections = section_order(&self.toc);

        self.transport.set_slide_index(Arc::clone(&self.slides_uri_to_index));
        info!(
            course = %self.course_id,
            sections = self.course_sections.len(),
            clips = self.clip_ids.len(),
            "Course metadata loaded"
        );
    }

    /// Complete a partial route from stored preferences.
    pub async fn resume(&self) -> Result<bool> {
        let first = self.course_sections.first().or_else(|| self.slide_counts.keys().next());
        self.coordinator.resume(first.map(String::as_str)).await
    }

    /// The section has slides, from the index mapping or the clip's markers.
    pub fn section_contain_slides(&self) -> bool {
        let Some(section_id) = self.section_id() else {
            return false;
        };
        let from_mapping = self.slides_uri_to_index.get(&section_id).is_some_and(|s| !s.is_empty());
        from_mapping || self.current_extraction().is_some_and(|e| extraction_has_slides_for(e, &section_id))
    }

    /// A clip is selected and assigned to the current section.
    pub fn has_video_for_section(&self) -> bool {
        let assigned = self.section_id().is_some_and(|s| self.clip_ids.contains_key(&s));
        self.current_clip_id.is_some() && assigned
    }

    pub fn show_side_by_side_slides(&self) -> bool {
        show_side_by_side_slides(&self.display_inputs())
    }

    fn view_mode(&self) -> ViewMode {
        self.route().view_mode.unwrap_or_default()
    }

    fn audio_only(&self) -> bool {
        self.route().audio_only.unwrap_or(false)
    }

    pub fn display_inputs(&self) -> DisplayInputs {
        let source = self.current_video_url();
        let presentation_available = match (self.clip_details(), source.as_deref()) {
            (Some(details), Some(url)) => details.is_secondary_recording(url),
            _ => false,
        };
        DisplayInputs {
            view_mode: self.view_mode(),
            audio_only: self.audio_only(),
            has_slides: self.section_contain_slides(),
            has_video_for_section: self.has_video_for_section(),
            video_loaded: self.clip_details().is_some() && source.is_some(),
            slide_at_current_time: self.slide_at_current_time,
            show_presentation: self.show_presentation,
            presentation_available,
        }
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display.mode()
    }

    /// Re-derive the display mode; returns it when it changed.
    pub fn refresh_display(&mut self) -> Option<DisplayMode> {
        let changed = self.display.replace(self.display_inputs());
        if let Some(mode) = changed {
            debug!(?mode, "Display mode changed");
        }
        changed
    }

    /// Url for the primary player given the video mode and whether a slide
    /// marker is active.
    ///
    /// In auto mode the presenter is preferred while a marker is active and
    /// the presentation recording otherwise.
    pub fn current_video_url(&self) -> Option<String> {
        let details = self.clip_details()?;
        let presenter = details.video_url(self.resolution);
        let url = match (self.video_mode, self.marker_present) {
            (VideoMode::Presenter, _) | (VideoMode::Auto, Some(true)) => {
                presenter.or_else(|| details.default_video_url(self.video_mode, self.resolution))
            }
            (VideoMode::Presentation, _) | (VideoMode::Auto, Some(false)) => {
                details.secondary_url().or(presenter)
            }
            (VideoMode::Auto, None) => details.default_video_url(self.video_mode, self.resolution),
        };
        url.map(str::to_string)
    }

    /// Presentation recording for the secondary player, unless the primary
    /// already plays it.
    pub fn presentation_url(&self) -> Option<String> {
        let details = self.clip_details()?;
        let url = details.secondary_url()?;
        if self.current_video_url().as_deref() == Some(url) {
            return None;
        }
        Some(url.to_string())
    }

    fn set_clip(&mut self, clip_id: Option<String>) {
        if self.current_clip_id == clip_id {
            return;
        }
        debug!(from = ?self.current_clip_id, to = ?clip_id, "Clip changed");
        self.marker_load.cancel();
        self.current_clip_id = clip_id;
        self.marker_present = None;
        // Assume a slide until markers say otherwise
        self.slide_at_current_time = true;
        self.current_slide_clip = None;
    }

    /// Pick the clip for the current section.
    ///
    /// The current clip is kept when it also covers this section, so moving
    /// between sections of one recording does not reload the video.
    pub fn select_clip_for_section(&mut self) -> ClipSelection {
        let Some(section_id) = self.section_id() else {
            return ClipSelection::Kept;
        };
        if self.clip_ids.is_empty() {
            return ClipSelection::Kept;
        }

        let Some(new_clip) = self.clip_ids.get(&section_id).cloned() else {
            if self.current_clip_id.is_none() {
                return ClipSelection::Kept;
            }
            self.set_clip(None);
            self.extraction = None;
            self.pending_timestamp = Some(0.0);
            return ClipSelection::Cleared;
        };

        let Some(current) = self.current_clip_id.clone() else {
            self.set_clip(Some(new_clip.clone()));
            return ClipSelection::Switched(new_clip);
        };

        let section_in_current = self
            .slides_clip_info
            .get(&section_id)
            .is_some_and(|slides| slides.values().any(|clips| clips.iter().any(|c| c.video_id == current)));
        if new_clip != current && !section_in_current {
            self.set_clip(Some(new_clip.clone()));
            self.pending_timestamp = Some(0.0);
            return ClipSelection::Switched(new_clip);
        }
        ClipSelection::Kept
    }

    /// Fetch media urls for the current clip if not already known.
    pub async fn load_clip_details(&mut self) -> Option<&ClipDetails> {
        let clip_id = self.current_clip_id.clone()?;
        let known = self.clip_details.as_ref().is_some_and(|(id, _)| *id == clip_id);
        if !known {
            match self.catalog.clip_details(&clip_id).await {
                Ok(details) => {
                    debug!(clip = %clip_id, resolutions = ?details.available_resolutions(), "Clip details loaded");
                    self.clip_details = Some((clip_id, details));
                }
                Err(e) => {
                    warn!("Failed to fetch clip details: {}", e);
                    self.clip_details = None;
                }
            }
        }
        self.clip_details()
    }

    /// Start fetching markers for the current clip, cancelling any earlier load.
    pub fn begin_marker_load(&mut self) -> Option<MarkerLoad<C>> {
        self.marker_load.cancel();
        self.marker_load = CancellationToken::new();
        let clip_id = self.current_clip_id.clone()?;
        Some(MarkerLoad {
            catalog: Arc::clone(&self.catalog),
            course_id: self.course_id.clone(),
            clip_id,
            cancel: self.marker_load.clone(),
        })
    }

    /// Apply a finished marker load; stale results are discarded.
    ///
    /// Returns whether the result was applied.
    pub fn finish_marker_load(&mut self, load: &MarkerLoad<C>, result: Result<ClipExtraction>) -> bool {
        if load.is_cancelled() || self.current_clip_id.as_deref() != Some(load.clip_id()) {
            debug!(clip = load.clip_id(), "Discarding stale marker load");
            return false;
        }

        let extraction = result.unwrap_or_else(|e| {
            warn!("Failed to fetch slide details: {}", e);
            ClipExtraction::new()
        });
        let markers = markers_from_metadata(&extraction);
        info!(clip = load.clip_id(), markers = markers.len(), "Markers loaded");
        let time = self.transport.current_time().or(self.pending_timestamp).unwrap_or(0.0);
        self.slide_at_current_time = markers.iter().any(|m| m.time <= time);
        self.transport.set_markers(markers);
        self.extraction = Some((load.clip_id.clone(), extraction));
        true
    }

    /// Fetch and apply markers for the current clip.
    pub async fn load_markers(&mut self) -> bool {
        let Some(load) = self.begin_marker_load() else {
            return false;
        };
        let result = load.fetch().await;
        self.finish_marker_load(&load, result)
    }

    /// Bring the players in line with the current selection.
    pub async fn sync_players(&mut self) -> Result<()> {
        let inputs = self.display_inputs();
        let source = self.current_video_url();
        let Some(source) = source.filter(|_| inputs.video_visible()) else {
            self.transport.unmount().await?;
            return Ok(());
        };

        self.transport.set_clip_id(self.current_clip_id.as_deref());
        let configured = self.transport.configure(&source, inputs.audio_only).await?;
        if configured == Configured::Deferred {
            debug!("Primary player deferred until its slot attaches");
        }
        if let Some(timestamp) = self.pending_timestamp.take() {
            self.transport.set_timestamp(Some(timestamp));
        }

        let secondary = SecondaryInputs {
            presentation_url: self.presentation_url(),
            has_slides: inputs.has_slides,
            has_slide_at_current_time: self.slide_at_current_time,
            show_presentation: self.show_presentation,
            audio_only: inputs.audio_only,
        };
        self.transport.update_secondary(secondary).await?;
        Ok(())
    }

    /// Re-derive everything after a route or selection change.
    pub async fn refresh(&mut self) -> Result<DisplayMode> {
        self.select_clip_for_section();
        self.load_clip_details().await;
        let markers_known = self
            .extraction
            .as_ref()
            .is_some_and(|(id, _)| self.current_clip_id.as_deref() == Some(id.as_str()));
        if !markers_known {
            self.load_markers().await;
        }
        self.sync_players().await?;
        self.refresh_display();
        Ok(self.display.mode())
    }

    /// Record a route change made outside the view and refresh.
    pub async fn apply_route(&mut self, route: RouteState) -> Result<DisplayMode> {
        self.coordinator.set_route(route);
        self.refresh().await
    }

    /// React to an overlay event from the transport.
    ///
    /// Marker presence may switch the primary source in auto mode.
    pub async fn handle_overlay_event(&mut self, event: &OverlayEvent) -> Result<()> {
        match event {
            OverlayEvent::SlidePresenceChanged(present) => {
                let presence_changed = self.slide_at_current_time != *present;
                self.slide_at_current_time = *present;
                let before = self.current_video_url();
                self.marker_present = Some(*present);
                if presence_changed || self.current_video_url() != before {
                    self.sync_players().await?;
                }
                self.refresh_display();
            }
            OverlayEvent::AwayFromSlide(away) => self.away_from_slide = *away,
            OverlayEvent::SlideChanged { .. } | OverlayEvent::MarkerActivated(_) => {
                trace!(?event, "Overlay event handled elsewhere");
            }
        }
        Ok(())
    }

    /// Previous section of the table of contents, at its last slide.
    pub async fn go_to_prev_section(&self) -> Result<bool> {
        let Some(index) = self.section_index().filter(|i| *i > 0) else {
            return Ok(false);
        };
        let section = &self.course_sections[index - 1];
        let last_slide = self.slide_counts.get(section).copied().filter(|n| *n > 0).unwrap_or(1);
        self.coordinator.set_slide_and_section(last_slide, Some(section.as_str())).await
    }

    /// Next section of the table of contents, at its first slide.
    pub async fn go_to_next_section(&self) -> Result<bool> {
        let Some(index) = self.section_index().filter(|i| i + 1 < self.course_sections.len()) else {
            return Ok(false);
        };
        let section = &self.course_sections[index + 1];
        self.coordinator.set_slide_and_section(1, Some(section.as_str())).await
    }

    fn section_index(&self) -> Option<usize> {
        let section_id = self.section_id()?;
        self.course_sections.iter().position(|s| *s == section_id)
    }

    /// A section picked from the table of contents: switch clips, start at
    /// the first slide's position and navigate to slide 1.
    pub async fn on_section_click(&mut self, section_id: &str) -> Result<bool> {
        let new_clip = self.clip_ids.get(section_id).cloned();
        match new_clip.clone() {
            Some(clip) => self.set_clip(Some(clip)),
            None => {
                self.set_clip(None);
                self.extraction = None;
                self.pending_timestamp = Some(0.0);
            }
        }

        if let Some(first_uri) = first_slide_uri(&self.slides_uri_to_index, section_id) {
            let clip = clip_for_slide(&self.slides_clip_info, section_id, first_uri, new_clip.as_deref()).cloned();
            if let Some(clip) = clip {
                if let Some(start) = clip.start_time {
                    self.pending_timestamp = Some(start);
                }
                self.current_slide_clip = Some(clip);
            }
        }

        self.coordinator.set_slide_and_section(1, Some(section_id)).await
    }

    /// The slide deck moved to `slide_uri`.
    pub fn on_slide_change(&mut self, slide_uri: Option<&str>) {
        self.current_slide_uri = slide_uri.filter(|s| !s.is_empty()).map(str::to_string);
        let section_id = self.section_id();
        let clip = match (section_id.as_deref(), self.current_slide_uri.as_deref()) {
            (Some(section), Some(uri)) => {
                clip_for_slide(&self.slides_clip_info, section, uri, self.current_clip_id.as_deref()).cloned()
            }
            _ => None,
        };
        self.current_slide_clip = clip;

        let range = current_slide_clip_range(
            self.current_slide_uri.as_deref(),
            section_id.as_deref(),
            &self.slides_clip_info,
            self.current_clip_id.as_deref(),
        );
        self.transport.set_clip_range(range);
    }

    /// A clip chosen from a slide's clip list.
    pub fn on_clip_change(&mut self, clip: &ClipInfo) {
        self.set_clip(Some(clip.video_id.clone()));
        self.pending_timestamp = clip.start_time;
    }

    /// Switch resolution and remember it as the default.
    ///
    /// Route updates from playback are suspended until the new source is
    /// ready, for at most the configured ready timeout.
    pub async fn change_resolution(&mut self, resolution: Resolution) -> Result<()> {
        self.prefs.persist_or_log("default resolution", self.prefs.set_default_resolution(resolution));
        if resolution == self.resolution {
            return Ok(());
        }
        self.resolution = resolution;

        self.transport.set_auto_sync(false);
        let result = self.sync_players().await;
        let ready = self.await_primary_ready().await;
        self.transport.set_auto_sync(true);
        result.and(ready)
    }

    async fn await_primary_ready(&self) -> Result<()> {
        let Some(engine) = self.transport.primary_engine() else {
            return Ok(());
        };
        let limit = self.transport.config().ready_timeout();
        match tokio::time::timeout(limit, engine.ready()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!("Engine gone during resolution change: {}", e);
                Ok(())
            }
            Err(_) => {
                warn!(timeout = ?limit, "Source never became ready after resolution change");
                Err(PlaybackError::Timeout { duration: limit })
            }
        }
    }

    pub async fn set_video_mode(&mut self, mode: VideoMode) -> Result<()> {
        self.prefs.persist_or_log("video mode", self.prefs.set_video_mode(mode));
        self.video_mode = mode;
        self.sync_players().await?;
        self.refresh_display();
        Ok(())
    }

    pub async fn toggle_presentation(&mut self) -> Result<()> {
        self.show_presentation = !self.show_presentation;
        self.sync_players().await?;
        self.refresh_display();
        Ok(())
    }

    pub async fn set_view_mode(&mut self, mode: ViewMode) -> Result<DisplayMode> {
        self.coordinator.set_view_mode(mode).await?;
        self.sync_players().await?;
        self.refresh_display();
        Ok(self.display.mode())
    }

    pub async fn set_audio_only(&mut self, audio_only: bool) -> Result<DisplayMode> {
        self.coordinator.set_audio_only(audio_only).await?;
        self.sync_players().await?;
        self.refresh_display();
        Ok(self.display.mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CourseDocument, StaticCatalog};
    use crate::config::SyncConfig;
    use crate::engines::SimulatedFactory;
    use crate::navigation::{RecordingNavigator, RouteKind};
    use crate::test_utils::{catalog, scoped_route};
    use crate::transport::PlayerSlots;

    struct Page {
        view: CourseView<StaticCatalog>,
        navigator: Arc<RecordingNavigator>,
    }

    fn page(catalog: StaticCatalog, route: RouteState) -> Page {
        let navigator = Arc::new(RecordingNavigator::new());
        let coordinator = Arc::new(SlideCoordinator::new(
            RouteKind::InstitutionScoped,
            navigator.clone(),
            Preferences::in_memory(),
            route,
        ));
        let transport = SynchronizedTransport::new(
            Arc::new(SimulatedFactory::new()),
            PlayerSlots::attached(),
            Arc::new(SyncConfig::default()),
        );
        let view = CourseView::new(Arc::new(catalog), coordinator, transport, Resolution::DEFAULT).unwrap();
        Page { view, navigator }
    }

    #[tokio::test(start_paused = true)]
    async fn load_course_flattens_sections() {
        let mut page = page(catalog(), scoped_route("intro", 1));
        page.view.load_course().await;

        assert_eq!(page.view.course_sections(), ["intro", "logic", "search", "demo"]);
        assert_eq!(page.view.section_title(), Some("Introduction"));
        assert!(page.view.section_contain_slides());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetches_degrade_to_empty() {
        let mut page = page(StaticCatalog::new(), scoped_route("intro", 1));
        page.view.load_course().await;

        assert!(page.view.course_sections().is_empty());
        assert!(!page.view.section_contain_slides());
        assert_eq!(page.view.refresh().await.unwrap(), DisplayMode::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn clip_is_kept_across_sections_it_covers() {
        let mut page = page(catalog(), scoped_route("intro", 1));
        page.view.load_course().await;
        assert_eq!(page.view.select_clip_for_section(), ClipSelection::Switched("clip-1".into()));

        // "logic" is assigned clip-2 but also appears in clip-1
        page.view.coordinator().set_route(scoped_route("logic", 1));
        assert_eq!(page.view.select_clip_for_section(), ClipSelection::Kept);
        assert_eq!(page.view.current_clip_id(), Some("clip-1"));

        page.view.coordinator().set_route(scoped_route("search", 1));
        assert_eq!(page.view.select_clip_for_section(), ClipSelection::Cleared);
        assert_eq!(page.view.current_clip_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn section_navigation_walks_the_toc() {
        let mut page = page(catalog(), scoped_route("logic", 2));
        page.view.load_course().await;

        assert!(page.view.go_to_prev_section().await.unwrap());
        assert_eq!(page.view.section_id().as_deref(), Some("intro"));
        assert_eq!(page.view.route().slide_num, Some(3));
        assert!(!page.view.go_to_prev_section().await.unwrap());

        assert!(page.view.go_to_next_section().await.unwrap());
        assert!(page.view.go_to_next_section().await.unwrap());
        assert_eq!(page.view.section_id().as_deref(), Some("search"));
        assert_eq!(page.view.route().slide_num, Some(1));
        assert!(page.view.go_to_next_section().await.unwrap());
        assert_eq!(page.view.section_id().as_deref(), Some("demo"));
        assert!(!page.view.go_to_next_section().await.unwrap());
        assert_eq!(page.navigator.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_marker_loads_are_discarded() {
        let mut page = page(catalog(), scoped_route("intro", 1));
        page.view.load_course().await;
        page.view.select_clip_for_section();

        let stale = page.view.begin_marker_load().unwrap();
        page.view.on_clip_change(&ClipInfo { video_id: "clip-2".into(), start_time: Some(5.0), end_time: None });
        let result = stale.fetch().await;
        assert!(!page.view.finish_marker_load(&stale, result));

        assert!(page.view.load_markers().await);
        assert!(page.view.markers().iter().all(|m| m.data.section_id == "logic"));
    }

    #[tokio::test(start_paused = true)]
    async fn section_click_starts_at_first_slide() {
        let mut page = page(catalog(), scoped_route("intro", 2));
        page.view.load_course().await;

        assert!(page.view.on_section_click("logic").await.unwrap());
        assert_eq!(page.view.current_clip_id(), Some("clip-2"));
        assert_eq!(page.view.current_slide_clip().and_then(|c| c.start_time), Some(40.0));
        assert_eq!(page.view.route().slide_num, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_falls_back_and_persists() {
        let mut page = page(catalog(), scoped_route("intro", 1));
        page.view.load_course().await;
        page.view.refresh().await.unwrap();

        page.view.change_resolution(Resolution(1080)).await.unwrap();
        assert_eq!(page.view.coordinator().preferences().default_resolution(), Some(Resolution(1080)));
        page.view.set_video_mode(VideoMode::Presenter).await.unwrap();
        // clip-1 only offers 360 and 720
        assert_eq!(page.view.current_video_url().as_deref(), Some("https://media.example/clip-1-360.mp4"));
    }

    #[tokio::test]
    async fn course_id_is_required() {
        let navigator = Arc::new(RecordingNavigator::new());
        let coordinator = Arc::new(SlideCoordinator::new(
            RouteKind::Legacy,
            navigator,
            Preferences::in_memory(),
            RouteState::default(),
        ));
        let transport = SynchronizedTransport::new(
            Arc::new(SimulatedFactory::new()),
            PlayerSlots::attached(),
            Arc::new(SyncConfig::default()),
        );
        let catalog = Arc::new(StaticCatalog::new().with_course("x", CourseDocument::default()));
        let result = CourseView::new(catalog, coordinator, transport, Resolution::DEFAULT);
        assert!(matches!(result, Err(PlaybackError::MissingRouteParams { .. })));
    }
}
