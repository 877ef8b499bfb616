//! Route state and the single slide/section navigation path
//!
//! Both automatic (video-driven) and manual (button-driven) section changes
//! end up in [`SlideCoordinator::set_slide_and_section`], which persists the
//! learner's position and issues at most one navigation per distinct
//! `(sectionId, slideNum)` pair.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::overlay::OverlayEvent;
use crate::preferences::Preferences;
use crate::types::ViewMode;
use crate::{PlaybackError, Result};

pub const SECTION_ID: &str = "sectionId";
pub const SLIDE_NUM: &str = "slideNum";
pub const VIEW_MODE: &str = "viewMode";
pub const AUDIO_ONLY: &str = "audioOnly";
pub const INSTITUTION_ID: &str = "institutionId";
pub const COURSE_ID: &str = "courseId";
pub const INSTANCE: &str = "instance";

/// Which course view route the page was opened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// `/{institutionId}/{courseId}/{instance}/course-view`
    InstitutionScoped,
    /// `/course-view/{courseId}`
    Legacy,
}

impl RouteKind {
    /// Whether writes on this route avoid a full page reload.
    pub fn shallow(self) -> bool {
        matches!(self, RouteKind::InstitutionScoped)
    }

    fn required_params(self) -> &'static [&'static str] {
        match self {
            RouteKind::InstitutionScoped => &[INSTITUTION_ID, COURSE_ID, INSTANCE],
            RouteKind::Legacy => &[COURSE_ID],
        }
    }
}

/// Parameters of the course view route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteState {
    pub institution_id: Option<String>,
    pub course_id: Option<String>,
    pub instance: Option<String>,
    pub section_id: Option<String>,
    /// 1-based
    pub slide_num: Option<u32>,
    pub view_mode: Option<ViewMode>,
    pub audio_only: Option<bool>,
}

fn non_empty(query: &BTreeMap<String, String>, key: &str) -> Option<String> {
    query.get(key).filter(|v| !v.is_empty()).cloned()
}

impl RouteState {
    /// Parse a string query map. Empty values count as absent.
    pub fn from_query(query: &BTreeMap<String, String>) -> Result<Self> {
        let slide_num = match non_empty(query, SLIDE_NUM) {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| PlaybackError::invalid_route_param(SLIDE_NUM, raw.as_str()))?,
            ),
            None => None,
        };
        let view_mode = non_empty(query, VIEW_MODE).map(|raw| raw.parse::<ViewMode>()).transpose()?;
        let audio_only = match non_empty(query, AUDIO_ONLY).as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => return Err(PlaybackError::invalid_route_param(AUDIO_ONLY, other)),
            None => None,
        };

        Ok(Self {
            institution_id: non_empty(query, INSTITUTION_ID),
            course_id: non_empty(query, COURSE_ID),
            instance: non_empty(query, INSTANCE),
            section_id: non_empty(query, SECTION_ID),
            slide_num,
            view_mode,
            audio_only,
        })
    }

    /// Serialise every present parameter.
    pub fn to_query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                query.insert(key.to_string(), value);
            }
        };
        put(INSTITUTION_ID, self.institution_id.clone());
        put(COURSE_ID, self.course_id.clone());
        put(INSTANCE, self.instance.clone());
        put(SECTION_ID, self.section_id.clone());
        put(SLIDE_NUM, self.slide_num.map(|n| n.to_string()));
        put(VIEW_MODE, self.view_mode.map(|m| m.as_str().to_string()));
        put(AUDIO_ONLY, self.audio_only.map(|b| b.to_string()));
        query
    }

    /// Route kind implied by which path parameters are present.
    pub fn kind(&self) -> RouteKind {
        if self.institution_id.is_some() && self.course_id.is_some() && self.instance.is_some() {
            RouteKind::InstitutionScoped
        } else {
            RouteKind::Legacy
        }
    }

    fn param(&self, key: &str) -> Option<&str> {
        match key {
            INSTITUTION_ID => self.institution_id.as_deref(),
            COURSE_ID => self.course_id.as_deref(),
            INSTANCE => self.instance.as_deref(),
            _ => None,
        }
    }

    /// Check the path parameters `kind` needs.
    pub fn require(&self, kind: RouteKind) -> Result<()> {
        let missing: Vec<&'static str> =
            kind.required_params().iter().copied().filter(|key| self.param(key).is_none()).collect();
        if missing.is_empty() { Ok(()) } else { Err(PlaybackError::MissingRouteParams { missing }) }
    }

    /// Path of the course view for this state.
    pub fn pathname(&self, kind: RouteKind) -> Result<String> {
        self.require(kind)?;
        let param = |key: &str| self.param(key).unwrap_or_default().to_string();
        Ok(match kind {
            RouteKind::InstitutionScoped => {
                format!("/{}/{}/{}/course-view", param(INSTITUTION_ID), param(COURSE_ID), param(INSTANCE))
            }
            RouteKind::Legacy => format!("/course-view/{}", param(COURSE_ID)),
        })
    }

    /// Navigation target for this state; path parameters live in the pathname.
    pub fn target(&self, kind: RouteKind) -> Result<RouteTarget> {
        let pathname = self.pathname(kind)?;
        let mut query = self.to_query();
        for key in kind.required_params() {
            query.remove(*key);
        }
        Ok(RouteTarget { pathname, query, shallow: kind.shallow() })
    }
}

/// A concrete navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub pathname: String,
    pub query: BTreeMap<String, String>,
    pub shallow: bool,
}

/// The host router.
#[async_trait]
pub trait Navigator: Send + Sync + 'static {
    /// Add a history entry.
    async fn push(&self, target: RouteTarget) -> Result<()>;

    /// Replace the current history entry.
    async fn replace(&self, target: RouteTarget) -> Result<()>;
}

/// How a recorded navigation was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
}

/// Navigator that records requests instead of routing.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<(NavigationKind, RouteTarget)>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    fn history_lock(&self) -> MutexGuard<'_, Vec<(NavigationKind, RouteTarget)>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn history(&self) -> Vec<(NavigationKind, RouteTarget)> {
        self.history_lock().clone()
    }

    pub fn len(&self) -> usize {
        self.history_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<(NavigationKind, RouteTarget)> {
        self.history_lock().last().cloned()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn push(&self, target: RouteTarget) -> Result<()> {
        self.history_lock().push((NavigationKind::Push, target));
        Ok(())
    }

    async fn replace(&self, target: RouteTarget) -> Result<()> {
        self.history_lock().push((NavigationKind::Replace, target));
        Ok(())
    }
}

/// Fill missing route parameters from stored preferences.
///
/// Returns the completed state when anything was missing, `None` when the
/// route is already complete. The section falls back to `first_section` and
/// the slide to 1.
pub fn resume_route(route: &RouteState, prefs: &Preferences, first_section: Option<&str>) -> Option<RouteState> {
    let mut resumed = route.clone();
    let course_id = route.course_id.as_deref().unwrap_or_default();
    let mut missing = false;

    if resumed.section_id.is_none() {
        missing = true;
        resumed.section_id = prefs.last_read_section(course_id).or_else(|| first_section.map(str::to_string));
    }
    if resumed.slide_num.is_none() {
        missing = true;
        resumed.slide_num = Some(prefs.last_read_slide(course_id).unwrap_or(1));
    }
    if resumed.view_mode.is_none() {
        missing = true;
        resumed.view_mode = Some(prefs.default_mode().unwrap_or_default());
    }
    if resumed.audio_only.is_none() {
        missing = true;
        resumed.audio_only = Some(prefs.audio_only());
    }

    missing.then_some(resumed)
}

fn lock_route(route: &Mutex<RouteState>) -> MutexGuard<'_, RouteState> {
    route.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The one place route state is written from.
///
/// Holds the last applied route; callers report external route changes
/// through [`SlideCoordinator::set_route`].
pub struct SlideCoordinator {
    kind: RouteKind,
    navigator: Arc<dyn Navigator>,
    prefs: Preferences,
    route: Mutex<RouteState>,
}

impl SlideCoordinator {
    pub fn new(kind: RouteKind, navigator: Arc<dyn Navigator>, prefs: Preferences, route: RouteState) -> Self {
        Self { kind, navigator, prefs, route: Mutex::new(route) }
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn route(&self) -> RouteState {
        lock_route(&self.route).clone()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Record a route change that did not come through this coordinator.
    pub fn set_route(&self, route: RouteState) {
        *lock_route(&self.route) = route;
    }

    /// Move to `slide_num` (1-based) of `section_id`, or of the current
    /// section when `None`.
    ///
    /// Persists the position as last read and navigates once. Returns
    /// `false` when the route already shows this pair.
    pub async fn set_slide_and_section(&self, slide_num: u32, section_id: Option<&str>) -> Result<bool> {
        let (previous, target) = {
            let mut route = lock_route(&self.route);
            route.require(self.kind)?;

            let section_same = section_id.is_none_or(|id| route.section_id.as_deref() == Some(id));
            if section_same && route.slide_num == Some(slide_num) {
                return Ok(false);
            }

            let previous = route.clone();
            if let Some(id) = section_id {
                route.section_id = Some(id.to_string());
            }
            route.slide_num = Some(slide_num);
            (previous, route.target(self.kind)?)
        };

        let course_id = previous.course_id.as_deref().unwrap_or_default();
        if let Some(section) = section_id {
            self.prefs.persist_or_log("last read section", self.prefs.set_last_read(course_id, section, slide_num));
        } else if let Some(section) = previous.section_id.as_deref() {
            self.prefs.persist_or_log("last read slide", self.prefs.set_last_read(course_id, section, slide_num));
        }

        debug!(section = ?section_id, slide_num, "Navigating to slide");
        if let Err(e) = self.navigator.push(target).await {
            error!("Navigation to slide {} failed: {}", slide_num, e);
            *lock_route(&self.route) = previous;
            return Err(e);
        }
        Ok(true)
    }

    /// Switch layout, remember it as the default and replace the route.
    pub async fn set_view_mode(&self, mode: ViewMode) -> Result<()> {
        self.prefs.persist_or_log("default mode", self.prefs.set_default_mode(mode));
        self.replace_with(|route| route.view_mode = Some(mode)).await
    }

    /// Toggle audio-only playback, remember it and replace the route.
    pub async fn set_audio_only(&self, audio_only: bool) -> Result<()> {
        self.prefs.persist_or_log("audio only", self.prefs.set_audio_only(audio_only));
        self.replace_with(|route| route.audio_only = Some(audio_only)).await
    }

    /// Complete a partial route from preferences with a shallow replace.
    ///
    /// Returns whether a replace was issued.
    pub async fn resume(&self, first_section: Option<&str>) -> Result<bool> {
        let current = self.route();
        let Some(resumed) = resume_route(&current, &self.prefs, first_section) else {
            return Ok(false);
        };
        info!(section = ?resumed.section_id, slide = ?resumed.slide_num, "Resuming course position");
        self.replace_with(move |route| *route = resumed).await?;
        Ok(true)
    }

    async fn replace_with(&self, update: impl FnOnce(&mut RouteState)) -> Result<()> {
        let mut target = {
            let mut route = lock_route(&self.route);
            update(&mut route);
            route.target(self.kind)?
        };
        // Query-only updates never reload the page
        target.shallow = true;
        self.navigator.replace(target).await
    }

    /// Translate overlay slide changes into navigation until cancelled.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<OverlayEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            info!("Slide coordinator started");
            let mut navigations = 0u64;
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(OverlayEvent::SlideChanged { section_id, slide_num }) => {
                        match coordinator.set_slide_and_section(slide_num, Some(&section_id)).await {
                            Ok(true) => navigations += 1,
                            Ok(false) => {}
                            Err(e) => warn!("Could not follow slide change: {}", e),
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Slide coordinator lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Slide coordinator ended ({} navigations)", navigations);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scoped_route() -> RouteState {
        RouteState {
            institution_id: Some("FAU".into()),
            course_id: Some("ai-1".into()),
            instance: Some("WS25".into()),
            section_id: Some("intro".into()),
            slide_num: Some(1),
            ..Default::default()
        }
    }

    fn coordinator(route: RouteState) -> (Arc<SlideCoordinator>, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::new());
        let kind = route.kind();
        let coordinator = SlideCoordinator::new(kind, navigator.clone(), Preferences::in_memory(), route);
        (Arc::new(coordinator), navigator)
    }

    #[test]
    fn query_round_trip_and_validation() {
        let query: BTreeMap<String, String> = [
            ("courseId", "ai-1"),
            ("sectionId", "intro"),
            ("slideNum", "3"),
            ("viewMode", "SLIDE_MODE"),
            ("audioOnly", "false"),
            ("instance", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let route = RouteState::from_query(&query).unwrap();
        assert_eq!(route.slide_num, Some(3));
        assert_eq!(route.view_mode, Some(ViewMode::SlideMode));
        assert_eq!(route.instance, None);
        assert_eq!(route.kind(), RouteKind::Legacy);
        assert_eq!(RouteState::from_query(&route.to_query()).unwrap(), route);

        let mut bad = query.clone();
        bad.insert("slideNum".into(), "0".into());
        assert!(matches!(RouteState::from_query(&bad), Err(PlaybackError::InvalidRouteParam { .. })));
    }

    #[test]
    fn pathnames_per_route_kind() {
        let route = scoped_route();
        let target = route.target(RouteKind::InstitutionScoped).unwrap();
        assert_eq!(target.pathname, "/FAU/ai-1/WS25/course-view");
        assert!(target.shallow);
        assert!(!target.query.contains_key(COURSE_ID));

        let legacy = route.target(RouteKind::Legacy).unwrap();
        assert_eq!(legacy.pathname, "/course-view/ai-1");
        assert!(!legacy.shallow);
        assert_eq!(legacy.query.get(INSTANCE).map(String::as_str), Some("WS25"));
    }

    #[tokio::test]
    async fn repeated_pair_navigates_once_and_persists() {
        let (coordinator, navigator) = coordinator(scoped_route());

        assert!(coordinator.set_slide_and_section(4, Some("logic")).await.unwrap());
        assert!(!coordinator.set_slide_and_section(4, Some("logic")).await.unwrap());
        assert_eq!(navigator.len(), 1);

        let (kind, target) = navigator.last().unwrap();
        assert_eq!(kind, NavigationKind::Push);
        assert_eq!(target.query.get(SECTION_ID).map(String::as_str), Some("logic"));
        assert_eq!(target.query.get(SLIDE_NUM).map(String::as_str), Some("4"));

        let prefs = coordinator.preferences();
        assert_eq!(prefs.last_read_section("ai-1").as_deref(), Some("logic"));
        assert_eq!(prefs.last_read_slide("ai-1"), Some(4));
    }

    #[tokio::test]
    async fn missing_params_do_not_navigate() {
        let route = RouteState { course_id: Some("ai-1".into()), ..Default::default() };
        let navigator = Arc::new(RecordingNavigator::new());
        let coordinator =
            SlideCoordinator::new(RouteKind::InstitutionScoped, navigator.clone(), Preferences::in_memory(), route);

        let err = coordinator.set_slide_and_section(2, Some("intro")).await.unwrap_err();
        match err {
            PlaybackError::MissingRouteParams { missing } => assert_eq!(missing, vec![INSTITUTION_ID, INSTANCE]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(navigator.is_empty());
    }

    #[tokio::test]
    async fn resume_fills_from_preferences() {
        let route = RouteState { course_id: Some("ai-1".into()), ..Default::default() };
        let (coordinator, navigator) = coordinator(route);
        coordinator.preferences().set_last_read("ai-1", "search", 7).unwrap();
        coordinator.preferences().set_default_mode(ViewMode::SlideMode).unwrap();

        assert!(coordinator.resume(Some("intro")).await.unwrap());
        assert!(!coordinator.resume(Some("intro")).await.unwrap());

        let (kind, target) = navigator.last().unwrap();
        assert_eq!(kind, NavigationKind::Replace);
        assert!(target.shallow);
        let resumed = coordinator.route();
        assert_eq!(resumed.section_id.as_deref(), Some("search"));
        assert_eq!(resumed.slide_num, Some(7));
        assert_eq!(resumed.view_mode, Some(ViewMode::SlideMode));
        assert_eq!(resumed.audio_only, Some(false));
    }

    #[test]
    fn resume_falls_back_to_first_section() {
        let route = RouteState { course_id: Some("ai-1".into()), ..Default::default() };
        let resumed = resume_route(&route, &Preferences::in_memory(), Some("intro")).unwrap();
        assert_eq!(resumed.section_id.as_deref(), Some("intro"));
        assert_eq!(resumed.slide_num, Some(1));
        assert_eq!(resumed.view_mode, Some(ViewMode::CombinedMode));
    }

    #[tokio::test]
    async fn listener_follows_slide_changes() {
        let (coordinator, navigator) = coordinator(scoped_route());
        let (tx, rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        let handle = coordinator.spawn_listener(rx, cancel.clone());

        tx.send(OverlayEvent::SlideChanged { section_id: "logic".into(), slide_num: 2 }).unwrap();
        tx.send(OverlayEvent::SlideChanged { section_id: "logic".into(), slide_num: 2 }).unwrap();
        tx.send(OverlayEvent::SlidePresenceChanged(true)).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(navigator.len(), 1);
        assert_eq!(coordinator.route().slide_num, Some(2));
    }

    proptest! {
        #[test]
        fn prop_navigations_match_distinct_consecutive_pairs(
            calls in prop::collection::vec((0usize..3, 1u32..4), 1..30)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let sections = ["intro", "logic", "search"];

            let (coordinator, navigator) = coordinator(scoped_route());
            let mut expected = 0;
            let mut last = ("intro", 1u32);
            for (section, slide) in calls {
                let pair = (sections[section], slide);
                if pair != last {
                    expected += 1;
                    last = pair;
                }
                runtime.block_on(coordinator.set_slide_and_section(slide, Some(pair.0))).unwrap();
            }
            prop_assert_eq!(navigator.len(), expected);
        }
    }
}
