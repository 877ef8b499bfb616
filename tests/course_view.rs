//! Course view scenarios over the fixture catalog.

use std::path::PathBuf;
use std::sync::Arc;

use alea_playback::PlaybackError;
use alea_playback::catalog::StaticCatalog;
use alea_playback::composition::CourseView;
use alea_playback::config::SyncConfig;
use alea_playback::display::DisplayMode;
use alea_playback::engine::{EngineKind, MediaEngine};
use alea_playback::engines::SimulatedFactory;
use alea_playback::navigation::{
    NavigationKind, RecordingNavigator, RouteKind, RouteState, SECTION_ID, SLIDE_NUM, SlideCoordinator,
};
use alea_playback::preferences::Preferences;
use alea_playback::transport::{PlayerSlots, SynchronizedTransport};
use alea_playback::types::{Resolution, VideoMode, ViewMode};

fn fixture_catalog() -> StaticCatalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalog.json");
    StaticCatalog::load(path).expect("fixture catalog")
}

fn route(section_id: Option<&str>, slide_num: Option<u32>) -> RouteState {
    RouteState {
        institution_id: Some("FAU".into()),
        course_id: Some("ai-1".into()),
        instance: Some("WS25".into()),
        section_id: section_id.map(str::to_string),
        slide_num,
        ..Default::default()
    }
}

struct Page {
    view: CourseView<StaticCatalog>,
    navigator: Arc<RecordingNavigator>,
    factory: SimulatedFactory,
}

async fn open(route: RouteState, prefs: Preferences) -> Page {
    let factory = SimulatedFactory::new();
    let navigator = Arc::new(RecordingNavigator::new());
    let coordinator =
        Arc::new(SlideCoordinator::new(RouteKind::InstitutionScoped, navigator.clone(), prefs, route));
    let transport = SynchronizedTransport::new(
        Arc::new(factory.clone()),
        PlayerSlots::attached(),
        Arc::new(SyncConfig::default()),
    );
    let mut view =
        CourseView::new(Arc::new(fixture_catalog()), coordinator, transport, Resolution::DEFAULT).unwrap();
    view.load_course().await;
    Page { view, navigator, factory }
}

#[tokio::test(start_paused = true)]
async fn section_without_slides_shows_only_the_video() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut page = open(route(Some("demo"), Some(1)), Preferences::in_memory()).await;

    let mode = page.view.refresh().await.unwrap();
    assert!(!page.view.section_contain_slides());
    assert_eq!(mode, DisplayMode::VideoOnly);
    assert!(!page.view.display_inputs().slide_deck_below());
    assert_eq!(page.view.current_video_url().as_deref(), Some("https://media.example/clip-3-720.mp4"));
    assert!(page.factory.latest(EngineKind::Presenter).is_some());
    assert!(page.factory.latest(EngineKind::Presentation).is_none());
}

#[tokio::test(start_paused = true)]
async fn section_without_clip_or_slides_is_empty() {
    let mut page = open(route(Some("search"), Some(1)), Preferences::in_memory()).await;
    assert_eq!(page.view.refresh().await.unwrap(), DisplayMode::Empty);
    assert!(page.factory.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slide_mode_keeps_the_deck_and_drops_the_video() {
    let mut page = open(route(Some("intro"), Some(1)), Preferences::in_memory()).await;
    page.view.refresh().await.unwrap();
    let presenter = page.factory.latest(EngineKind::Presenter).unwrap();

    let mode = page.view.set_view_mode(ViewMode::SlideMode).await.unwrap();
    assert_eq!(mode, DisplayMode::SlideOnly);
    assert!(presenter.is_disposed());

    let (kind, target) = page.navigator.last().unwrap();
    assert_eq!(kind, NavigationKind::Replace);
    assert!(target.shallow);
    assert_eq!(page.view.coordinator().preferences().default_mode(), Some(ViewMode::SlideMode));
}

#[tokio::test(start_paused = true)]
async fn resume_uses_last_read_position() {
    let prefs = Preferences::in_memory();
    prefs.set_last_read("ai-1", "logic", 2).unwrap();

    let page = open(route(None, None), prefs).await;
    assert!(page.view.resume().await.unwrap());

    let resumed = page.view.route();
    assert_eq!(resumed.section_id.as_deref(), Some("logic"));
    assert_eq!(resumed.slide_num, Some(2));
    let (kind, target) = page.navigator.last().unwrap();
    assert_eq!(kind, NavigationKind::Replace);
    assert_eq!(target.query.get(SECTION_ID).map(String::as_str), Some("logic"));
}

#[tokio::test(start_paused = true)]
async fn resume_without_history_starts_at_first_section() {
    let page = open(route(None, None), Preferences::in_memory()).await;
    assert!(page.view.resume().await.unwrap());
    assert_eq!(page.view.section_id().as_deref(), Some("intro"));
    assert_eq!(page.view.route().slide_num, Some(1));
}

#[tokio::test(start_paused = true)]
async fn repeated_slide_writes_navigate_once() {
    let page = open(route(Some("intro"), Some(1)), Preferences::in_memory()).await;
    let coordinator = page.view.coordinator();

    assert!(coordinator.set_slide_and_section(2, Some("intro")).await.unwrap());
    assert!(!coordinator.set_slide_and_section(2, Some("intro")).await.unwrap());
    assert!(!coordinator.set_slide_and_section(2, None).await.unwrap());

    assert_eq!(page.navigator.len(), 1);
    let (kind, target) = page.navigator.last().unwrap();
    assert_eq!(kind, NavigationKind::Push);
    assert_eq!(target.pathname, "/FAU/ai-1/WS25/course-view");
    assert_eq!(target.query.get(SLIDE_NUM).map(String::as_str), Some("2"));
    assert_eq!(coordinator.preferences().last_read_slide("ai-1"), Some(2));
}

#[tokio::test(start_paused = true)]
async fn slide_at_start_keeps_the_presentation_hidden() {
    let prefs = Preferences::in_memory();
    prefs.set_video_mode(VideoMode::Presenter).unwrap();
    let mut page = open(route(Some("intro"), Some(1)), prefs).await;

    // clip-1 has a marker at 0s, so a slide is showing before playback starts
    assert_eq!(page.view.refresh().await.unwrap(), DisplayMode::SideBySide);
    assert!(page.view.show_side_by_side_slides());
    assert!(page.factory.latest(EngineKind::Presenter).is_some());
    assert!(page.factory.created_of(EngineKind::Presentation).is_empty());
}

#[tokio::test(start_paused = true)]
async fn resolution_change_gives_up_on_a_source_that_never_loads() {
    let prefs = Preferences::in_memory();
    prefs.set_video_mode(VideoMode::Presenter).unwrap();
    let mut page = open(route(Some("intro"), Some(1)), prefs).await;
    page.view.refresh().await.unwrap();
    page.factory.set_manual_ready(true);

    let err = page.view.change_resolution(Resolution(360)).await.unwrap_err();
    assert!(matches!(err, PlaybackError::Timeout { .. }));
    assert!(page.view.transport().auto_sync());
    assert_eq!(page.view.current_video_url().as_deref(), Some("https://media.example/clip-1-360.mp4"));
}
