//! Learner preferences
//!
//! A small string key/value store that survives reloads, injected wherever a
//! preference is read or written. [`Preferences`] is the typed view used by
//! the course view; [`PreferenceStore`] is the storage seam.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::types::{Resolution, VideoMode, ViewMode};
use crate::{PlaybackError, Result};

const CHANGE_CAPACITY: usize = 32;

pub const DEFAULT_MODE_KEY: &str = "defaultMode";
pub const AUDIO_ONLY_KEY: &str = "audioOnly";
pub const DEFAULT_RESOLUTION_KEY: &str = "defaultResolution";
pub const VIDEO_MODE_KEY: &str = "videoMode";
pub const SHOW_CONCEPTS_KEY: &str = "alea_show_concepts_overlay";

pub fn last_read_section_key(course_id: &str) -> String {
    format!("lastReadSectionId-{course_id}")
}

pub fn last_read_slide_key(course_id: &str) -> String {
    format!("lastReadSlideNum-{course_id}")
}

/// A change to one key; `value` is `None` on removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceChange {
    pub key: String,
    pub value: Option<String>,
}

/// String key/value storage for preferences.
pub trait PreferenceStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Changes made after subscribing
    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn notify(changes: &broadcast::Sender<PreferenceChange>, key: &str, value: Option<&str>) {
    // No subscribers is fine
    let _ = changes.send(PreferenceChange { key: key.to_string(), value: value.map(str::to_string) });
}

/// Preferences kept for the lifetime of the process.
#[derive(Debug)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
    changes: broadcast::Sender<PreferenceChange>,
}

impl Default for MemoryPreferences {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { values: Mutex::default(), changes }
    }
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let previous = lock(&self.values).insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            notify(&self.changes, key, Some(value));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if lock(&self.values).remove(key).is_some() {
            notify(&self.changes, key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }
}

/// Preferences persisted as a JSON object in one file.
///
/// Every write rewrites the file through a temporary sibling and a rename,
/// so a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    changes: broadcast::Sender<PreferenceChange>,
}

impl FilePreferences {
    /// Open the store at `path`; a missing file starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                PlaybackError::parse(format!("preference file {}", path.display()), e.to_string())
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(PlaybackError::storage_error(path, e)),
        };
        debug!(path = %path.display(), "Opened preference file");

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self { path, values: Mutex::new(values), changes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).map_err(|e| PlaybackError::storage_error(tmp.clone(), e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| PlaybackError::storage_error(self.path.clone(), e))
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock(&self.values);
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&values) {
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(e);
        }
        drop(values);

        notify(&self.changes, key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = lock(&self.values);
        let Some(previous) = values.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&values) {
            values.insert(key.to_string(), previous);
            return Err(e);
        }
        drop(values);

        notify(&self.changes, key, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.changes.subscribe()
    }
}

/// Typed access to the learner's stored choices.
///
/// Reads never fail: unreadable or malformed values read as unset. Write
/// failures are returned so callers can log them.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences").finish_non_exhaustive()
    }
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferences::new()))
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreferenceChange> {
        self.store.subscribe()
    }

    pub fn last_read_section(&self, course_id: &str) -> Option<String> {
        self.store.get(&last_read_section_key(course_id)).filter(|s| !s.is_empty())
    }

    pub fn last_read_slide(&self, course_id: &str) -> Option<u32> {
        self.store.get(&last_read_slide_key(course_id))?.parse().ok().filter(|n| *n >= 1)
    }

    /// Remember the learner's position for resuming the course later.
    pub fn set_last_read(&self, course_id: &str, section_id: &str, slide_num: u32) -> Result<()> {
        self.store.set(&last_read_section_key(course_id), section_id)?;
        self.store.set(&last_read_slide_key(course_id), &slide_num.to_string())
    }

    pub fn default_mode(&self) -> Option<ViewMode> {
        self.store.get(DEFAULT_MODE_KEY)?.parse().ok()
    }

    pub fn set_default_mode(&self, mode: ViewMode) -> Result<()> {
        self.store.set(DEFAULT_MODE_KEY, mode.as_str())
    }

    pub fn audio_only(&self) -> bool {
        self.store.get(AUDIO_ONLY_KEY).as_deref() == Some("true")
    }

    pub fn set_audio_only(&self, audio_only: bool) -> Result<()> {
        self.store.set(AUDIO_ONLY_KEY, if audio_only { "true" } else { "false" })
    }

    pub fn default_resolution(&self) -> Option<Resolution> {
        self.store.get(DEFAULT_RESOLUTION_KEY)?.parse().ok()
    }

    pub fn set_default_resolution(&self, resolution: Resolution) -> Result<()> {
        self.store.set(DEFAULT_RESOLUTION_KEY, &resolution.0.to_string())
    }

    pub fn video_mode(&self) -> VideoMode {
        VideoMode::from_preference(self.store.get(VIDEO_MODE_KEY).as_deref())
    }

    /// `Auto` clears the stored choice.
    pub fn set_video_mode(&self, mode: VideoMode) -> Result<()> {
        match mode.preference_value() {
            Some(value) => self.store.set(VIDEO_MODE_KEY, value),
            None => self.store.remove(VIDEO_MODE_KEY),
        }
    }

    /// Concepts overlay next to the video; shown unless turned off.
    pub fn show_concepts_overlay(&self) -> bool {
        self.store.get(SHOW_CONCEPTS_KEY).map_or(true, |v| v == "true")
    }

    pub fn set_show_concepts_overlay(&self, show: bool) -> Result<()> {
        self.store.set(SHOW_CONCEPTS_KEY, if show { "true" } else { "false" })
    }

    /// Write and log instead of failing; preferences are best-effort.
    pub(crate) fn persist_or_log(&self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("Failed to persist {}: {}", what, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values_round_through_the_store() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.last_read_section("ai-1"), None);
        assert!(!prefs.audio_only());
        assert!(prefs.show_concepts_overlay());
        assert_eq!(prefs.video_mode(), VideoMode::Auto);

        prefs.set_last_read("ai-1", "intro", 4).unwrap();
        prefs.set_default_mode(ViewMode::SlideMode).unwrap();
        prefs.set_audio_only(true).unwrap();
        prefs.set_default_resolution(Resolution(1080)).unwrap();
        prefs.set_video_mode(VideoMode::Presenter).unwrap();
        prefs.set_show_concepts_overlay(false).unwrap();

        assert_eq!(prefs.last_read_section("ai-1").as_deref(), Some("intro"));
        assert_eq!(prefs.last_read_slide("ai-1"), Some(4));
        assert_eq!(prefs.store().get("lastReadSlideNum-ai-1").as_deref(), Some("4"));
        assert_eq!(prefs.default_mode(), Some(ViewMode::SlideMode));
        assert!(prefs.audio_only());
        assert_eq!(prefs.default_resolution(), Some(Resolution(1080)));
        assert_eq!(prefs.video_mode(), VideoMode::Presenter);
        assert!(!prefs.show_concepts_overlay());
    }

    #[test]
    fn malformed_values_read_as_unset() {
        let store = Arc::new(MemoryPreferences::new());
        store.set(DEFAULT_MODE_KEY, "FULLSCREEN").unwrap();
        store.set(&last_read_slide_key("c"), "zero").unwrap();
        let prefs = Preferences::new(store);

        assert_eq!(prefs.default_mode(), None);
        assert_eq!(prefs.last_read_slide("c"), None);
    }

    #[tokio::test]
    async fn subscribers_see_changes_once() {
        let prefs = Preferences::in_memory();
        let mut changes = prefs.subscribe();

        prefs.set_audio_only(true).unwrap();
        prefs.set_audio_only(true).unwrap();
        prefs.store().remove(AUDIO_ONLY_KEY).unwrap();

        let first = changes.recv().await.unwrap();
        assert_eq!(first, PreferenceChange { key: "audioOnly".into(), value: Some("true".into()) });
        let second = changes.recv().await.unwrap();
        assert_eq!(second.value, None);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = FilePreferences::open(&path).unwrap();
        store.set(DEFAULT_RESOLUTION_KEY, "360").unwrap();
        store.set(AUDIO_ONLY_KEY, "true").unwrap();
        store.remove(AUDIO_ONLY_KEY).unwrap();
        drop(store);

        let reopened = FilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get(DEFAULT_RESOLUTION_KEY).as_deref(), Some("360"));
        assert_eq!(reopened.get(AUDIO_ONLY_KEY), None);
    }

    #[test]
    fn failed_writes_leave_values_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("profile");
        std::fs::create_dir(&nested).unwrap();

        let store = FilePreferences::open(nested.join("prefs.json")).unwrap();
        store.set(DEFAULT_RESOLUTION_KEY, "360").unwrap();
        std::fs::remove_dir_all(&nested).unwrap();

        let err = store.set(DEFAULT_RESOLUTION_KEY, "1080").unwrap_err();
        assert!(matches!(err, PlaybackError::Storage { .. }));
        assert_eq!(store.get(DEFAULT_RESOLUTION_KEY).as_deref(), Some("360"));

        assert!(store.set(AUDIO_ONLY_KEY, "true").is_err());
        assert_eq!(store.get(AUDIO_ONLY_KEY), None);

        assert!(store.remove(DEFAULT_RESOLUTION_KEY).is_err());
        assert_eq!(store.get(DEFAULT_RESOLUTION_KEY).as_deref(), Some("360"));
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FilePreferences::open(&path).unwrap_err();
        assert!(matches!(err, PlaybackError::Parse { .. }));
    }
}
