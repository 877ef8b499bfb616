//! Clip details, resolution selection and slide timing lookups

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::model::{ClipInfo, SlidesClipInfo, SlidesUriToIndexMap};
use crate::types::{Resolution, SlideClipRange, VideoMode};

/// Per-clip media details: one MP4 url per resolution plus optional
/// presentation (screen capture) and composite recordings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipDetails {
    #[serde(rename = "presentationUrl", default, skip_serializing_if = "Option::is_none")]
    pub presentation_url: Option<String>,
    #[serde(rename = "presentation_url", default, skip_serializing_if = "Option::is_none")]
    pub presentation_url_legacy: Option<String>,
    #[serde(rename = "compositeUrl", default, skip_serializing_if = "Option::is_none")]
    pub composite_url: Option<String>,
    #[serde(rename = "composite_url", default, skip_serializing_if = "Option::is_none")]
    pub composite_url_legacy: Option<String>,
    #[serde(rename = "thumbnailUrl", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Language code → caption url; the `default` key repeats the default track's url
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subtitles: BTreeMap<String, String>,
    /// `r360` / `r720` / `r1080` style keys, plus anything else the backend sends
    #[serde(flatten)]
    pub sources: BTreeMap<String, serde_json::Value>,
}

/// A caption track offered by a clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub language: String,
    pub url: String,
    pub is_default: bool,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl ClipDetails {
    /// Resolutions with a non-empty source url, lowest first.
    pub fn available_resolutions(&self) -> Vec<Resolution> {
        let mut out: Vec<Resolution> = self
            .sources
            .iter()
            .filter(|(_, value)| value.as_str().is_some_and(|s| !s.is_empty()))
            .filter_map(|(key, _)| Resolution::from_key(key))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Presenter video url at `wanted`, falling back to the lowest available
    /// resolution when `wanted` is not offered.
    pub fn video_url(&self, wanted: Resolution) -> Option<&str> {
        let available = self.available_resolutions();
        let chosen = if available.contains(&wanted) { wanted } else { *available.first()? };
        self.sources.get(&chosen.key()).and_then(|v| v.as_str())
    }

    pub fn presentation_url(&self) -> Option<&str> {
        non_empty(&self.presentation_url).or_else(|| non_empty(&self.presentation_url_legacy))
    }

    pub fn composite_url(&self) -> Option<&str> {
        non_empty(&self.composite_url).or_else(|| non_empty(&self.composite_url_legacy))
    }

    /// The recording shown in the secondary player: presentation, else composite.
    pub fn secondary_url(&self) -> Option<&str> {
        self.presentation_url().or_else(|| self.composite_url())
    }

    /// The url the course view starts with for the given video mode.
    pub fn default_video_url(&self, mode: VideoMode, resolution: Resolution) -> Option<&str> {
        let presenter = self.video_url(resolution);
        match mode {
            VideoMode::Presenter => {
                presenter.or_else(|| self.composite_url()).or_else(|| self.presentation_url())
            }
            VideoMode::Presentation | VideoMode::Auto => self
                .presentation_url()
                .or_else(|| self.composite_url())
                .or(presenter),
        }
    }

    /// Whether `url` is one of the presentation or composite recordings.
    pub fn is_secondary_recording(&self, url: &str) -> bool {
        self.presentation_url() == Some(url) || self.composite_url() == Some(url)
    }

    /// Caption tracks, excluding the `default` alias entry.
    pub fn subtitle_tracks(&self) -> Vec<SubtitleTrack> {
        let default = self.subtitles.get("default");
        self.subtitles
            .iter()
            .filter(|(code, url)| code.as_str() != "default" && !url.is_empty())
            .map(|(code, url)| SubtitleTrack {
                language: code.clone(),
                url: url.clone(),
                is_default: default == Some(url),
            })
            .collect()
    }
}

/// The clip entry for a slide, preferring the one recorded in `clip_id`.
pub fn clip_for_slide<'a>(
    slides_clip_info: &'a SlidesClipInfo,
    section_id: &str,
    slide_uri: &str,
    clip_id: Option<&str>,
) -> Option<&'a ClipInfo> {
    let clips = slides_clip_info.get(section_id)?.get(slide_uri)?;
    clip_id
        .and_then(|id| clips.iter().find(|c| c.video_id == id))
        .or_else(|| clips.first())
}

/// Time window of the current slide inside the clip `clip_id`.
///
/// Only an exact clip match counts; a slide recorded in another clip has no
/// window in the current video.
pub fn current_slide_clip_range(
    slide_uri: Option<&str>,
    section_id: Option<&str>,
    slides_clip_info: &SlidesClipInfo,
    clip_id: Option<&str>,
) -> Option<SlideClipRange> {
    let slide_uri = slide_uri.filter(|s| !s.is_empty())?;
    let section_id = section_id.filter(|s| !s.is_empty())?;
    let clip_id = clip_id.filter(|s| !s.is_empty())?;

    let clips = slides_clip_info.get(section_id)?.get(slide_uri)?;
    let matching = clips.iter().find(|c| c.video_id == clip_id)?;
    Some(SlideClipRange::new(matching.start_time?, matching.end_time?))
}

/// The uri of a section's first slide: index 0 if mapped, else the first entry.
pub fn first_slide_uri<'a>(
    slides_uri_to_index: &'a SlidesUriToIndexMap,
    section_id: &str,
) -> Option<&'a str> {
    let slides = slides_uri_to_index.get(section_id)?;
    slides
        .iter()
        .find(|(_, index)| **index == 0)
        .or_else(|| slides.iter().next())
        .map(|(uri, _)| uri.as_str())
}

/// Start time of a section's first slide, preferring the clip `clip_id`.
pub fn first_slide_time(
    section_id: Option<&str>,
    slides_clip_info: &SlidesClipInfo,
    slides_uri_to_index: &SlidesUriToIndexMap,
    clip_id: Option<&str>,
) -> Option<f64> {
    let section_id = section_id.filter(|s| !s.is_empty())?;
    let first_uri = first_slide_uri(slides_uri_to_index, section_id)?;
    clip_for_slide(slides_clip_info, section_id, first_uri, clip_id)?.start_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn details(json: &str) -> ClipDetails {
        serde_json::from_str(json).unwrap()
    }

    fn timing() -> SlidesClipInfo {
        serde_json::from_str(
            r#"{"sec": {
                "slide-a": [{"video_id": "other", "start_time": 5, "end_time": 9},
                            {"video_id": "clip", "start_time": 10, "end_time": 40}],
                "slide-b": [{"video_id": "other", "start_time": 50, "end_time": 70}]
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn resolutions_are_sorted_and_skip_empty_sources() {
        let d = details(
            r#"{"r1080": "hd.mp4", "r360": "sd.mp4", "r720": "", "thumbnailUrl": "t.png", "rating": 4}"#,
        );
        assert_eq!(d.available_resolutions(), vec![Resolution(360), Resolution(1080)]);
        assert_eq!(d.video_url(Resolution(1080)), Some("hd.mp4"));
        assert_eq!(d.video_url(Resolution(720)), Some("sd.mp4"));
        assert_eq!(d.thumbnail_url.as_deref(), Some("t.png"));
    }

    #[test]
    fn no_sources_means_no_url() {
        assert_eq!(ClipDetails::default().video_url(Resolution(720)), None);
    }

    #[test]
    fn presentation_urls_accept_both_spellings() {
        let camel = details(r#"{"presentationUrl": "p.mp4", "r720": "v.mp4"}"#);
        let snake = details(r#"{"composite_url": "c.mp4", "r720": "v.mp4"}"#);
        assert_eq!(camel.secondary_url(), Some("p.mp4"));
        assert_eq!(snake.secondary_url(), Some("c.mp4"));
        assert!(snake.is_secondary_recording("c.mp4"));
    }

    #[test]
    fn default_url_follows_video_mode() {
        let d = details(r#"{"presentationUrl": "p.mp4", "r720": "v.mp4"}"#);
        assert_eq!(d.default_video_url(VideoMode::Auto, Resolution(720)), Some("p.mp4"));
        assert_eq!(d.default_video_url(VideoMode::Presenter, Resolution(720)), Some("v.mp4"));

        let presenter_only = details(r#"{"r360": "v.mp4"}"#);
        assert_eq!(
            presenter_only.default_video_url(VideoMode::Presentation, Resolution(720)),
            Some("v.mp4")
        );
    }

    #[test]
    fn subtitle_tracks_mark_default() {
        let d = details(r#"{"subtitles": {"en": "en.vtt", "de": "de.vtt", "default": "de.vtt"}}"#);
        let tracks = d.subtitle_tracks();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().any(|t| t.language == "de" && t.is_default));
        assert!(tracks.iter().any(|t| t.language == "en" && !t.is_default));
    }

    #[test]
    fn slide_clip_range_requires_exact_clip() {
        let info = timing();
        assert_eq!(
            current_slide_clip_range(Some("slide-a"), Some("sec"), &info, Some("clip")),
            Some(SlideClipRange::new(10.0, 40.0))
        );
        assert_eq!(current_slide_clip_range(Some("slide-b"), Some("sec"), &info, Some("clip")), None);
        assert_eq!(current_slide_clip_range(None, Some("sec"), &info, Some("clip")), None);
    }

    #[test]
    fn first_slide_time_falls_back_to_first_clip() {
        let info = timing();
        let mut uris = SlidesUriToIndexMap::new();
        uris.entry("sec".into()).or_default().insert("slide-b".into(), 1);
        uris.entry("sec".into()).or_default().insert("slide-a".into(), 0);

        assert_eq!(first_slide_time(Some("sec"), &info, &uris, Some("clip")), Some(10.0));
        assert_eq!(first_slide_time(Some("sec"), &info, &uris, Some("missing")), Some(5.0));
        assert_eq!(first_slide_time(Some("nope"), &info, &uris, None), None);
    }

    proptest! {
        #[test]
        fn prop_resolution_selection_never_fails(
            offered in prop::collection::btree_set(prop::sample::select(vec![240u32, 360, 480, 720, 1080, 1440]), 1..5),
            wanted in 1u32..2000
        ) {
            let mut d = ClipDetails::default();
            for res in &offered {
                d.sources.insert(format!("r{res}"), serde_json::Value::String(format!("{res}.mp4")));
            }

            let url = d.video_url(Resolution(wanted));
            let lowest = offered.iter().next().copied().unwrap_or_default();
            let expected = if offered.contains(&wanted) { wanted } else { lowest };
            let expected_url = format!("{expected}.mp4");
            prop_assert_eq!(url, Some(expected_url.as_str()));
        }
    }
}
