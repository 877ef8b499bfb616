//! Timestamped slide markers

use serde::{Deserialize, Serialize};

/// Slide metadata attached to a [`Marker`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    /// Section the slide belongs to
    pub section_id: String,
    /// Content URI of the slide
    pub slide_uri: String,
    /// Content URI of the section
    pub section_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_slide_content: Option<String>,
}

/// A moment in a clip associated with a slide of a section.
///
/// Markers are immutable once derived for a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Playback position in seconds
    pub time: f64,
    /// Display label (section title)
    pub label: String,
    pub data: MarkerData,
}

impl Marker {
    pub fn new(time: f64, label: impl Into<String>, data: MarkerData) -> Self {
        Self { time, label: label.into(), data }
    }

    /// The `(section_id, slide_uri)` pair this marker points at.
    pub fn slide_key(&self) -> (&str, &str) {
        (&self.data.section_id, &self.data.slide_uri)
    }
}
