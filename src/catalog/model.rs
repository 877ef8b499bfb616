//! Backend document shapes consumed by the course view

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slide timing of one clip: when a slide starts and stops being shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub video_id: String,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
}

/// `section id → slide uri → clips showing that slide`
pub type SlidesClipInfo = BTreeMap<String, BTreeMap<String, Vec<ClipInfo>>>;

/// `section id → slide uri → 0-based slide index`
pub type SlidesUriToIndexMap = BTreeMap<String, BTreeMap<String, usize>>;

/// `section id → number of slides`
pub type SlideCounts = BTreeMap<String, u32>;

/// `timestamp (seconds, as a string key) → extracted slide metadata`
pub type ClipExtraction = BTreeMap<String, ClipMetadata>;

/// Slide metadata extracted from one point of a clip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipMetadata {
    #[serde(rename = "sectionId", default)]
    pub section_id: String,
    #[serde(rename = "sectionUri", default)]
    pub section_uri: String,
    #[serde(rename = "slideUri", default)]
    pub slide_uri: String,
    #[serde(rename = "sectionTitle", default)]
    pub section_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub ocr_slide_content: Option<String>,
    #[serde(default)]
    pub start_time: Option<f64>,
}

/// A node of the course's section tree as returned by the section-info endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub clip_id: Option<String>,
    #[serde(default)]
    pub clip_info: BTreeMap<String, Vec<ClipInfo>>,
    #[serde(default)]
    pub children: Vec<SectionInfo>,
}

/// Collect `section id → clip id` over a section tree.
pub fn collect_clip_ids(sections: &[SectionInfo]) -> BTreeMap<String, String> {
    fn walk(sections: &[SectionInfo], out: &mut BTreeMap<String, String>) {
        for section in sections {
            if let Some(clip_id) = section.clip_id.as_ref().filter(|c| !c.is_empty()) {
                out.insert(section.id.clone(), clip_id.clone());
            }
            walk(&section.children, out);
        }
    }

    let mut out = BTreeMap::new();
    walk(sections, &mut out);
    out
}

/// Collect per-section slide timing over a section tree.
pub fn collect_slides_clip_info(sections: &[SectionInfo]) -> SlidesClipInfo {
    fn walk(sections: &[SectionInfo], out: &mut SlidesClipInfo) {
        for section in sections {
            out.insert(section.id.clone(), section.clip_info.clone());
            walk(&section.children, out);
        }
    }

    let mut out = SlidesClipInfo::new();
    walk(sections, &mut out);
    out
}

/// An element of the rendered table of contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocElem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub children: Vec<TocElem>,
}

impl TocElem {
    pub fn section(id: impl Into<String>, children: Vec<TocElem>) -> Self {
        Self { kind: "Section".to_string(), id: Some(id.into()), title: None, children }
    }

    pub fn is_section(&self) -> bool {
        self.kind == "Section"
    }
}

/// Flatten the table of contents into the ordered list of section ids
/// used for previous/next section navigation.
pub fn section_order(toc: &[TocElem]) -> Vec<String> {
    let mut out = Vec::new();
    for elem in toc {
        if elem.is_section() {
            if let Some(id) = &elem.id {
                out.push(id.clone());
            }
        }
        out.extend(section_order(&elem.children));
    }
    out
}

/// Find a section element by id anywhere in the tree.
pub fn find_section<'a>(toc: &'a [TocElem], section_id: &str) -> Option<&'a TocElem> {
    for elem in toc {
        if elem.is_section() && elem.id.as_deref() == Some(section_id) {
            return Some(elem);
        }
        if let Some(found) = find_section(&elem.children, section_id) {
            return Some(found);
        }
    }
    None
}
