//! Test fixtures shared by unit tests and benchmarks
//!
//! The course catalog lives in `tests/fixtures/catalog.json` so integration
//! tests and benches read the same data as the unit tests.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::BTreeMap;

use crate::catalog::{SlidesUriToIndexMap, StaticCatalog};
use crate::navigation::RouteState;
use crate::types::{Marker, MarkerData};

/// The fixture catalog document.
pub const CATALOG_JSON: &str = include_str!("../tests/fixtures/catalog.json");

/// Course id of the fixture course.
pub const COURSE_ID: &str = "ai-1";

/// Parse [`CATALOG_JSON`].
///
/// Course `ai-1` has sections `intro` (clip-1), `logic` (clip-2, some
/// slides also shown in clip-1), `search` (no clip, no slides) and `demo`
/// (clip-3, video without slides).
pub fn catalog() -> StaticCatalog {
    StaticCatalog::from_json(CATALOG_JSON).expect("fixture catalog must parse")
}

/// A marker labelled with its section.
pub fn marker(time: f64, section_id: &str, slide_uri: &str) -> Marker {
    Marker::new(
        time,
        format!("Section {section_id}"),
        MarkerData {
            section_id: section_id.to_string(),
            slide_uri: slide_uri.to_string(),
            section_uri: format!("sec/{section_id}"),
            thumbnail: None,
            description: None,
            ocr_slide_content: None,
        },
    )
}

/// Index mapping for one section; each uri maps to its position.
pub fn slide_index(section_id: &str, uris: &[&str]) -> SlidesUriToIndexMap {
    let slides: BTreeMap<String, usize> =
        uris.iter().enumerate().map(|(i, uri)| (uri.to_string(), i)).collect();
    BTreeMap::from([(section_id.to_string(), slides)])
}

/// Institution-scoped route into the fixture course.
pub fn scoped_route(section_id: &str, slide_num: u32) -> RouteState {
    RouteState {
        institution_id: Some("FAU".to_string()),
        course_id: Some(COURSE_ID.to_string()),
        instance: Some("WS25".to_string()),
        section_id: Some(section_id.to_string()),
        slide_num: Some(slide_num),
        ..Default::default()
    }
}
