//! Marker index: "which slide is active at time T"

use std::sync::Arc;
use tracing::trace;

use crate::catalog::{ClipExtraction, ClipMetadata};
use crate::types::{Marker, MarkerData};

/// Markers sorted by descending time for latest-at-or-before lookups.
///
/// Sorting is stable, so among markers sharing a time the one that came
/// first in the input wins every lookup.
#[derive(Debug, Clone, Default)]
pub struct MarkerIndex {
    desc: Vec<Marker>,
}

impl MarkerIndex {
    /// Build an index; markers with a non-finite time are dropped.
    pub fn new<I>(markers: I) -> Self
    where
        I: IntoIterator<Item = Marker>,
    {
        let mut desc: Vec<Marker> = markers.into_iter().filter(|m| m.time.is_finite()).collect();
        desc.sort_by(|a, b| b.time.total_cmp(&a.time));
        Self { desc }
    }

    pub fn len(&self) -> usize {
        self.desc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desc.is_empty()
    }

    /// Markers in descending time order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.desc.iter()
    }

    /// The marker with the greatest `time <= t`, or `None`.
    pub fn latest_at_or_before(&self, t: f64) -> Option<&Marker> {
        if t.is_nan() {
            return None;
        }
        let idx = self.desc.partition_point(|m| m.time > t);
        self.desc.get(idx)
    }

    /// The marker closest to `t` within `tolerance` seconds.
    pub fn marker_near(&self, t: f64, tolerance: f64) -> Option<&Marker> {
        if !t.is_finite() {
            return None;
        }
        self.desc
            .iter()
            .filter(|m| (m.time - t).abs() < tolerance)
            .min_by(|a, b| (a.time - t).abs().total_cmp(&(b.time - t).abs()))
    }
}

/// Rebuilds a [`MarkerIndex`] only when the marker collection changes.
///
/// Change detection is by `Arc` identity: handing the same collection back
/// reuses the index, a new collection (even if equal) rebuilds it.
#[derive(Debug, Default)]
pub struct MarkerCache {
    source: Option<Arc<[Marker]>>,
    index: Arc<MarkerIndex>,
}

impl MarkerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_for(&mut self, markers: &Arc<[Marker]>) -> Arc<MarkerIndex> {
        let fresh = self.source.as_ref().is_some_and(|s| Arc::ptr_eq(s, markers));
        if !fresh {
            trace!(count = markers.len(), "Rebuilding marker index");
            self.index = Arc::new(MarkerIndex::new(markers.iter().cloned()));
            self.source = Some(Arc::clone(markers));
        }
        Arc::clone(&self.index)
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn marker_time(key: &str, meta: &ClipMetadata) -> f64 {
    let keyed = key.trim().parse::<f64>().ok().filter(|t| t.is_finite() && *t != 0.0);
    keyed.or(meta.start_time).unwrap_or(0.0).floor()
}

/// Derive markers from a clip's extracted slide metadata.
///
/// Entries without a section id or slide uri are skipped. Times are the
/// floor of the timestamp key, falling back to the entry's `start_time`.
/// Output is ordered by timestamp.
pub fn markers_from_metadata(extraction: &ClipExtraction) -> Vec<Marker> {
    let mut entries: Vec<(f64, &ClipMetadata)> = extraction
        .iter()
        .filter(|(_, meta)| !is_blank(&meta.section_id) && !is_blank(&meta.slide_uri))
        .map(|(key, meta)| (marker_time(key, meta), meta))
        .collect();
    entries.sort_by(|a, b| a.0.total_cmp(&b.0));

    entries
        .into_iter()
        .map(|(time, meta)| Marker {
            time,
            label: meta
                .section_title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            data: MarkerData {
                section_id: meta.section_id.clone(),
                slide_uri: meta.slide_uri.clone(),
                section_uri: meta.section_uri.clone(),
                thumbnail: meta.thumbnail.clone(),
                description: None,
                ocr_slide_content: meta.ocr_slide_content.clone(),
            },
        })
        .collect()
}

/// Whether the extraction has a usable slide marker for `section_id`.
pub fn extraction_has_slides_for(extraction: &ClipExtraction, section_id: &str) -> bool {
    extraction
        .values()
        .any(|meta| meta.section_id.trim() == section_id && !is_blank(&meta.slide_uri))
}
