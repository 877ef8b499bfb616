//! Course and clip metadata consumed by the course view.
//!
//! The backend is an external collaborator; this module only fixes the
//! document shapes it returns and the [`CatalogSource`] seam the course view
//! fetches through. [`StaticCatalog`] serves fixed JSON documents.

mod clip;
mod model;
mod static_catalog;

pub use clip::{
    ClipDetails, SubtitleTrack, clip_for_slide, current_slide_clip_range, first_slide_time,
    first_slide_uri,
};
pub use model::{
    ClipExtraction, ClipInfo, ClipMetadata, SectionInfo, SlideCounts, SlidesClipInfo,
    SlidesUriToIndexMap, TocElem, collect_clip_ids, collect_slides_clip_info, find_section,
    section_order,
};
pub use static_catalog::{CourseDocument, StaticCatalog};

use crate::Result;

/// Source of course and clip metadata.
///
/// Every method is a suspension point for the caller; failures are reported
/// as [`PlaybackError::Fetch`](crate::PlaybackError::Fetch) and are never
/// retried automatically.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    /// Number of slides per section
    async fn slide_counts(&self, course_id: &str) -> Result<SlideCounts>;

    /// 0-based slide index per slide uri, per section
    async fn slide_uri_to_index(&self, course_id: &str) -> Result<SlidesUriToIndexMap>;

    /// Section tree carrying clip assignments and per-slide clip timing
    async fn section_info(&self, course_id: &str) -> Result<Vec<SectionInfo>>;

    /// Rendered table of contents, the source of section ordering
    async fn table_of_contents(&self, course_id: &str) -> Result<Vec<TocElem>>;

    /// Slide metadata extracted from a clip, keyed by timestamp
    async fn slide_details(&self, course_id: &str, clip_id: &str) -> Result<ClipExtraction>;

    /// Media urls of a clip
    async fn clip_details(&self, clip_id: &str) -> Result<ClipDetails>;
}
