//! In-memory catalog backed by JSON documents

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::CatalogSource;
use super::clip::ClipDetails;
use super::model::{ClipExtraction, SectionInfo, SlideCounts, SlidesUriToIndexMap, TocElem};
use crate::{PlaybackError, Result};

/// Everything the course view fetches for one course.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseDocument {
    pub slide_counts: SlideCounts,
    pub slide_uri_to_index: SlidesUriToIndexMap,
    pub sections: Vec<SectionInfo>,
    pub toc: Vec<TocElem>,
    /// `clip id → extracted slide metadata`
    pub slide_details: HashMap<String, ClipExtraction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogDocument {
    courses: HashMap<String, CourseDocument>,
    clips: HashMap<String, ClipDetails>,
}

/// Catalog serving fixed documents, optionally with simulated latency.
///
/// Stands in for the course backend in headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    courses: HashMap<String, CourseDocument>,
    clips: HashMap<String, ClipDetails>,
    latency: Option<Duration>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog document of the form `{"courses": {...}, "clips": {...}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc = parse_document(json)
            .map_err(|e| PlaybackError::parse("catalog document", format!("{e:#}")))?;

        info!(courses = doc.courses.len(), clips = doc.clips.len(), "Loaded catalog document");
        Ok(Self { courses: doc.courses, clips: doc.clips, latency: None })
    }

    /// Read and parse a catalog document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PlaybackError::storage_error(path.to_path_buf(), e))?;
        Self::from_json(&json)
    }

    pub fn with_course(mut self, course_id: impl Into<String>, doc: CourseDocument) -> Self {
        self.courses.insert(course_id.into(), doc);
        self
    }

    pub fn with_clip(mut self, clip_id: impl Into<String>, details: ClipDetails) -> Self {
        self.clips.insert(clip_id.into(), details);
        self
    }

    /// Delay every response, modelling a slow backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn respond(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn course(&self, course_id: &str) -> Result<&CourseDocument> {
        self.courses
            .get(course_id)
            .ok_or_else(|| PlaybackError::fetch_failed(format!("course '{course_id}'")))
    }
}

fn parse_document(json: &str) -> anyhow::Result<CatalogDocument> {
    let doc: CatalogDocument =
        serde_json::from_str(json).context("catalog is not a valid JSON document")?;

    for (course_id, course) in &doc.courses {
        for (section_id, slides) in &course.slide_uri_to_index {
            let count = course.slide_counts.get(section_id).copied().unwrap_or(u32::MAX);
            if slides.values().any(|index| *index as u64 >= count as u64) {
                anyhow::bail!(
                    "course '{course_id}' section '{section_id}' maps a slide past its slide count {count}"
                );
            }
        }
    }

    Ok(doc)
}

#[async_trait::async_trait]
impl CatalogSource for StaticCatalog {
    async fn slide_counts(&self, course_id: &str) -> Result<SlideCounts> {
        self.respond().await;
        trace!(course_id, "Serving slide counts");
        Ok(self.course(course_id)?.slide_counts.clone())
    }

    async fn slide_uri_to_index(&self, course_id: &str) -> Result<SlidesUriToIndexMap> {
        self.respond().await;
        Ok(self.course(course_id)?.slide_uri_to_index.clone())
    }

    async fn section_info(&self, course_id: &str) -> Result<Vec<SectionInfo>> {
        self.respond().await;
        Ok(self.course(course_id)?.sections.clone())
    }

    async fn table_of_contents(&self, course_id: &str) -> Result<Vec<TocElem>> {
        self.respond().await;
        Ok(self.course(course_id)?.toc.clone())
    }

    async fn slide_details(&self, course_id: &str, clip_id: &str) -> Result<ClipExtraction> {
        self.respond().await;
        let course = self.course(course_id)?;
        debug!(course_id, clip_id, "Serving slide details");
        course
            .slide_details
            .get(clip_id)
            .cloned()
            .ok_or_else(|| PlaybackError::fetch_failed(format!("slide details for clip '{clip_id}'")))
    }

    async fn clip_details(&self, clip_id: &str) -> Result<ClipDetails> {
        self.respond().await;
        self.clips
            .get(clip_id)
            .cloned()
            .ok_or_else(|| PlaybackError::fetch_failed(format!("clip details for '{clip_id}'")))
    }
}
