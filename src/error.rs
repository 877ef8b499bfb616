//! Error types for playback synchronization.
//!
//! Nothing in this crate is treated as fatal to a rendered course view. The worst
//! case is a degraded view (video without slides, or slides without video), so
//! most call sites log an error and fall back instead of propagating it further.
//!
//! ## Error Categories
//!
//! - **Engine Errors**: A media engine could not be created, loaded or disposed
//! - **Autoplay**: The host refused programmatic playback until a user gesture
//! - **Mounting**: The element slot an engine binds to is not attached yet
//! - **Fetch Errors**: Course or clip metadata could not be retrieved
//! - **Route Errors**: Required route parameters are missing or malformed
//! - **Storage Errors**: The preference store could not be read or written
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use alea_playback::PlaybackError;
//!
//! let error = PlaybackError::node_unavailable("presentation");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for playback operations.
pub type Result<T, E = PlaybackError> = std::result::Result<T, E>;

/// Main error type for playback operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("Media engine failure: {reason}")]
    Engine {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to dispose {engine} engine: {reason}")]
    Disposal { engine: String, reason: String },

    #[error("Playback was blocked by autoplay policy: {reason}")]
    AutoplayRejected { reason: String },

    #[error("Element slot '{slot}' is not attached")]
    NodeUnavailable { slot: String },

    #[error("Failed to fetch {resource}")]
    Fetch {
        resource: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Missing route parameters: {missing:?}")]
    MissingRouteParams { missing: Vec<&'static str> },

    #[error("Invalid value '{value}' for route parameter '{param}'")]
    InvalidRouteParam { param: String, value: String },

    #[error("Preference storage error: {path}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

impl PlaybackError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlaybackError::Engine { .. } => true,
            PlaybackError::Disposal { .. } => false,
            PlaybackError::AutoplayRejected { .. } => true,
            PlaybackError::NodeUnavailable { .. } => true,
            PlaybackError::Fetch { .. } => true,
            PlaybackError::Parse { .. } => false,
            PlaybackError::Timeout { .. } => true,
            PlaybackError::MissingRouteParams { .. } => false,
            PlaybackError::InvalidRouteParam { .. } => false,
            PlaybackError::Storage { .. } => false,
            PlaybackError::Cancelled { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PlaybackError::Engine { .. } => vec![
                "Check that the media source URL is reachable",
                "Verify the source is an MP4 resource",
                "Recreate the engine after the element remounts",
            ],
            PlaybackError::Disposal { .. } => vec![
                "Ignore: disposal is best-effort cleanup",
                "Check whether the element was already removed",
            ],
            PlaybackError::AutoplayRejected { .. } => vec![
                "Wait for a user gesture before calling play",
                "Start muted playback where the host allows it",
            ],
            PlaybackError::NodeUnavailable { .. } => vec![
                "Retry once the element has been mounted",
                "Check that the view mode renders this element",
            ],
            PlaybackError::Fetch { .. } => vec![
                "Check network connectivity to the course backend",
                "Reload the course view to fetch again",
                "Verify the course and clip identifiers",
            ],
            PlaybackError::Parse { .. } => vec![
                "Check the document format returned by the backend",
                "Verify configuration file syntax",
            ],
            PlaybackError::Timeout { .. } => {
                vec!["Increase the timeout", "Check whether the engine ever signals ready"]
            }
            PlaybackError::MissingRouteParams { .. } => vec![
                "Open the course view through the institution-scoped route",
                "Include institutionId, courseId and instance in the query",
            ],
            PlaybackError::InvalidRouteParam { .. } => vec![
                "Use SLIDE_MODE or COMBINED_MODE for viewMode",
                "Use a positive, 1-based slideNum",
                "Use \"true\" or \"false\" for audioOnly",
            ],
            PlaybackError::Storage { .. } => vec![
                "Check that the preference file is writable",
                "Delete a corrupted preference file to start fresh",
            ],
            PlaybackError::Cancelled { .. } => vec!["No action needed: inputs changed mid-flight"],
        }
    }

    /// Helper constructor for engine failures.
    pub fn engine_failed(reason: impl Into<String>) -> Self {
        PlaybackError::Engine { reason: reason.into(), source: None }
    }

    /// Helper constructor for engine failures with source.
    pub fn engine_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PlaybackError::Engine { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for disposal failures.
    pub fn disposal_failed(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        PlaybackError::Disposal { engine: engine.into(), reason: reason.into() }
    }

    /// Helper constructor for autoplay rejections.
    pub fn autoplay_rejected(reason: impl Into<String>) -> Self {
        PlaybackError::AutoplayRejected { reason: reason.into() }
    }

    /// Helper constructor for detached element slots.
    pub fn node_unavailable(slot: impl Into<String>) -> Self {
        PlaybackError::NodeUnavailable { slot: slot.into() }
    }

    /// Helper constructor for fetch failures.
    pub fn fetch_failed(resource: impl Into<String>) -> Self {
        PlaybackError::Fetch { resource: resource.into(), source: None }
    }

    /// Helper constructor for fetch failures with source.
    pub fn fetch_failed_with_source(
        resource: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PlaybackError::Fetch { resource: resource.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        PlaybackError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for invalid route parameters.
    pub fn invalid_route_param(param: impl Into<String>, value: impl Into<String>) -> Self {
        PlaybackError::InvalidRouteParam { param: param.into(), value: value.into() }
    }

    /// Helper constructor for preference storage errors.
    pub fn storage_error(path: PathBuf, source: std::io::Error) -> Self {
        PlaybackError::Storage { path, source }
    }

    /// Helper constructor for cancelled operations.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        PlaybackError::Cancelled { operation: operation.into() }
    }
}

impl From<std::io::Error> for PlaybackError {
    fn from(err: std::io::Error) -> Self {
        PlaybackError::Storage { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_json::Error> for PlaybackError {
    fn from(err: serde_json::Error) -> Self {
        PlaybackError::Parse { context: "JSON document".to_string(), details: err.to_string() }
    }
}

impl From<serde_yaml_ng::Error> for PlaybackError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        PlaybackError::Parse { context: "YAML configuration".to_string(), details: err.to_string() }
    }
}
