//! Headless synchronization core for ALeA lecture playback.
//!
//! A course page shows up to three surfaces at once: the presenter video
//! (or an audio-only element), an optional presentation recording, and the
//! slide deck of the current section. This crate keeps them consistent.
//!
//! # Features
//!
//! - **Synchronized players**: a secondary presentation engine follows the
//!   primary's play/pause/seek and rate, and is torn down when hidden
//! - **Slide markers**: timeline ticks derived from slide extraction data,
//!   with auto-sync that moves the deck as playback crosses a marker
//! - **Single route writer**: every slide/section change goes through one
//!   [`SlideCoordinator`](navigation::SlideCoordinator) that deduplicates
//!   navigations and persists the last-read position
//! - **Display modes**: one [`DisplayMode`](display::DisplayMode) derived
//!   from route, preferences and clip state
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use alea_playback::catalog::StaticCatalog;
//! use alea_playback::composition::CourseView;
//! use alea_playback::config::SyncConfig;
//! use alea_playback::engines::SimulatedFactory;
//! use alea_playback::navigation::{RecordingNavigator, RouteKind, RouteState, SlideCoordinator};
//! use alea_playback::preferences::Preferences;
//! use alea_playback::transport::{PlayerSlots, SynchronizedTransport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> alea_playback::Result<()> {
//!     let catalog = Arc::new(StaticCatalog::load("catalog.json")?);
//!     let config = Arc::new(SyncConfig::load("sync.yaml")?);
//!     let route = RouteState {
//!         institution_id: Some("FAU".into()),
//!         course_id: Some("ai-1".into()),
//!         instance: Some("WS25".into()),
//!         ..Default::default()
//!     };
//!
//!     let coordinator = Arc::new(SlideCoordinator::new(
//!         RouteKind::InstitutionScoped,
//!         Arc::new(RecordingNavigator::new()),
//!         Preferences::in_memory(),
//!         route,
//!     ));
//!     let transport = SynchronizedTransport::new(
//!         Arc::new(SimulatedFactory::new()),
//!         PlayerSlots::attached(),
//!         config.clone(),
//!     );
//!
//!     let mut view = CourseView::new(catalog, coordinator, transport, config.default_resolution())?;
//!     view.load_course().await;
//!     view.resume().await?;
//!     let mode = view.refresh().await?;
//!     println!("displaying {mode:?}");
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub mod catalog;
pub mod config;
pub mod markers;
pub mod preferences;

// Players and synchronization
pub mod adapters;
pub mod driver;
pub mod engine;
pub mod engines;
pub mod overlay;
pub mod stream;
pub mod transport;

// Course page
pub mod composition;
pub mod display;
pub mod navigation;

// Core exports
pub use error::*;
pub use types::*;

pub use composition::CourseView;
pub use config::SyncConfig;
pub use display::DisplayMode;
pub use navigation::{RouteState, SlideCoordinator};
pub use preferences::Preferences;
pub use transport::SynchronizedTransport;
