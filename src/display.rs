//! Course view display mode
//!
//! One tagged state replaces the set of booleans the course view used to
//! combine per render. [`DisplayState`] keeps the inputs, applies
//! [`DisplayEvent`]s and reports when the resolved [`DisplayMode`] changes.

use serde::{Deserialize, Serialize};

use crate::types::ViewMode;

/// What the course view renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// No video for the section and no slides
    #[default]
    Empty,
    /// Slide deck only
    SlideOnly,
    /// Primary video without slides next to it
    VideoOnly,
    /// Native audio element in place of the video
    AudioOnly,
    /// Video with the current slide alongside
    SideBySide,
    /// Presentation recording at full width, slide deck hidden
    PresentationOverlay,
}

/// Everything the display mode depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayInputs {
    pub view_mode: ViewMode,
    pub audio_only: bool,
    /// The section has slides, from the index mapping or from clip markers
    pub has_slides: bool,
    /// A clip is assigned to the section
    pub has_video_for_section: bool,
    pub video_loaded: bool,
    pub slide_at_current_time: bool,
    /// The learner asked for the presentation recording
    pub show_presentation: bool,
    /// The primary source already is a presentation or composite recording
    pub presentation_available: bool,
}

impl DisplayInputs {
    /// Whether the video column is part of the layout at all.
    pub fn video_visible(&self) -> bool {
        self.view_mode == ViewMode::CombinedMode && self.has_video_for_section
    }

    /// Whether the slide deck renders below the video area instead of beside it.
    pub fn slide_deck_below(&self) -> bool {
        self.has_slides && !(self.view_mode == ViewMode::CombinedMode && self.video_loaded && self.has_video_for_section)
    }

    pub fn resolve(&self) -> DisplayMode {
        if !self.video_visible() {
            return if self.has_slides { DisplayMode::SlideOnly } else { DisplayMode::Empty };
        }
        if self.audio_only {
            return DisplayMode::AudioOnly;
        }
        if !self.video_loaded {
            return if self.has_slides { DisplayMode::SlideOnly } else { DisplayMode::VideoOnly };
        }
        if self.show_presentation || self.presentation_available {
            return DisplayMode::PresentationOverlay;
        }
        if show_side_by_side_slides(self) {
            return DisplayMode::SideBySide;
        }
        DisplayMode::VideoOnly
    }
}

/// Combined view with slides, a loaded video and a slide active at the
/// current playback position.
pub fn show_side_by_side_slides(inputs: &DisplayInputs) -> bool {
    inputs.view_mode == ViewMode::CombinedMode
        && inputs.has_slides
        && inputs.video_loaded
        && inputs.slide_at_current_time
}

/// A change to one of the display inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayEvent {
    VideoLoaded(bool),
    SlidePresence(bool),
    ViewModeChanged(ViewMode),
    AudioOnlyToggled(bool),
    PresentationToggled,
    PresentationAvailable(bool),
    /// A different clip was selected; it has to load again
    ClipChanged,
    SectionChanged { has_slides: bool, has_video: bool },
}

/// The current display mode and its inputs.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    inputs: DisplayInputs,
    mode: DisplayMode,
}

impl DisplayState {
    pub fn new(inputs: DisplayInputs) -> Self {
        Self { inputs, mode: inputs.resolve() }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn inputs(&self) -> &DisplayInputs {
        &self.inputs
    }

    /// Apply an event; returns the new mode only when it changed.
    pub fn apply(&mut self, event: DisplayEvent) -> Option<DisplayMode> {
        let inputs = &mut self.inputs;
        match event {
            DisplayEvent::VideoLoaded(loaded) => inputs.video_loaded = loaded,
            DisplayEvent::SlidePresence(present) => inputs.slide_at_current_time = present,
            DisplayEvent::ViewModeChanged(mode) => inputs.view_mode = mode,
            DisplayEvent::AudioOnlyToggled(audio_only) => inputs.audio_only = audio_only,
            DisplayEvent::PresentationToggled => inputs.show_presentation = !inputs.show_presentation,
            DisplayEvent::PresentationAvailable(available) => inputs.presentation_available = available,
            DisplayEvent::ClipChanged => {
                inputs.video_loaded = false;
                inputs.slide_at_current_time = false;
            }
            DisplayEvent::SectionChanged { has_slides, has_video } => {
                inputs.has_slides = has_slides;
                inputs.has_video_for_section = has_video;
                if !has_video {
                    inputs.video_loaded = false;
                    inputs.slide_at_current_time = false;
                }
            }
        }
        self.replace(self.inputs)
    }

    /// Replace all inputs at once; returns the new mode only when it changed.
    pub fn replace(&mut self, inputs: DisplayInputs) -> Option<DisplayMode> {
        self.inputs = inputs;
        let mode = inputs.resolve();
        if mode == self.mode {
            return None;
        }
        self.mode = mode;
        Some(mode)
    }
}
