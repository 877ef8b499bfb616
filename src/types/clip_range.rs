//! Slide clip ranges

use serde::{Deserialize, Serialize};

/// Time window during which a slide is the current slide of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlideClipRange {
    pub start: f64,
    pub end: f64,
}

impl SlideClipRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether `time` lies inside the window, bounds included.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    /// Whether playback at `time` has left the slide's window.
    pub fn is_away(&self, time: f64) -> bool {
        !self.contains(time)
    }
}
